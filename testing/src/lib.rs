//! # Meridian Testing
//!
//! Testing utilities for the Meridian synchronization subsystem:
//!
//! - [`RecordingEventSink`]: captures published envelopes, optionally
//!   simulating an unreachable broker, for publish-after-commit
//!   assertions
//! - [`fixtures`]: envelope builders for the user event family
//!
//! The in-memory store doubles live with the crates that own the traits
//! (`meridian_directory::mocks`, `meridian_identity::mocks`); this crate
//! holds what is shared across service boundaries.

pub mod fixtures;
pub mod sink;

pub use sink::RecordingEventSink;
