//! # Meridian Core
//!
//! Domain event model and seam traits for the Meridian synchronization
//! subsystem.
//!
//! Meridian keeps the services of an ERP suite (authentication, user
//! directory, finance) consistent without distributed transactions: a
//! producing service commits a local state change, then publishes an
//! immutable domain event; consuming services apply the event to their own
//! state idempotently. This crate holds the pieces both sides share:
//!
//! - [`envelope::EventEnvelope`]: the wire record carrying an event
//! - [`events`]: the event families and their payload types
//! - [`sink::EventSink`]: the publishing seam, including the
//!   best-effort-after-commit policy
//! - [`processor::EventProcessor`]: the consuming seam with
//!   transient/permanent failure classification
//! - [`error`]: the failure taxonomy shared across the subsystem
//!
//! # Delivery Semantics
//!
//! The subsystem targets **at-least-once delivery with idempotent
//! consumers**, not exactly-once. An event may be redelivered; two
//! envelopes with the same `event_id` describe the same occurrence, and
//! consumers must suppress the duplicate rather than reapply it.
//!
//! # Example
//!
//! ```
//! use meridian_core::events::{DomainEvent, UserCreated};
//! use uuid::Uuid;
//!
//! # fn example() -> Result<(), meridian_core::error::WireError> {
//! let event = UserCreated {
//!     subject: Uuid::new_v4(),
//!     email: "a@example.com".to_string(),
//!     full_name: "Ada Lovelace".to_string(),
//!     role: "Employee".to_string(),
//! };
//!
//! let envelope = event.to_envelope()?;
//! assert_eq!(envelope.event_type, "user.created");
//! # Ok(())
//! # }
//! ```

pub mod envelope;
pub mod error;
pub mod events;
pub mod processor;
pub mod sink;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use envelope::EventEnvelope;
pub use error::{BrokerError, PublishError, SchemaViolation, WireError};
pub use processor::{Disposition, EventProcessor, ProcessError};
pub use sink::EventSink;
