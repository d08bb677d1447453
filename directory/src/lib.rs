//! # Meridian Directory
//!
//! The user-directory side of the Meridian synchronization subsystem:
//! durable, idempotent materialization of the user event family into a
//! locally owned projection.
//!
//! ## How an event becomes local state
//!
//! ```text
//! ConsumerWorker (meridian-broker)
//!        │ EventEnvelope
//!        ▼
//! UserDirectoryProcessor ── schema + invariant checks
//!        │
//!        ▼
//! DirectoryStore::apply_*  ── ONE local transaction:
//!   ├── processed_events insert (duplicate? stop, ack)
//!   └── directory_users upsert  (create or merge carried fields)
//! ```
//!
//! The ledger insert and the projection write commit or roll back
//! together; partial application cannot happen, which is what makes
//! at-least-once redelivery safe. The `event_id` primary key extends the
//! same guarantee across horizontally scaled worker instances.
//!
//! ## Example
//!
//! ```no_run
//! use meridian_directory::processor::UserDirectoryProcessor;
//! use meridian_directory::store::PostgresDirectoryStore;
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgresql://localhost/directory").await?;
//! let store = PostgresDirectoryStore::new(pool);
//! store.migrate().await?;
//!
//! // Hand to a ConsumerWorker from meridian-broker:
//! let processor = UserDirectoryProcessor::new(store);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod ledger;
pub mod mocks;
pub mod model;
pub mod processor;
pub mod repository;
pub mod store;

pub use error::DirectoryError;
pub use model::DirectoryUser;
pub use processor::UserDirectoryProcessor;
pub use store::{ApplyOutcome, DirectoryStore, PostgresDirectoryStore};
