//! Figures sayings worker.
//!
//! This crate provides:
//! - Subject leasing with compare-and-swap transitions and an expiry sweep
//! - Saying accumulation with dedup and near-duplicate rejection
//! - Catalog registration and seeding
//! - JSON invocation handlers for the `figures-worker` binary

pub mod accumulator;
pub mod catalog;
pub mod config;
pub mod error;
pub mod invocation;
pub mod lock_manager;
pub mod logging;
pub mod metrics;

pub use accumulator::{next_sequence_key, AccumulatorSettings, SayingAccumulator, Verdict};
pub use catalog::{default_catalog, SubjectCatalog};
pub use config::{StoreBackend, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use invocation::Operation;
pub use lock_manager::SubjectLockManager;
pub use logging::{FailureKind, InvocationLogger};
