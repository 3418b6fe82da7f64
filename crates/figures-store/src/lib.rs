//! Subject and saying persistence.
//!
//! This crate provides:
//! - `SubjectStore` / `SayingStore` contracts with compare-and-set lease writes
//! - Firestore REST implementations (service account or emulator auth)
//! - An in-memory implementation with identical semantics
//! - Retry with backoff, tracing spans and request metrics

pub mod client;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod retry;
pub mod sayings;
pub mod store;
pub mod subjects;
pub mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use sayings::{FirestoreSayingStore, DEFAULT_SAYINGS_COLLECTION};
pub use store::{CasOutcome, Precondition, SayingStore, SubjectStore, SubjectUpdate};
pub use subjects::{FirestoreSubjectStore, DEFAULT_SUBJECTS_COLLECTION};
