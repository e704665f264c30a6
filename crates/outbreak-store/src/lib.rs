//! Atomic, crash-safe JSON document store.
//!
//! A [`Store`] owns one in-memory document of any serde type and persists it
//! with a write-temp-then-rename sequence. Decode failures of an existing
//! file are fatal; there is no partial recovery.

/// Error types for the store.
pub mod error;
/// The document store.
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{Staged, Store, Transaction};
