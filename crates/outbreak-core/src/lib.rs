//! Core types for Outbreak: participants, items, stats, and the persisted
//! document.
//!
//! This crate holds the per-participant disease state machine and the pure
//! infection model. It knows nothing about scripting, scheduling, or I/O;
//! the other crates build on these records.

/// The root persisted aggregate.
pub mod document;
/// Error types used throughout the crate.
pub mod error;
/// Member and venue identifiers.
pub mod ids;
/// Contagiousness, transmission probability, and venue windows.
pub mod infection;
/// Catalog item records.
pub mod item;
/// The participant state machine.
pub mod participant;
/// Discriminated encoding of compound records.
pub mod record;
/// Aggregate counters.
pub mod stats;

pub use document::Document;
pub use error::{CoreError, CoreResult};
pub use ids::{ParticipantId, VenueId};
pub use infection::{RecentSenders, sickness_rate, transmission_probability};
pub use item::Item;
pub use participant::{DEATH_THRESHOLD, INITIAL_SICKNESS, Participant, Signal};
pub use record::{Record, RecordKind, Tagged};
pub use stats::Stats;
