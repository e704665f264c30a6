//! Epidemic engine for Outbreak.
//!
//! [`EpidemicService`] is the entry point: it loads the item catalog, opens
//! the persisted [`outbreak_core::Document`], and runs purchases, item
//! effects, per-message transmission and the daily cycle. Everything outside
//! the simulation (chat platform, narrative channel, interactive input) is
//! reached through the traits in [`collaborators`].

/// Compiled item catalog and eligibility checks.
pub mod catalog;
/// Wall-clock abstraction and cycle arithmetic.
pub mod clock;
/// Interfaces to the chat platform, narrative sink and input provider.
pub mod collaborators;
/// Epidemic configuration.
pub mod config;
/// Item effect execution.
pub mod engine;
/// Error types for the simulation crate.
pub mod error;
/// Announcement texts for state changes.
pub mod narration;
/// Random selection of new infected and healers.
pub mod recruitment;
/// Lazy participant creation.
pub mod registry;
mod scheduler;
/// The epidemic orchestrator.
pub mod service;
/// Recent senders per venue.
pub mod venue;

#[cfg(test)]
mod testing;

pub use catalog::{CompiledItem, DEFAULT_CATALOG, ItemCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{ChatPlatform, Collaborators, Detached, InputProvider, NarrativeSink};
pub use config::{ConfigError, EpidemicConfig, Recruits};
pub use engine::{Applied, EffectEngine};
pub use error::{CollaboratorError, EpidemicError, EpidemicResult, InvalidOperation};
pub use narration::Transition;
pub use recruitment::Recruitment;
pub use registry::ParticipantRegistry;
pub use service::{AdminAction, BackpackEntry, CycleReport, EpidemicService, RestockMode, StatsReport};
pub use venue::VenueActivity;
