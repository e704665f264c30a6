use outbreak_core::ParticipantId;
use outbreak_dsl::{EffectError, ScriptDefinitionError};
use outbreak_store::StoreError;

use crate::config::ConfigError;

/// Alias for `Result<T, EpidemicError>`.
pub type EpidemicResult<T> = Result<T, EpidemicError>;

/// Errors returned by [`crate::EpidemicService`].
#[derive(Debug, thiserror::Error)]
pub enum EpidemicError {
    /// The request was refused.
    #[error(transparent)]
    InvalidOperation(#[from] InvalidOperation),

    /// An admin action targeted a dead participant.
    #[error("participant {0} is dead")]
    AlreadyDead(ParticipantId),

    /// The catalog does not compile.
    #[error(transparent)]
    Script(#[from] ScriptDefinitionError),

    /// An effect or predicate failed at runtime; nothing was committed.
    #[error("item effect failed: {0}")]
    Effect(#[from] EffectError),

    /// Loading or saving the document failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Why a requested operation was refused. Nothing is mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidOperation {
    /// No catalog entry with this id.
    #[error("no item \"{0}\" in the catalog")]
    UnknownItem(String),

    /// Locked, sold out, already owned, predicate false, or buyer dead.
    #[error("\"{0}\" cannot be bought right now")]
    NotBuyable(String),

    /// The participant never acquired the item.
    #[error("\"{0}\" is not in the backpack")]
    NotOwned(String),

    /// No uses left, predicate false, or participant dead.
    #[error("\"{0}\" cannot be used right now")]
    NotUsable(String),

    /// One effect per participant at a time.
    #[error("another use by the same participant is still running")]
    UseInProgress,

    /// Purchases are refused while a restock runs.
    #[error("the store is being restocked")]
    Restocking,

    /// `begin_epidemic` was already called.
    #[error("the epidemic has already started")]
    AlreadyStarted,

    /// A forced cycle before `begin_epidemic`.
    #[error("the epidemic has not started yet")]
    NotStarted,
}

/// A transient failure reported by an external collaborator. Always logged
/// and swallowed; never rolls back game state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{collaborator}: {message}")]
pub struct CollaboratorError {
    /// Which collaborator failed, e.g. `"chat"`.
    pub collaborator: &'static str,
    /// What went wrong.
    pub message: String,
}

impl CollaboratorError {
    /// Build an error for `collaborator`.
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}
