//! Interfaces to the world outside the simulation.
//!
//! Game state never depends on these succeeding: the service persists first
//! and notifies afterwards, logging and dropping any [`CollaboratorError`].

use std::sync::Arc;

use async_trait::async_trait;
use outbreak_core::{ParticipantId, VenueId};

use crate::error::CollaboratorError;

/// The chat platform hosting the venues.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Distinct recent senders in a venue, most recent first, scanning at
    /// most `limit` messages.
    async fn recent_senders(
        &self,
        venue: VenueId,
        limit: usize,
    ) -> Result<Vec<ParticipantId>, CollaboratorError>;

    /// Human-readable handle for a member.
    async fn display_name(&self, member: ParticipantId) -> Result<String, CollaboratorError>;

    /// Grant a named role. Idempotent.
    async fn grant_role(&self, member: ParticipantId, role: &str) -> Result<(), CollaboratorError>;

    /// Revoke a named role. Idempotent.
    async fn revoke_role(&self, member: ParticipantId, role: &str) -> Result<(), CollaboratorError>;

    /// Post a message to a venue.
    async fn broadcast(&self, venue: VenueId, text: &str) -> Result<(), CollaboratorError>;
}

/// Receives narrative announcements.
#[async_trait]
pub trait NarrativeSink: Send + Sync {
    /// Publish one announcement.
    async fn announce(&self, text: &str) -> Result<(), CollaboratorError>;
}

/// Reads an interactive answer from a participant.
#[async_trait]
pub trait InputProvider: Send + Sync {
    /// Show `prompt` and wait for the participant's raw reply. `Ok(None)`
    /// means no reply will come. The caller applies the timeout.
    async fn read_reply(
        &self,
        member: ParticipantId,
        venue: VenueId,
        prompt: &str,
    ) -> Result<Option<String>, CollaboratorError>;
}

/// The three collaborators the service talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Roles, venue history and broadcasts.
    pub chat: Arc<dyn ChatPlatform>,
    /// Narrative announcements.
    pub narrative: Arc<dyn NarrativeSink>,
    /// Interactive answers.
    pub input: Arc<dyn InputProvider>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Collaborators that do nothing and report no activity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

#[async_trait]
impl ChatPlatform for Detached {
    async fn recent_senders(&self, _: VenueId, _: usize) -> Result<Vec<ParticipantId>, CollaboratorError> {
        Ok(Vec::new())
    }

    async fn display_name(&self, member: ParticipantId) -> Result<String, CollaboratorError> {
        Ok(member.to_string())
    }

    async fn grant_role(&self, _: ParticipantId, _: &str) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn revoke_role(&self, _: ParticipantId, _: &str) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn broadcast(&self, _: VenueId, _: &str) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

#[async_trait]
impl NarrativeSink for Detached {
    async fn announce(&self, _: &str) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

#[async_trait]
impl InputProvider for Detached {
    async fn read_reply(&self, _: ParticipantId, _: VenueId, _: &str) -> Result<Option<String>, CollaboratorError> {
        Ok(None)
    }
}

impl Collaborators {
    /// All three roles played by [`Detached`].
    pub fn detached() -> Self {
        Self {
            chat: Arc::new(Detached),
            narrative: Arc::new(Detached),
            input: Arc::new(Detached),
        }
    }
}
