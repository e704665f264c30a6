//! Terminal stand-ins for the chat platform, the narrative channel and
//! interactive input.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use colored::Colorize;
use outbreak_core::{ParticipantId, VenueId};
use outbreak_simulation::{
    ChatPlatform, CollaboratorError, Collaborators, ConfigError, EpidemicConfig, InputProvider, NarrativeSink,
};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Who is around in each venue, standing in for chat history.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Roster {
    /// Senders per venue, most recent first.
    pub venues: BTreeMap<VenueId, Vec<ParticipantId>>,
    /// Display names; members without one are shown by id.
    pub names: BTreeMap<ParticipantId, String>,
}

impl Roster {
    pub fn name_of(&self, member: ParticipantId) -> String {
        self.names
            .get(&member)
            .cloned()
            .unwrap_or_else(|| member.to_string())
    }
}

/// The epidemic settings plus the console roster, read from one YAML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsoleConfig {
    #[serde(flatten)]
    pub epidemic: EpidemicConfig,
    #[serde(default)]
    pub roster: Roster,
}

impl ConsoleConfig {
    /// Load from `path` when it exists; defaults otherwise.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(&contents)?)
    }
}

/// Prints what a chat platform would post and reads replies from stdin.
pub struct Console {
    roster: Roster,
    event_venue: Option<VenueId>,
    stdin: Mutex<Lines<BufReader<Stdin>>>,
}

impl Console {
    pub fn new(config: &ConsoleConfig) -> Arc<Self> {
        Arc::new(Self {
            roster: config.roster.clone(),
            event_venue: config.epidemic.event_venue,
            stdin: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        })
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            chat: self.clone(),
            narrative: self.clone(),
            input: self.clone(),
        }
    }
}

#[async_trait]
impl ChatPlatform for Console {
    async fn recent_senders(&self, venue: VenueId, limit: usize) -> Result<Vec<ParticipantId>, CollaboratorError> {
        Ok(self
            .roster
            .venues
            .get(&venue)
            .map(|members| members.iter().copied().take(limit).collect())
            .unwrap_or_default())
    }

    async fn display_name(&self, member: ParticipantId) -> Result<String, CollaboratorError> {
        Ok(self.roster.name_of(member))
    }

    async fn grant_role(&self, member: ParticipantId, role: &str) -> Result<(), CollaboratorError> {
        println!("  {} {} +{role}", "ROLE".cyan().bold(), self.roster.name_of(member));
        Ok(())
    }

    async fn revoke_role(&self, member: ParticipantId, role: &str) -> Result<(), CollaboratorError> {
        println!("  {} {} -{role}", "ROLE".cyan().bold(), self.roster.name_of(member));
        Ok(())
    }

    async fn broadcast(&self, venue: VenueId, text: &str) -> Result<(), CollaboratorError> {
        println!("  {} {text}", format!("[{venue}]").dimmed());
        Ok(())
    }
}

#[async_trait]
impl NarrativeSink for Console {
    async fn announce(&self, text: &str) -> Result<(), CollaboratorError> {
        match self.event_venue {
            Some(venue) => self.broadcast(venue, text).await,
            None => {
                println!("  {text}");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl InputProvider for Console {
    async fn read_reply(
        &self,
        member: ParticipantId,
        _venue: VenueId,
        prompt: &str,
    ) -> Result<Option<String>, CollaboratorError> {
        println!("  {} {prompt}", format!("{}?", self.roster.name_of(member)).bold());
        std::io::stdout()
            .flush()
            .map_err(|e| CollaboratorError::new("input", e.to_string()))?;
        self.stdin
            .lock()
            .await
            .next_line()
            .await
            .map_err(|e| CollaboratorError::new("input", e.to_string()))
    }
}
