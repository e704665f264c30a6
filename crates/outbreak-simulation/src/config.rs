//! Epidemic configuration, loaded from an optional YAML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use outbreak_core::VenueId;
use serde::{Deserialize, Serialize};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Configuration for an epidemic session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpidemicConfig {
    /// Where the persisted document lives.
    pub data_file: PathBuf,
    /// Catalog definition file; the built-in catalog when unset.
    pub catalog: Option<PathBuf>,
    /// Venues sampled for recruitment.
    pub venues: Vec<VenueId>,
    /// Venue where narrative announcements are posted.
    pub event_venue: Option<VenueId>,
    /// Recruits chosen per venue when the epidemic begins.
    pub initial_recruits: Recruits,
    /// Recruits chosen per venue on every cycle.
    pub daily_recruits: Recruits,
    /// Sickness added to every infectious participant per cycle.
    pub daily_progression: i64,
    /// How far back recruitment looks in each venue's history.
    pub history_limit: usize,
    /// Distinct recent senders used for transmission.
    pub recent_window: usize,
    /// Seconds an interactive prompt waits for a reply.
    pub input_timeout_secs: u64,
    /// Chance that a new participant is immunocompromised.
    pub immunocompromised_rate: f64,
    /// Chat role granted to infected participants.
    pub infected_role: String,
    /// Chat role granted to healers.
    pub healer_role: String,
    /// Fixed RNG seed; seeded from the OS when unset.
    pub seed: Option<u64>,
    /// Seconds to wait before retrying a cycle that failed to persist.
    pub cycle_retry_secs: u64,
}

/// Number of new infected and new healers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recruits {
    /// New infections.
    #[serde(default)]
    pub infected: usize,
    /// New healers.
    #[serde(default)]
    pub healers: usize,
}

impl Recruits {
    /// Shorthand constructor.
    pub fn new(infected: usize, healers: usize) -> Self {
        Self { infected, healers }
    }
}

impl Default for EpidemicConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("outbreak.json"),
            catalog: None,
            venues: Vec::new(),
            event_venue: None,
            initial_recruits: Recruits::new(5, 2),
            daily_recruits: Recruits::new(2, 1),
            daily_progression: 20,
            history_limit: 500,
            recent_window: outbreak_core::infection::RECENT_WINDOW,
            input_timeout_secs: 60,
            immunocompromised_rate: outbreak_core::participant::DEFAULT_IMMUNOCOMPROMISED_RATE,
            infected_role: "Infected".to_string(),
            healer_role: "Healer".to_string(),
            seed: None,
            cycle_retry_secs: 60,
        }
    }
}

impl EpidemicConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Load from `path` if given and present; defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if path.exists() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// [`EpidemicConfig::input_timeout_secs`] as a duration.
    pub fn input_timeout(&self) -> Duration {
        Duration::from_secs(self.input_timeout_secs)
    }

    /// [`EpidemicConfig::cycle_retry_secs`] as a duration.
    pub fn cycle_retry(&self) -> Duration {
        Duration::from_secs(self.cycle_retry_secs)
    }

    /// Set the data file.
    pub fn with_data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_file = path.into();
        self
    }

    /// Use a catalog file instead of the built-in one.
    pub fn with_catalog(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog = Some(path.into());
        self
    }

    /// Set the venues sampled for recruitment.
    pub fn with_venues(mut self, venues: impl IntoIterator<Item = VenueId>) -> Self {
        self.venues = venues.into_iter().collect();
        self
    }

    /// Per-venue recruits when the epidemic begins.
    pub fn with_initial_recruits(mut self, infected: usize, healers: usize) -> Self {
        self.initial_recruits = Recruits::new(infected, healers);
        self
    }

    /// Per-venue recruits on each cycle.
    pub fn with_daily_recruits(mut self, infected: usize, healers: usize) -> Self {
        self.daily_recruits = Recruits::new(infected, healers);
        self
    }

    /// Prompt timeout, truncated to whole seconds.
    pub fn with_input_timeout(mut self, timeout: Duration) -> Self {
        self.input_timeout_secs = timeout.as_secs();
        self
    }

    /// Set [`EpidemicConfig::immunocompromised_rate`].
    pub fn with_immunocompromised_rate(mut self, rate: f64) -> Self {
        self.immunocompromised_rate = rate;
        self
    }

    /// Set the RNG seed for deterministic runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
