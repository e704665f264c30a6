//! Recording collaborators for unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outbreak_core::{ParticipantId, VenueId};

use crate::clock::ManualClock;
use crate::collaborators::{ChatPlatform, Collaborators, InputProvider, NarrativeSink};
use crate::config::EpidemicConfig;
use crate::error::CollaboratorError;
use crate::service::EpidemicService;

/// A small catalog covering each kind of item.
pub const TEST_CATALOG: &str = r#"
item mask {
    name "Mask"
    total 5
    unlocked true
    effect { masked = true }
}

item boost {
    name "Boost"
    total 5
    uses 2
    unlocked true
    effect { return add_sickness(10) }
}

item last {
    name "Last one"
    total 1
    unlocked true
    effect { pass }
}

item badge {
    name "Badge"
    total 5
    uses 0
    unlocked true
    effect { pass }
}

item broken {
    name "Broken"
    total 5
    unlocked true
    effect { sickness = randint(9, 1) }
}

item soap {
    name "Soap"
    total 5
    unlocked true
    effect {
        let r = ask_confirm("Wash?")
        masked = value_or(r, false)
    }
}

item study {
    name "Study"
    total 5
    unlocked true
    effect { return become_healer() }
    predicate { not healer }
}

item vault {
    name "Vault"
    total 5
    effect { pass }
}
"#;

pub fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

#[derive(Debug, Default)]
pub struct Recorder {
    pub senders: Mutex<BTreeMap<VenueId, Vec<ParticipantId>>>,
    pub roles: Mutex<Vec<(ParticipantId, String)>>,
    pub broadcasts: Mutex<Vec<(VenueId, String)>>,
    pub announcements: Mutex<Vec<String>>,
    pub replies: Mutex<VecDeque<Option<String>>>,
    pub reply_delay: Mutex<Option<Duration>>,
    pub fail_roles: Mutex<bool>,
    pub fail_narrative: Mutex<bool>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            chat: self.clone(),
            narrative: self.clone(),
            input: self.clone(),
        }
    }

    pub fn set_senders(&self, venue: VenueId, members: impl IntoIterator<Item = u64>) {
        self.senders
            .lock()
            .unwrap()
            .insert(venue, members.into_iter().map(ParticipantId).collect());
    }

    pub fn queue_reply(&self, reply: Option<&str>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(reply.map(str::to_owned));
    }

    pub fn roles(&self) -> Vec<(ParticipantId, String)> {
        self.roles.lock().unwrap().clone()
    }

    pub fn announcements(&self) -> Vec<String> {
        self.announcements.lock().unwrap().clone()
    }

    pub fn broadcasts(&self) -> Vec<(VenueId, String)> {
        self.broadcasts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for Recorder {
    async fn recent_senders(
        &self,
        venue: VenueId,
        limit: usize,
    ) -> Result<Vec<ParticipantId>, CollaboratorError> {
        let senders = self.senders.lock().unwrap();
        Ok(senders
            .get(&venue)
            .map(|m| m.iter().copied().take(limit).collect())
            .unwrap_or_default())
    }

    async fn display_name(&self, member: ParticipantId) -> Result<String, CollaboratorError> {
        Ok(format!("user{member}"))
    }

    async fn grant_role(&self, member: ParticipantId, role: &str) -> Result<(), CollaboratorError> {
        if *self.fail_roles.lock().unwrap() {
            return Err(CollaboratorError::new("chat", "missing permissions"));
        }
        self.roles.lock().unwrap().push((member, role.to_owned()));
        Ok(())
    }

    async fn revoke_role(&self, member: ParticipantId, role: &str) -> Result<(), CollaboratorError> {
        self.roles
            .lock()
            .unwrap()
            .retain(|(m, r)| !(*m == member && r == role));
        Ok(())
    }

    async fn broadcast(&self, venue: VenueId, text: &str) -> Result<(), CollaboratorError> {
        self.broadcasts.lock().unwrap().push((venue, text.to_owned()));
        Ok(())
    }
}

#[async_trait]
impl NarrativeSink for Recorder {
    async fn announce(&self, text: &str) -> Result<(), CollaboratorError> {
        if *self.fail_narrative.lock().unwrap() {
            return Err(CollaboratorError::new("narrative", "channel unavailable"));
        }
        self.announcements.lock().unwrap().push(text.to_owned());
        Ok(())
    }
}

#[async_trait]
impl InputProvider for Recorder {
    async fn read_reply(
        &self,
        _member: ParticipantId,
        _venue: VenueId,
        _prompt: &str,
    ) -> Result<Option<String>, CollaboratorError> {
        let delay = *self.reply_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.replies.lock().unwrap().pop_front().flatten())
    }
}

/// A service over a temporary data file, recording collaborators and a
/// manual clock starting at 2020-02-10 12:00 UTC.
pub struct Fixture {
    pub _dir: tempfile::TempDir,
    pub service: Arc<EpidemicService>,
    pub recorder: Arc<Recorder>,
    pub clock: ManualClock,
}

pub async fn fixture(catalog: &str, tune: impl FnOnce(EpidemicConfig) -> EpidemicConfig) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let catalog_path = dir.path().join("test.items");
    std::fs::write(&catalog_path, catalog).unwrap();
    let config = tune(
        EpidemicConfig::default()
            .with_data_file(dir.path().join("outbreak.json"))
            .with_catalog(catalog_path)
            .with_seed(7)
            .with_immunocompromised_rate(0.0)
            .with_input_timeout(Duration::from_secs(2)),
    );
    let recorder = Recorder::new();
    let clock = ManualClock::new(at("2020-02-10T12:00:00Z"));
    let service = EpidemicService::open(config, recorder.collaborators(), Arc::new(clock.clone()))
        .await
        .unwrap();
    Fixture {
        _dir: dir,
        service,
        recorder,
        clock,
    }
}
