use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ParticipantId;
use crate::item::Item;
use crate::participant::Participant;
use crate::record;
use crate::stats::Stats;

/// The root persisted aggregate.
///
/// Every field defaults when absent, so older documents load after a field
/// is added.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Everyone who ever bought, used, or caught something.
    #[serde(default, with = "record::map")]
    pub participants: BTreeMap<ParticipantId, Participant>,
    /// Running totals.
    #[serde(default, with = "record::one")]
    pub stats: Stats,
    /// The catalog, in catalog order.
    #[serde(default, with = "record::seq")]
    pub store: Vec<Item>,
    /// `None` until the epidemic is started.
    #[serde(default)]
    pub next_cycle: Option<DateTime<Utc>>,
    /// When the epidemic was started.
    #[serde(default)]
    pub event_started: Option<DateTime<Utc>>,
}

impl Document {
    /// An empty document carrying the given catalog.
    pub fn with_catalog(store: Vec<Item>) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    /// Look up a participant by member id.
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    /// Mutable variant of [`Document::participant`].
    pub fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.get_mut(&id)
    }

    /// Look up a catalog item by id.
    pub fn item(&self, id: &str) -> Option<&Item> {
        self.store.iter().find(|i| i.id == id)
    }

    /// Mutable variant of [`Document::item`].
    pub fn item_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.store.iter_mut().find(|i| i.id == id)
    }

    /// Whether the epidemic has been started.
    pub fn started(&self) -> bool {
        self.next_cycle.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::DEATH_THRESHOLD;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn sample() -> Document {
        let mut p = Participant::with_immunity(ParticipantId(42), true);
        p.infect(at("2020-02-10T12:00:00Z"));
        p.set_masked(true);
        p.acquire("mask", 1);

        let item = Item::new("mask", "Mask", 5, "masked = true")
            .with_description("Helps prevent the spread of the disease!")
            .with_predicate("not healer")
            .unlocked(true);

        let mut doc = Document::with_catalog(vec![item]);
        doc.participants.insert(p.member_id(), p);
        doc.stats = Stats {
            infected: 1,
            healers: 0,
            dead: 0,
            cured: 0,
        };
        doc.next_cycle = Some(at("2020-02-11T00:00:00Z"));
        doc.event_started = Some(at("2020-02-10T00:00:00Z"));
        doc
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let doc = sample();
        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn compound_values_carry_discriminators() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["participants"]["42"]["data_type"], "participant");
        assert_eq!(json["store"][0]["data_type"], "item");
        assert_eq!(json["stats"]["data_type"], "stats");
        // timestamps are plain strings
        assert!(json["next_cycle"].is_string());
    }

    #[test]
    fn unknown_discriminator_fails_the_whole_document() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["store"][0]["data_type"] = "vaccine".into();
        assert!(serde_json::from_value::<Document>(json).is_err());
    }

    #[test]
    fn missing_fields_default() {
        let doc: Document = serde_json::from_str("{}").unwrap();
        assert_eq!(doc, Document::default());
        assert!(!doc.started());
    }

    #[test]
    fn lookup_helpers() {
        let mut doc = sample();
        assert!(doc.item("mask").is_some());
        assert!(doc.item("soap").is_none());
        doc.participant_mut(ParticipantId(42))
            .unwrap()
            .kill(at("2020-02-12T00:00:00Z"));
        assert_eq!(
            doc.participant(ParticipantId(42)).unwrap().sickness(),
            DEATH_THRESHOLD
        );
    }
}
