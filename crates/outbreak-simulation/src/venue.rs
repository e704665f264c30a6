use std::collections::BTreeMap;

use outbreak_core::{Document, ParticipantId, RecentSenders, VenueId, sickness_rate, transmission_probability};

/// The last few distinct senders seen in each venue. Kept in memory only;
/// a restart starts every venue empty.
#[derive(Debug, Clone, Default)]
pub struct VenueActivity {
    window: usize,
    venues: BTreeMap<VenueId, RecentSenders>,
}

impl VenueActivity {
    /// Every venue keeps at most `window` distinct senders.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            venues: BTreeMap::new(),
        }
    }

    /// Note `member` as the most recent sender in `venue`.
    pub fn record(&mut self, venue: VenueId, member: ParticipantId) {
        let window = self.window;
        self.venues
            .entry(venue)
            .or_insert_with(|| RecentSenders::new(window))
            .record(member);
    }

    /// Recent senders in `venue`, most recent first.
    pub fn recent(&self, venue: VenueId) -> impl Iterator<Item = ParticipantId> + '_ {
        self.venues.get(&venue).into_iter().flat_map(|r| r.iter())
    }

    /// Chance that a message in `venue` infects a susceptible sender.
    pub fn transmission(&self, venue: VenueId, doc: &Document) -> f64 {
        transmission_probability(
            self.recent(venue)
                .filter_map(|id| doc.participant(id))
                .map(sickness_rate),
        )
    }

    /// Current transmission probability for every venue seen so far.
    pub fn rates(&self, doc: &Document) -> Vec<(VenueId, f64)> {
        self.venues
            .keys()
            .map(|venue| (*venue, self.transmission(*venue, doc)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbreak_core::Participant;

    fn doc_with(sicknesses: &[(u64, u32)]) -> Document {
        let mut doc = Document::default();
        for (id, sickness) in sicknesses {
            let mut p = Participant::with_immunity(ParticipantId(*id), false);
            p.set_sickness(*sickness);
            doc.participants.insert(ParticipantId(*id), p);
        }
        doc
    }

    #[test]
    fn empty_venue_transmits_nothing() {
        let activity = VenueActivity::new(5);
        assert_eq!(activity.transmission(VenueId(1), &Document::default()), 0.0);
        assert!(activity.rates(&Document::default()).is_empty());
    }

    #[test]
    fn average_over_recent_window() {
        let doc = doc_with(&[(1, 100), (2, 0), (3, 50)]);
        let mut activity = VenueActivity::new(5);
        for id in [1, 2, 3, 1] {
            activity.record(VenueId(9), ParticipantId(id));
        }
        let recent: Vec<_> = activity.recent(VenueId(9)).collect();
        assert_eq!(recent, vec![ParticipantId(1), ParticipantId(3), ParticipantId(2)]);
        assert!((activity.transmission(VenueId(9), &doc) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn window_evicts_oldest() {
        let doc = doc_with(&[(1, 100), (2, 0), (3, 0)]);
        let mut activity = VenueActivity::new(2);
        for id in [1, 2, 3] {
            activity.record(VenueId(9), ParticipantId(id));
        }
        assert_eq!(activity.transmission(VenueId(9), &doc), 0.0);
        assert_eq!(activity.rates(&doc), vec![(VenueId(9), 0.0)]);
    }

    #[test]
    fn configured_window_wider_than_default_is_averaged_in_full() {
        let doc = doc_with(&[(1, 0), (2, 0), (3, 0), (4, 0), (5, 0), (6, 0), (7, 0), (8, 80)]);
        let mut activity = VenueActivity::new(8);
        for id in 1..=8 {
            activity.record(VenueId(9), ParticipantId(id));
        }
        assert_eq!(activity.recent(VenueId(9)).count(), 8);
        assert!((activity.transmission(VenueId(9), &doc) - 0.01).abs() < 1e-12);
    }
}
