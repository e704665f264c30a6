use std::collections::BTreeMap;

use outbreak_core::{Participant, ParticipantId};
use rand::Rng;

/// Lazily creates participant records on first sight.
#[derive(Debug, Clone, Copy)]
pub struct ParticipantRegistry {
    immunocompromised_rate: f64,
}

impl ParticipantRegistry {
    /// New records roll immunocompromised with this probability.
    pub fn new(immunocompromised_rate: f64) -> Self {
        Self {
            immunocompromised_rate,
        }
    }

    /// The participant for `id` in `participants`, created if absent. The flag is `true` when
    /// the record was just created and the document needs saving.
    pub fn get_or_create<'d, R: Rng + ?Sized>(
        &self,
        participants: &'d mut BTreeMap<ParticipantId, Participant>,
        id: ParticipantId,
        rng: &mut R,
    ) -> (&'d mut Participant, bool) {
        let mut created = false;
        let participant = participants.entry(id).or_insert_with(|| {
            created = true;
            tracing::debug!(member = %id, "participant created");
            Participant::new(id, self.immunocompromised_rate, rng)
        });
        (participant, created)
    }
}
