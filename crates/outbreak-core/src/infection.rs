//! Contagiousness and transmission.
//!
//! Everything here is a pure function of participant state; nothing is
//! persisted.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::ids::ParticipantId;
use crate::participant::Participant;

/// Number of distinct recent senders that make up a venue's "room".
pub const RECENT_WINDOW: usize = 5;

/// Divisor mapping an average rate to a per-message probability.
const RATE_DIVISOR: f64 = 1000.0;

const MASK_FACTOR: f64 = 0.65;
const IMMUNOCOMPROMISED_FACTOR: f64 = 1.5;
const RATE_CAP: f64 = 100.0;

/// Effective contagiousness of a participant.
///
/// Masks cut sickness to 65%, healers halve it, and immunocompromised
/// participants shed 1.5x (capped at 100), applied in that order.
pub fn sickness_rate(participant: &Participant) -> f64 {
    let mut base = f64::from(participant.sickness());
    if participant.masked() {
        base *= MASK_FACTOR;
    }
    if participant.healer() {
        base /= 2.0;
    }
    if participant.immunocompromised() {
        (base * IMMUNOCOMPROMISED_FACTOR).min(RATE_CAP)
    } else {
        base
    }
}

/// Chance that one observed message infects a susceptible sender, given the
/// rates of the venue's recent senders. Every rate given is averaged; the
/// window size is the caller's [`RecentSenders`] capacity. An empty room
/// transmits nothing.
pub fn transmission_probability<I>(rates: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = rates
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), r| (sum + r, n + 1));
    if count == 0 {
        return 0.0;
    }
    sum / count as f64 / RATE_DIVISOR
}

/// Bounded list of distinct senders, most recent first.
///
/// Re-recording a sender already present moves it to the front, so the
/// window always holds the last `capacity` distinct people seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentSenders {
    capacity: usize,
    members: VecDeque<ParticipantId>,
}

impl Default for RecentSenders {
    fn default() -> Self {
        Self::new(RECENT_WINDOW)
    }
}

impl RecentSenders {
    /// An empty window holding at most `capacity` senders (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            members: VecDeque::with_capacity(capacity),
        }
    }

    /// Record `id` as the most recent sender.
    pub fn record(&mut self, id: ParticipantId) {
        if let Some(pos) = self.members.iter().position(|m| *m == id) {
            self.members.remove(pos);
        }
        self.members.push_front(id);
        self.members.truncate(self.capacity);
    }

    /// Whether `id` is in the window.
    pub fn contains(&self, id: ParticipantId) -> bool {
        self.members.contains(&id)
    }

    /// Most recent first.
    pub fn iter(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.members.iter().copied()
    }

    /// Number of senders in the window.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True before anyone has been recorded.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
