use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ids::ParticipantId;

/// Sickness assigned on infection.
pub const INITIAL_SICKNESS: u32 = 15;

/// Sickness at which a participant is latched dead.
pub const DEATH_THRESHOLD: u32 = 100;

/// Share of new participants that are immunocompromised.
pub const DEFAULT_IMMUNOCOMPROMISED_RATE: f64 = 0.15;

/// Outcome of a state-changing operation on a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Still alive, nothing notable happened.
    Alive,
    /// Crossed the death threshold during this operation.
    Dead,
    /// Was already dead; nothing was changed.
    AlreadyDead,
    /// Sickness dropped to zero.
    Cured,
    /// Gained the healer flag.
    BecameHealer,
}

impl Signal {
    /// Stable lowercase name, matching the effect language literal.
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Alive => "alive",
            Signal::Dead => "dead",
            Signal::AlreadyDead => "already_dead",
            Signal::Cured => "cured",
            Signal::BecameHealer => "became_healer",
        }
    }

    /// Parse a signal literal.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "alive" => Some(Signal::Alive),
            "dead" => Some(Signal::Dead),
            "already_dead" => Some(Signal::AlreadyDead),
            "cured" => Some(Signal::Cured),
            "became_healer" => Some(Signal::BecameHealer),
            _ => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-member epidemic record.
///
/// `death` is set exactly when sickness has reached [`DEATH_THRESHOLD`]; once
/// set, every mutator short-circuits instead of changing state. Sickness is
/// not capped above the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    member_id: ParticipantId,
    #[serde(default)]
    infected: bool,
    #[serde(default)]
    healer: bool,
    #[serde(default)]
    masked: bool,
    immunocompromised: bool,
    #[serde(default)]
    infected_since: Option<DateTime<Utc>>,
    #[serde(default)]
    death: Option<DateTime<Utc>>,
    #[serde(default)]
    sickness: u32,
    #[serde(default)]
    backpack: BTreeMap<String, u32>,
}

impl Participant {
    /// Create a participant, rolling the immunocompromised flag once.
    pub fn new<R: Rng + ?Sized>(member_id: ParticipantId, immunocompromised_rate: f64, rng: &mut R) -> Self {
        let immunocompromised = rng.random::<f64>() < immunocompromised_rate;
        Self::with_immunity(member_id, immunocompromised)
    }

    /// Create a participant with a fixed immunocompromised flag.
    pub fn with_immunity(member_id: ParticipantId, immunocompromised: bool) -> Self {
        Self {
            member_id,
            infected: false,
            healer: false,
            masked: false,
            immunocompromised,
            infected_since: None,
            death: None,
            sickness: 0,
            backpack: BTreeMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The chat member this record belongs to.
    pub fn member_id(&self) -> ParticipantId {
        self.member_id
    }

    /// Ever infected. Stays set after a cure.
    pub fn infected(&self) -> bool {
        self.infected
    }

    /// Immune and halves their own contagiousness.
    pub fn healer(&self) -> bool {
        self.healer
    }

    /// Wearing a mask.
    pub fn masked(&self) -> bool {
        self.masked
    }

    /// Rolled once at creation; speeds up progression and shedding.
    pub fn immunocompromised(&self) -> bool {
        self.immunocompromised
    }

    /// When the infection started.
    pub fn infected_since(&self) -> Option<DateTime<Utc>> {
        self.infected_since
    }

    /// When death was latched.
    pub fn death(&self) -> Option<DateTime<Utc>> {
        self.death
    }

    /// Current sickness, not capped at [`DEATH_THRESHOLD`].
    pub fn sickness(&self) -> u32 {
        self.sickness
    }

    /// Item id → remaining uses.
    pub fn backpack(&self) -> &BTreeMap<String, u32> {
        &self.backpack
    }

    /// Latched dead.
    pub fn is_dead(&self) -> bool {
        self.death.is_some()
    }

    /// Can catch the disease from the venue.
    pub fn is_susceptible(&self) -> bool {
        !self.infected && !self.healer
    }

    /// Infected, not cured, not dead.
    pub fn is_infectious(&self) -> bool {
        self.infected && self.sickness > 0 && !self.is_dead()
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Infect the participant. Returns `false` if already infected or dead.
    pub fn infect(&mut self, now: DateTime<Utc>) -> bool {
        if self.infected || self.is_dead() {
            return false;
        }
        self.infected = true;
        self.sickness = INITIAL_SICKNESS;
        self.infected_since = Some(now);
        true
    }

    /// Force the participant dead. Returns `false` if already dead.
    pub fn kill(&mut self, now: DateTime<Utc>) -> bool {
        if self.death.is_some() {
            return false;
        }
        self.sickness = DEATH_THRESHOLD;
        self.death = Some(now);
        true
    }

    /// Set the healer flag. Returns `false` if already a healer.
    pub fn become_healer(&mut self) -> bool {
        if self.healer {
            return false;
        }
        self.healer = true;
        true
    }

    /// Reset sickness to zero. The `infected` flag is kept, which leaves a
    /// cured participant neither susceptible nor infectious.
    pub fn cure(&mut self) -> Signal {
        if self.is_dead() {
            return Signal::AlreadyDead;
        }
        self.sickness = 0;
        Signal::Cured
    }

    /// Change sickness by `delta`, or by a passive progression roll when no
    /// delta is given.
    pub fn add_sickness<R: Rng + ?Sized>(
        &mut self,
        delta: Option<i64>,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Signal {
        if self.is_dead() {
            return Signal::AlreadyDead;
        }
        let delta = delta.unwrap_or_else(|| passive_increment(self.immunocompromised, rng));
        let next = i64::from(self.sickness).saturating_add(delta);
        if next <= 0 {
            self.sickness = 0;
            return Signal::Cured;
        }
        self.sickness = u32::try_from(next).unwrap_or(u32::MAX);
        self.settle(now).unwrap_or(Signal::Alive)
    }

    /// Latch death if sickness crossed the threshold by direct assignment.
    /// Returns `Some(Signal::Dead)` when this call latched it.
    pub fn settle(&mut self, now: DateTime<Utc>) -> Option<Signal> {
        if self.death.is_none() && self.sickness >= DEATH_THRESHOLD {
            self.death = Some(now);
            return Some(Signal::Dead);
        }
        None
    }

    // -----------------------------------------------------------------------
    // Direct field writes (used by item effects; follow with `settle`)
    // -----------------------------------------------------------------------

    /// Overwrite sickness without latching death.
    pub fn set_sickness(&mut self, sickness: u32) {
        self.sickness = sickness;
    }

    /// Overwrite the infected flag.
    pub fn set_infected(&mut self, infected: bool) {
        self.infected = infected;
    }

    /// Overwrite the healer flag.
    pub fn set_healer(&mut self, healer: bool) {
        self.healer = healer;
    }

    /// Overwrite the masked flag.
    pub fn set_masked(&mut self, masked: bool) {
        self.masked = masked;
    }

    /// Replay on this record what an item effect changed between `before`
    /// (the copy the effect started from) and `after` (the copy it returned).
    ///
    /// Only the difference is applied, so changes made to this record while
    /// the effect ran survive. Sickness moves by the same delta unless the
    /// effect cured or killed, which are absolute. Flags the effect did not
    /// touch keep their current value. The backpack is never touched.
    pub fn apply_change(&mut self, before: &Participant, after: &Participant, now: DateTime<Utc>) {
        if self.is_dead() {
            return;
        }
        if after.infected != before.infected {
            self.infected = after.infected;
        }
        if after.infected_since != before.infected_since {
            self.infected_since = after.infected_since;
        }
        if after.healer != before.healer {
            self.healer = after.healer;
        }
        if after.masked != before.masked {
            self.masked = after.masked;
        }

        if after.is_dead() && !before.is_dead() {
            let sickness = self.sickness.max(after.sickness);
            self.kill(after.death.unwrap_or(now));
            self.sickness = sickness;
            return;
        }
        if after.sickness == 0 && before.sickness > 0 {
            self.sickness = 0;
            return;
        }
        let delta = i64::from(after.sickness) - i64::from(before.sickness);
        let next = i64::from(self.sickness).saturating_add(delta).max(0);
        self.sickness = u32::try_from(next).unwrap_or(u32::MAX);
        self.settle(now);
    }

    // -----------------------------------------------------------------------
    // Backpack
    // -----------------------------------------------------------------------

    /// Whether the item was ever acquired (even if its uses are spent).
    pub fn owns(&self, item_id: &str) -> bool {
        self.backpack.contains_key(item_id)
    }

    /// Remaining uses of an owned item.
    pub fn remaining_uses(&self, item_id: &str) -> Option<u32> {
        self.backpack.get(item_id).copied()
    }

    /// Record an acquisition. Returns `false` (and changes nothing) if the
    /// item is already owned.
    pub fn acquire(&mut self, item_id: &str, uses: u32) -> bool {
        if self.owns(item_id) {
            return false;
        }
        self.backpack.insert(item_id.to_string(), uses);
        true
    }

    /// Spend one use of an owned item.
    pub fn consume_use(&mut self, item_id: &str) {
        if let Some(uses) = self.backpack.get_mut(item_id) {
            *uses = uses.saturating_sub(1);
        }
    }
}

/// Passive progression: 1% chance of +3 (+5 immunocompromised), else 5%
/// chance of +1 (+2 immunocompromised), else nothing.
pub fn passive_increment<R: Rng + ?Sized>(immunocompromised: bool, rng: &mut R) -> i64 {
    let roll: f64 = rng.random();
    if roll < 0.01 {
        if immunocompromised { 5 } else { 3 }
    } else if roll < 0.05 {
        if immunocompromised { 2 } else { 1 }
    } else {
        0
    }
}
