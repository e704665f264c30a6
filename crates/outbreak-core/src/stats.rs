use serde::{Deserialize, Serialize};

/// Aggregate outbreak counters. Only ever incremented; never recomputed
/// from participant records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Infections ever recorded.
    #[serde(default)]
    pub infected: u64,
    /// Participants who became healers.
    #[serde(default)]
    pub healers: u64,
    /// Deaths.
    #[serde(default)]
    pub dead: u64,
    /// Cures of an active infection.
    #[serde(default)]
    pub cured: u64,
}

impl Stats {
    /// Infections that are neither cured nor dead.
    pub fn active_infections(&self) -> u64 {
        self.infected
            .saturating_sub(self.cured)
            .saturating_sub(self.dead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_infections_never_underflow() {
        let stats = Stats {
            infected: 3,
            healers: 0,
            dead: 2,
            cured: 4,
        };
        assert_eq!(stats.active_infections(), 0);
    }

    #[test]
    fn active_infections_subtracts_outcomes() {
        let stats = Stats {
            infected: 10,
            healers: 2,
            dead: 3,
            cured: 1,
        };
        assert_eq!(stats.active_infections(), 6);
    }
}
