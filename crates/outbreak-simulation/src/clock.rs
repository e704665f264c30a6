use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, NaiveTime, Utc};

/// Source of wall-clock time for the simulation.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// A clock stopped at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Jump to `to`, forwards or backwards.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }

    /// Move the clock forward. Returns the new time.
    pub fn advance(&self, by: Duration) -> DateTime<Utc> {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
        *now
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The first UTC midnight strictly after `now`.
pub fn next_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    (now.date_naive() + Duration::days(1))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// The cycle after `due`, skipping any days already in the past so a late
/// start fires once rather than once per missed day.
pub fn following_cycle(due: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let mut next = due + Duration::days(1);
    if next <= now {
        let behind = (now - next).num_days() + 1;
        next += Duration::days(behind);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn manual_clock_advances_all_clones() {
        let clock = ManualClock::new(at("2020-02-10T12:00:00Z"));
        let other = clock.clone();
        clock.advance(Duration::hours(13));
        assert_eq!(other.now(), at("2020-02-11T01:00:00Z"));
        other.set(at("2021-01-01T00:00:00Z"));
        assert_eq!(clock.now(), at("2021-01-01T00:00:00Z"));
    }

    #[test]
    fn next_midnight_is_strictly_after() {
        assert_eq!(next_midnight(at("2020-02-10T12:00:00Z")), at("2020-02-11T00:00:00Z"));
        assert_eq!(next_midnight(at("2020-02-10T00:00:00Z")), at("2020-02-11T00:00:00Z"));
        assert_eq!(next_midnight(at("2020-12-31T23:59:59Z")), at("2021-01-01T00:00:00Z"));
    }

    #[test]
    fn following_cycle_on_time() {
        let due = at("2020-02-11T00:00:00Z");
        assert_eq!(following_cycle(due, at("2020-02-11T00:00:01Z")), at("2020-02-12T00:00:00Z"));
    }

    #[test]
    fn following_cycle_skips_missed_days() {
        let due = at("2020-02-11T00:00:00Z");
        let now = at("2020-02-14T09:30:00Z");
        let next = following_cycle(due, now);
        assert_eq!(next, at("2020-02-15T00:00:00Z"));
        assert!(next > now);
    }

    #[test]
    fn following_cycle_exactly_on_boundary() {
        let due = at("2020-02-11T00:00:00Z");
        let next = following_cycle(due, at("2020-02-13T00:00:00Z"));
        assert_eq!(next, at("2020-02-14T00:00:00Z"));
    }
}
