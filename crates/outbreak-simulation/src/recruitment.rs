use std::collections::BTreeSet;

use outbreak_core::ParticipantId;
use rand::Rng;

use crate::config::Recruits;

/// Members chosen to become infected or healers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recruitment {
    /// Newly infected, in draw order.
    pub infected: Vec<ParticipantId>,
    /// New healers, in draw order.
    pub healers: Vec<ParticipantId>,
}

impl Recruitment {
    /// Nobody was recruited.
    pub fn is_empty(&self) -> bool {
        self.infected.is_empty() && self.healers.is_empty()
    }

    /// Draw recruits from one venue's recent senders. Members in `exclude`
    /// or already drawn (for either pool) are skipped.
    pub fn draw_from<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        senders: &[ParticipantId],
        exclude: &BTreeSet<ParticipantId>,
        wanted: Recruits,
    ) {
        let taken: BTreeSet<ParticipantId> = exclude
            .iter()
            .chain(&self.infected)
            .chain(&self.healers)
            .copied()
            .collect();
        let infected = pick_unique(rng, wanted.infected, senders, &taken);

        let taken: BTreeSet<ParticipantId> = taken.into_iter().chain(infected.iter().copied()).collect();
        let healers = pick_unique(rng, wanted.healers, senders, &taken);

        self.infected.extend(infected);
        self.healers.extend(healers);
    }
}

/// Up to `count` distinct members of `pool` not in `taken`, uniformly at
/// random without replacement.
pub fn pick_unique<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    pool: &[ParticipantId],
    taken: &BTreeSet<ParticipantId>,
) -> Vec<ParticipantId> {
    let mut candidates: Vec<ParticipantId> = pool
        .iter()
        .copied()
        .filter(|id| !taken.contains(id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if candidates.len() <= count {
        return candidates;
    }
    let mut picked = Vec::with_capacity(count);
    for _ in 0..count {
        let index = rng.random_range(0..candidates.len());
        picked.push(candidates.swap_remove(index));
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ids(raw: &[u64]) -> Vec<ParticipantId> {
        raw.iter().copied().map(ParticipantId).collect()
    }

    #[test]
    fn small_pool_is_taken_whole() {
        let mut rng = StdRng::seed_from_u64(1);
        let picked = pick_unique(&mut rng, 5, &ids(&[3, 1, 3, 2]), &BTreeSet::new());
        assert_eq!(picked, ids(&[1, 2, 3]));
    }

    #[test]
    fn pools_never_overlap() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut recruitment = Recruitment::default();
        let exclude: BTreeSet<_> = ids(&[1]).into_iter().collect();
        recruitment.draw_from(&mut rng, &ids(&[1, 2, 3, 4]), &exclude, Recruits::new(2, 2));
        assert_eq!(recruitment.infected.len(), 2);
        assert_eq!(recruitment.healers.len(), 1);
        assert!(!recruitment.infected.contains(&ParticipantId(1)));
        assert!(!recruitment.healers.contains(&ParticipantId(1)));
        assert!(recruitment.healers.iter().all(|h| !recruitment.infected.contains(h)));

        // A second venue with the same members yields nobody new.
        recruitment.draw_from(&mut rng, &ids(&[2, 3, 4]), &exclude, Recruits::new(2, 2));
        assert_eq!(recruitment.infected.len() + recruitment.healers.len(), 3);
    }

    proptest! {
        #[test]
        fn picks_are_distinct_and_bounded(
            pool in proptest::collection::vec(0u64..40, 0..60),
            count in 0usize..10,
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let taken: BTreeSet<_> = ids(&[0, 1, 2]).into_iter().collect();
            let picked = pick_unique(&mut rng, count, &ids(&pool), &taken);
            let unique: BTreeSet<_> = picked.iter().copied().collect();
            prop_assert_eq!(unique.len(), picked.len());
            prop_assert!(picked.len() <= count);
            prop_assert!(picked.iter().all(|p| !taken.contains(p) && pool.contains(&p.0)));
        }
    }
}
