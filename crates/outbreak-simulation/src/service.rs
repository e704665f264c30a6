//! The epidemic orchestrator.
//!
//! [`EpidemicService`] owns the document store, the compiled catalog, the
//! venue activity window and the scheduler task, and exposes every
//! operation the command layer can request. Each operation mutates the
//! document under its lock, persists, and only then talks to the
//! collaborators, so a failed notification never undoes game state.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use outbreak_core::{Document, Item, Participant, ParticipantId, Signal, Stats, VenueId};
use outbreak_dsl::{Effect, EffectResult};
use outbreak_store::Store;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::catalog::{self, ItemCatalog};
use crate::clock::{self, Clock};
use crate::collaborators::Collaborators;
use crate::config::{EpidemicConfig, Recruits};
use crate::engine::EffectEngine;
use crate::error::{EpidemicError, EpidemicResult, InvalidOperation};
use crate::narration::{self, Transition};
use crate::recruitment::Recruitment;
use crate::registry::ParticipantRegistry;
use crate::scheduler;
use crate::venue::VenueActivity;

/// What a restock does besides refilling stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestockMode {
    /// Refill only.
    Restock,
    /// Refill and show in the shop.
    Unlock,
    /// Refill and hide from the shop.
    Lock,
}

/// A game-master override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    /// Infect at the initial sickness.
    Infect,
    /// Grant the healer flag.
    Heal,
    /// Latch death.
    Kill,
    /// Reset sickness to zero.
    Cure,
}

/// One owned item and its remaining uses.
#[derive(Debug, Clone, PartialEq)]
pub struct BackpackEntry {
    /// The catalog entry.
    pub item: Item,
    /// Uses left.
    pub remaining: u32,
}

impl BackpackEntry {
    /// Items with `uses == 0` are special: owned, never usable.
    pub fn is_special(&self) -> bool {
        self.item.is_special()
    }
}

/// Aggregate counters plus the number of known participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsReport {
    /// Records in the document, dead ones included.
    pub participants: usize,
    /// Running totals.
    pub stats: Stats,
}

impl StatsReport {
    /// See [`Stats::active_infections`].
    pub fn active_infections(&self) -> u64 {
        self.stats.active_infections()
    }
}

/// What a cycle (or the epidemic start) did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Who was drawn from the venues.
    pub recruited: Recruitment,
    /// Participants that received the daily progression.
    pub progressed: usize,
    /// Participants whose progression latched death.
    pub died: Vec<ParticipantId>,
    /// When the following cycle is due; a forced cycle leaves it as it was.
    pub next_cycle: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleMode {
    /// Only if `next_cycle` has passed; advances `next_cycle`.
    Due,
    /// Unconditionally; leaves `next_cycle` alone.
    Forced,
}

type Events = Vec<(ParticipantId, Transition)>;

/// The running epidemic.
pub struct EpidemicService {
    config: EpidemicConfig,
    store: Store<Document>,
    catalog: RwLock<ItemCatalog>,
    engine: EffectEngine,
    registry: ParticipantRegistry,
    activity: Mutex<VenueActivity>,
    rng: Mutex<StdRng>,
    clock: Arc<dyn Clock>,
    collaborators: Collaborators,
    purchase_gates: Mutex<HashMap<VenueId, Arc<tokio::sync::Mutex<()>>>>,
    restocking: AtomicUsize,
    in_use: Mutex<HashSet<ParticipantId>>,
    pub(crate) schedule: watch::Sender<Option<DateTime<Utc>>>,
    cycles: watch::Sender<u64>,
    shutdown: watch::Sender<bool>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for EpidemicService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpidemicService")
            .field("data_file", &self.store.path())
            .field("next_cycle", &*self.schedule.borrow())
            .field("cycles", &*self.cycles.borrow())
            .finish_non_exhaustive()
    }
}

impl EpidemicService {
    /// Load the catalog definitions, open (or initialize) the document and
    /// compile every stored item's scripts. A script that fails to compile
    /// or a corrupt document is fatal.
    pub async fn open(
        config: EpidemicConfig,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> EpidemicResult<Arc<Self>> {
        let definitions = catalog::load_definitions(config.catalog.as_deref())?;
        let store = Store::open(config.data_file.clone(), || Document::with_catalog(definitions))?;

        let (next_cycle, compiled, participants) = {
            let doc = store.lock().await;
            (doc.next_cycle, ItemCatalog::compile(&doc.store)?, doc.participants.len())
        };

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        info!(
            path = %store.path().display(),
            items = compiled.len(),
            participants,
            next_cycle = ?next_cycle,
            "epidemic service opened"
        );

        Ok(Arc::new(Self {
            engine: EffectEngine::new(collaborators.clone(), config.input_timeout()),
            registry: ParticipantRegistry::new(config.immunocompromised_rate),
            activity: Mutex::new(VenueActivity::new(config.recent_window)),
            rng: Mutex::new(rng),
            catalog: RwLock::new(compiled),
            purchase_gates: Mutex::new(HashMap::new()),
            restocking: AtomicUsize::new(0),
            in_use: Mutex::new(HashSet::new()),
            schedule: watch::Sender::new(next_cycle),
            cycles: watch::Sender::new(0),
            shutdown: watch::Sender::new(false),
            scheduler: Mutex::new(None),
            store,
            clock,
            collaborators,
            config,
        }))
    }

    /// The configuration the service was opened with.
    pub fn config(&self) -> &EpidemicConfig {
        &self.config
    }

    /// Current time from the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// When the next cycle is due, if the epidemic has started.
    pub fn next_cycle(&self) -> Option<DateTime<Utc>> {
        *self.schedule.borrow()
    }

    /// Completed cycles since this service was opened.
    pub fn subscribe_cycles(&self) -> watch::Receiver<u64> {
        self.cycles.subscribe()
    }

    // -----------------------------------------------------------------------
    // Participants
    // -----------------------------------------------------------------------

    /// The participant record for `member`, created on first sight.
    pub async fn participant(&self, member: ParticipantId) -> EpidemicResult<Participant> {
        let mut rng = self.fork_rng();
        let (participant, created) = {
            let mut doc = self.store.lock().await;
            let (p, created) = self.registry.get_or_create(&mut doc.participants, member, &mut rng);
            (p.clone(), created)
        };
        if created {
            self.store.save().await?;
        }
        Ok(participant)
    }

    /// The per-message epidemic step for `member` speaking in `venue`.
    pub async fn observe_message(
        &self,
        venue: VenueId,
        member: ParticipantId,
    ) -> EpidemicResult<Option<Transition>> {
        let now = self.now();
        let mut rng = self.fork_rng();
        let (dirty, events, stats) = {
            let mut guard = self.store.lock().await;
            let doc = &mut *guard;
            let rate = lock(&self.activity).transmission(venue, doc);
            let (p, created) = self.registry.get_or_create(&mut doc.participants, member, &mut rng);
            let before = p.clone();
            if p.is_susceptible() {
                if rng.random::<f64>() < rate {
                    p.infect(now);
                }
            } else if p.is_infectious() {
                p.add_sickness(None, &mut rng, now);
            }
            let events = transitions(&before, p, false);
            let dirty = created || *p != before;
            tally(&mut doc.stats, &events);
            lock(&self.activity).record(venue, member);
            (dirty, events, doc.stats)
        };
        if dirty {
            self.store.save().await?;
        }
        self.notify(&events, &stats).await;
        Ok(events.first().map(|(_, t)| *t))
    }

    /// Owned items in catalog order.
    pub async fn backpack(&self, member: ParticipantId) -> EpidemicResult<Vec<BackpackEntry>> {
        let participant = self.participant(member).await?;
        let doc = self.store.lock().await;
        Ok(doc
            .store
            .iter()
            .filter_map(|item| {
                participant.remaining_uses(&item.id).map(|remaining| BackpackEntry {
                    item: item.clone(),
                    remaining,
                })
            })
            .collect())
    }

    // -----------------------------------------------------------------------
    // Shop
    // -----------------------------------------------------------------------

    /// Items `member` could buy right now.
    pub async fn shop(&self, member: ParticipantId) -> EpidemicResult<Vec<Item>> {
        let participant = self.participant(member).await?;
        let catalog = self.catalog.read().await;
        let doc = self.store.lock().await;
        Ok(doc
            .store
            .iter()
            .filter(|item| holds(catalog.is_buyable(item, &participant), item))
            .cloned()
            .collect())
    }

    /// Buy one unit of `item_id`. Buyers in the same venue are served one at
    /// a time, in arrival order.
    pub async fn buy(&self, member: ParticipantId, item_id: &str, venue: VenueId) -> EpidemicResult<Item> {
        self.ensure_not_restocking()?;
        let gate = self.purchase_gate(venue);
        let _turn = gate.lock().await;
        self.ensure_not_restocking()?;

        let mut rng = self.fork_rng();
        let (result, created) = {
            let catalog = self.catalog.read().await;
            let mut guard = self.store.lock().await;
            let doc = &mut *guard;
            let (participant, created) = self.registry.get_or_create(&mut doc.participants, member, &mut rng);
            let result = match doc.store.iter_mut().find(|i| i.id == item_id) {
                Some(item) => purchase(&catalog, item, participant).map(|()| item.clone()),
                None => Err(InvalidOperation::UnknownItem(item_id.to_string()).into()),
            };
            (result, created)
        };
        if created || result.is_ok() {
            self.store.save().await?;
        }
        let item = result?;
        info!(member = %member, item = %item.id, in_stock = item.in_stock, "item bought");
        Ok(item)
    }

    /// Run the effect of an owned item. Eligibility is checked before the
    /// effect starts and again before its result is committed.
    pub async fn use_item(&self, member: ParticipantId, item_id: &str, venue: VenueId) -> EpidemicResult<Signal> {
        let _claim = self.claim_use(member)?;
        let now = self.now();
        let mut rng = self.fork_rng();

        let (checked, created) = {
            let catalog = self.catalog.read().await;
            let mut guard = self.store.lock().await;
            let doc = &mut *guard;
            let (participant, created) = self.registry.get_or_create(&mut doc.participants, member, &mut rng);
            let item = doc.store.iter().find(|i| i.id == item_id);
            let checked = usable_effect(&catalog, item, participant, item_id)
                .map(|effect| (participant.clone(), effect.clone()));
            (checked, created)
        };
        if created {
            self.store.save().await?;
        }
        let (snapshot, effect) = checked?;

        let applied = self.engine.apply(&effect, &snapshot, venue, &mut rng, now).await?;

        let (events, stats) = {
            let catalog = self.catalog.read().await;
            let mut guard = self.store.lock().await;
            let doc = &mut *guard;
            let item = doc.store.iter().find(|i| i.id == item_id);
            let stored = doc
                .participants
                .get_mut(&member)
                .ok_or_else(|| InvalidOperation::NotUsable(item_id.to_string()))?;
            usable_effect(&catalog, item, stored, item_id)?;

            let before = stored.clone();
            stored.apply_change(&snapshot, &applied.participant, now);
            stored.consume_use(item_id);
            let cured = applied.signal == Signal::Cured && before.sickness() > 0 && stored.sickness() == 0;
            let events = transitions(&before, stored, cured);
            tally(&mut doc.stats, &events);
            (events, doc.stats)
        };
        self.store.save().await?;
        info!(member = %member, item = %item_id, signal = %applied.signal, "item used");

        self.notify(&events, &stats).await;
        Ok(applied.signal)
    }

    /// Refill the named items to their totals, optionally locking or
    /// unlocking them. Reports whether each id was found.
    pub async fn restock(&self, ids: &[String], mode: RestockMode) -> EpidemicResult<Vec<(String, bool)>> {
        let _restocking = self.begin_restock();
        let report: Vec<(String, bool)> = {
            let mut doc = self.store.lock().await;
            ids.iter()
                .map(|id| {
                    let Some(item) = doc.item_mut(id) else {
                        return (id.clone(), false);
                    };
                    item.restock();
                    match mode {
                        RestockMode::Restock => {}
                        RestockMode::Unlock => item.unlocked = true,
                        RestockMode::Lock => item.unlocked = false,
                    }
                    (id.clone(), true)
                })
                .collect()
        };
        self.store.save().await?;
        info!(items = report.len(), mode = ?mode, "store restocked");
        Ok(report)
    }

    /// Re-read the catalog definitions and append items beyond the stored
    /// list. Existing items keep their position, stock and flags. Returns how
    /// many were added.
    pub async fn refresh_catalog(&self) -> EpidemicResult<usize> {
        let _restocking = self.begin_restock();
        let fresh = catalog::load_definitions(self.config.catalog.as_deref())?;
        let added = {
            let mut catalog = self.catalog.write().await;
            let mut doc = self.store.lock().await;
            let mut merged = doc.store.clone();
            let added = catalog::merge_refresh(&mut merged, fresh);
            *catalog = ItemCatalog::compile(&merged)?;
            doc.store = merged;
            added
        };
        self.store.save().await?;
        info!(added, "catalog refreshed");
        Ok(added)
    }

    /// Every catalog item with its current stock and flags.
    pub async fn items(&self) -> Vec<Item> {
        self.store.lock().await.store.clone()
    }

    // -----------------------------------------------------------------------
    // Reporting and administration
    // -----------------------------------------------------------------------

    /// Snapshot of the counters.
    pub async fn stats(&self) -> StatsReport {
        let doc = self.store.lock().await;
        StatsReport {
            participants: doc.participants.len(),
            stats: doc.stats,
        }
    }

    /// Current transmission probability of every venue seen so far.
    pub async fn venue_rates(&self) -> Vec<(VenueId, f64)> {
        let doc = self.store.lock().await;
        lock(&self.activity).rates(&doc)
    }

    /// Fill the in-memory venue windows from the chat platform's history, so
    /// a freshly started process does not treat every venue as empty.
    /// Returns how many venues were warmed.
    pub async fn warm_venues(&self) -> usize {
        let mut warmed = 0;
        for venue in &self.config.venues {
            let senders = match self
                .collaborators
                .chat
                .recent_senders(*venue, self.config.recent_window)
                .await
            {
                Ok(senders) => senders,
                Err(e) => {
                    warn!(venue = %venue, error = %e, "could not read recent senders");
                    continue;
                }
            };
            let mut activity = lock(&self.activity);
            // Oldest first, so the most recent sender ends up in front.
            for member in senders.iter().rev() {
                activity.record(*venue, *member);
            }
            warmed += 1;
        }
        debug!(venues = warmed, "venue windows warmed");
        warmed
    }

    /// Post an administrative announcement to the narrative sink.
    pub async fn announce(&self, text: &str) {
        self.narrate(&narration::announcement(text)).await;
    }

    /// Shorthand for [`AdminAction::Infect`].
    pub async fn force_infect(&self, member: ParticipantId) -> EpidemicResult<bool> {
        self.force(member, AdminAction::Infect).await
    }

    /// Shorthand for [`AdminAction::Heal`].
    pub async fn force_heal(&self, member: ParticipantId) -> EpidemicResult<bool> {
        self.force(member, AdminAction::Heal).await
    }

    /// Shorthand for [`AdminAction::Kill`].
    pub async fn force_kill(&self, member: ParticipantId) -> EpidemicResult<bool> {
        self.force(member, AdminAction::Kill).await
    }

    /// Shorthand for [`AdminAction::Cure`].
    pub async fn force_cure(&self, member: ParticipantId) -> EpidemicResult<bool> {
        self.force(member, AdminAction::Cure).await
    }

    /// Apply a game-master override. Returns `false` when it changed
    /// nothing (already infected, already a healer, nothing to cure).
    pub async fn force(&self, member: ParticipantId, action: AdminAction) -> EpidemicResult<bool> {
        let now = self.now();
        let mut rng = self.fork_rng();
        let (dirty, events, stats) = {
            let mut guard = self.store.lock().await;
            let doc = &mut *guard;
            let (p, created) = self.registry.get_or_create(&mut doc.participants, member, &mut rng);
            if p.is_dead() {
                return Err(EpidemicError::AlreadyDead(member));
            }
            let before = p.clone();
            let changed = match action {
                AdminAction::Infect => p.infect(now),
                AdminAction::Heal => p.become_healer(),
                AdminAction::Kill => p.kill(now),
                AdminAction::Cure => {
                    let sick = p.sickness() > 0;
                    p.cure();
                    sick
                }
            };
            let events = transitions(&before, p, action == AdminAction::Cure && changed);
            tally(&mut doc.stats, &events);
            (changed || created, events, doc.stats)
        };
        if dirty {
            self.store.save().await?;
        }
        info!(member = %member, action = ?action, changed = !events.is_empty(), "admin override");
        self.notify(&events, &stats).await;
        Ok(!events.is_empty())
    }

    // -----------------------------------------------------------------------
    // Epidemic lifecycle
    // -----------------------------------------------------------------------

    /// Recruit the first infected and healers and schedule the first cycle
    /// for the next UTC midnight.
    pub async fn begin_epidemic(&self) -> EpidemicResult<CycleReport> {
        if self.store.lock().await.started() {
            return Err(InvalidOperation::AlreadyStarted.into());
        }
        let senders = self.gather_senders().await;
        let now = self.now();
        let mut rng = self.fork_rng();

        let report = {
            let mut guard = self.store.lock().await;
            let doc = &mut *guard;
            if doc.started() {
                return Err(InvalidOperation::AlreadyStarted.into());
            }
            let recruited = self.recruit(doc, &senders, self.config.initial_recruits, &mut rng, now);
            doc.event_started = Some(now);
            doc.next_cycle = Some(clock::next_midnight(now));
            CycleReport {
                recruited,
                next_cycle: doc.next_cycle,
                ..CycleReport::default()
            }
        };
        self.store.save().await?;
        self.schedule.send_replace(report.next_cycle);
        info!(
            infected = report.recruited.infected.len(),
            healers = report.recruited.healers.len(),
            next_cycle = ?report.next_cycle,
            "epidemic started"
        );

        self.announce_recruits(&report.recruited).await;
        Ok(report)
    }

    /// Run the cycle if it is due. `None` when nothing was due.
    pub async fn run_due_cycle(&self) -> EpidemicResult<Option<CycleReport>> {
        let due = self.store.lock().await.next_cycle;
        match due {
            Some(due) if due <= self.now() => self.cycle(CycleMode::Due).await,
            _ => Ok(None),
        }
    }

    /// Run a cycle now, without moving the schedule.
    pub async fn force_cycle(&self) -> EpidemicResult<CycleReport> {
        self.cycle(CycleMode::Forced)
            .await?
            .ok_or_else(|| EpidemicError::from(InvalidOperation::NotStarted))
    }

    /// Spawn the day-cycle scheduler unless it is already running.
    pub fn start_scheduler(self: &Arc<Self>) {
        let mut slot = lock(&self.scheduler);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        *slot = Some(tokio::spawn(scheduler::run(
            Arc::downgrade(self),
            self.schedule.subscribe(),
            self.shutdown.subscribe(),
        )));
    }

    /// Stop the scheduler, wait for any cycle in progress, and flush the
    /// document.
    pub async fn shutdown(&self) -> EpidemicResult<()> {
        self.shutdown.send_replace(true);
        let handle = lock(&self.scheduler).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "scheduler task failed");
            }
        }
        self.store.save().await?;
        info!("epidemic service stopped");
        Ok(())
    }

    async fn cycle(&self, mode: CycleMode) -> EpidemicResult<Option<CycleReport>> {
        let senders = self.gather_senders().await;
        let now = self.now();
        let mut rng = self.fork_rng();

        // The transaction holds the document from the first change until the
        // save finished, so a rollback cannot swallow another task's commit.
        let mut tx = self.store.transaction().await;
        let (report, events, stats, previous) = {
            let doc = &mut *tx;
            let Some(due) = doc.next_cycle else {
                return match mode {
                    CycleMode::Due => Ok(None),
                    CycleMode::Forced => Err(InvalidOperation::NotStarted.into()),
                };
            };
            if mode == CycleMode::Due && due > now {
                return Ok(None);
            }
            let previous = doc.clone();

            let infectious: Vec<ParticipantId> = doc
                .participants
                .values()
                .filter(|p| p.is_infectious())
                .map(Participant::member_id)
                .collect();
            let recruited = self.recruit(doc, &senders, self.config.daily_recruits, &mut rng, now);

            let mut events = Events::new();
            for id in &infectious {
                if let Some(p) = doc.participants.get_mut(id) {
                    let before = p.clone();
                    p.add_sickness(Some(self.config.daily_progression), &mut rng, now);
                    events.extend(transitions(&before, p, false));
                }
            }
            tally(&mut doc.stats, &events);

            if mode == CycleMode::Due {
                doc.next_cycle = Some(clock::following_cycle(due, now));
            }
            let report = CycleReport {
                recruited,
                progressed: infectious.len(),
                died: events
                    .iter()
                    .filter(|(_, t)| *t == Transition::Died)
                    .map(|(id, _)| *id)
                    .collect(),
                next_cycle: doc.next_cycle,
            };
            (report, events, doc.stats, previous)
        };

        if let Err(e) = tx.save().await {
            // Nothing of this cycle reached disk; forget it so a retry runs it in full.
            *tx = previous;
            return Err(e.into());
        }
        drop(tx);
        self.schedule.send_replace(report.next_cycle);
        self.cycles.send_modify(|n| *n += 1);
        info!(
            infected = report.recruited.infected.len(),
            healers = report.recruited.healers.len(),
            progressed = report.progressed,
            died = report.died.len(),
            next_cycle = ?report.next_cycle,
            "day cycle complete"
        );

        self.announce_recruits(&report.recruited).await;
        self.notify(&events, &stats).await;
        Ok(Some(report))
    }

    /// Draw recruits from every venue's senders and apply them to `doc`.
    fn recruit(
        &self,
        doc: &mut Document,
        senders: &[Vec<ParticipantId>],
        wanted: Recruits,
        rng: &mut StdRng,
        now: DateTime<Utc>,
    ) -> Recruitment {
        let assigned: BTreeSet<ParticipantId> = doc
            .participants
            .values()
            .filter(|p| p.infected() || p.healer() || p.is_dead())
            .map(Participant::member_id)
            .collect();

        let mut recruitment = Recruitment::default();
        for venue_senders in senders {
            recruitment.draw_from(rng, venue_senders, &assigned, wanted);
        }

        let mut events = Events::new();
        for id in &recruitment.infected {
            let (p, _) = self.registry.get_or_create(&mut doc.participants, *id, rng);
            let before = p.clone();
            p.infect(now);
            events.extend(transitions(&before, p, false));
        }
        for id in &recruitment.healers {
            let (p, _) = self.registry.get_or_create(&mut doc.participants, *id, rng);
            let before = p.clone();
            p.become_healer();
            events.extend(transitions(&before, p, false));
        }
        tally(&mut doc.stats, &events);
        recruitment
    }

    async fn gather_senders(&self) -> Vec<Vec<ParticipantId>> {
        let mut all = Vec::with_capacity(self.config.venues.len());
        for venue in &self.config.venues {
            match self
                .collaborators
                .chat
                .recent_senders(*venue, self.config.history_limit)
                .await
            {
                Ok(senders) => all.push(senders),
                Err(e) => warn!(venue = %venue, error = %e, "could not read recent senders"),
            }
        }
        all
    }

    // -----------------------------------------------------------------------
    // Notifications (after persistence, failures swallowed)
    // -----------------------------------------------------------------------

    async fn notify(&self, events: &[(ParticipantId, Transition)], stats: &Stats) {
        for (member, transition) in events {
            match transition {
                Transition::Infected => self.grant(*member, &self.config.infected_role).await,
                Transition::BecameHealer => self.grant(*member, &self.config.healer_role).await,
                Transition::Died | Transition::Cured => {}
            }
            if let Some(name) = self.display_name(*member).await {
                self.narrate(&transition.message(&name, stats)).await;
            }
        }
    }

    async fn announce_recruits(&self, recruited: &Recruitment) {
        for member in &recruited.infected {
            self.grant(*member, &self.config.infected_role).await;
        }
        for member in &recruited.healers {
            self.grant(*member, &self.config.healer_role).await;
        }
        let infected = self.display_names(&recruited.infected).await;
        if !infected.is_empty() {
            self.narrate(&narration::recruits_infected(&infected)).await;
        }
        let healers = self.display_names(&recruited.healers).await;
        if !healers.is_empty() {
            self.narrate(&narration::recruits_healers(&healers)).await;
        }
    }

    async fn grant(&self, member: ParticipantId, role: &str) {
        if let Err(e) = self.collaborators.chat.grant_role(member, role).await {
            warn!(member = %member, role, error = %e, "role grant failed");
        }
    }

    async fn display_name(&self, member: ParticipantId) -> Option<String> {
        match self.collaborators.chat.display_name(member).await {
            Ok(name) => Some(name),
            Err(e) => {
                warn!(member = %member, error = %e, "could not resolve display name");
                None
            }
        }
    }

    async fn display_names(&self, members: &[ParticipantId]) -> Vec<String> {
        let mut names = Vec::with_capacity(members.len());
        for member in members {
            if let Some(name) = self.display_name(*member).await {
                names.push(name);
            }
        }
        names
    }

    async fn narrate(&self, text: &str) {
        match self.collaborators.narrative.announce(text).await {
            Ok(()) => debug!(text, "narrated"),
            Err(e) => warn!(error = %e, "narrative announcement failed"),
        }
    }

    // -----------------------------------------------------------------------
    // Guards
    // -----------------------------------------------------------------------

    /// An independent generator for one operation, so the shared one is
    /// never held across a suspension point.
    fn fork_rng(&self) -> StdRng {
        StdRng::from_rng(&mut *lock(&self.rng))
    }

    fn purchase_gate(&self, venue: VenueId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(lock(&self.purchase_gates).entry(venue).or_default())
    }

    fn ensure_not_restocking(&self) -> Result<(), InvalidOperation> {
        if self.restocking.load(Ordering::SeqCst) > 0 {
            return Err(InvalidOperation::Restocking);
        }
        Ok(())
    }

    fn begin_restock(&self) -> RestockGuard<'_> {
        self.restocking.fetch_add(1, Ordering::SeqCst);
        RestockGuard(&self.restocking)
    }

    fn claim_use(&self, member: ParticipantId) -> Result<UseClaim<'_>, InvalidOperation> {
        if !lock(&self.in_use).insert(member) {
            return Err(InvalidOperation::UseInProgress);
        }
        Ok(UseClaim {
            in_use: &self.in_use,
            member,
        })
    }
}

struct RestockGuard<'a>(&'a AtomicUsize);

impl Drop for RestockGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct UseClaim<'a> {
    in_use: &'a Mutex<HashSet<ParticipantId>>,
    member: ParticipantId,
}

impl Drop for UseClaim<'_> {
    fn drop(&mut self) {
        lock(self.in_use).remove(&self.member);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A predicate that fails at runtime counts as not holding.
fn holds(result: EffectResult<bool>, item: &Item) -> bool {
    result.unwrap_or_else(|e| {
        warn!(item = %item.id, error = %e, "predicate failed");
        false
    })
}

fn purchase(catalog: &ItemCatalog, item: &mut Item, participant: &mut Participant) -> EpidemicResult<()> {
    if participant.is_dead() {
        return Err(EpidemicError::AlreadyDead(participant.member_id()));
    }
    if !holds(catalog.is_buyable(item, participant), item) || !item.take_one() {
        return Err(InvalidOperation::NotBuyable(item.id.clone()).into());
    }
    participant.acquire(&item.id, item.uses);
    Ok(())
}

fn usable_effect<'c>(
    catalog: &'c ItemCatalog,
    item: Option<&Item>,
    participant: &Participant,
    item_id: &str,
) -> EpidemicResult<&'c Effect> {
    if participant.is_dead() {
        return Err(EpidemicError::AlreadyDead(participant.member_id()));
    }
    if !participant.owns(item_id) {
        return Err(InvalidOperation::NotOwned(item_id.to_string()).into());
    }
    let (Some(item), Some(compiled)) = (item, catalog.get(item_id)) else {
        return Err(InvalidOperation::UnknownItem(item_id.to_string()).into());
    };
    if !holds(catalog.is_usable(item, participant), item) {
        return Err(InvalidOperation::NotUsable(item_id.to_string()).into());
    }
    Ok(&compiled.effect)
}

/// State changes between two versions of one participant.
fn transitions(before: &Participant, after: &Participant, cured: bool) -> Events {
    let id = after.member_id();
    let mut events = Events::new();
    if !before.infected() && after.infected() {
        events.push((id, Transition::Infected));
    }
    if !before.healer() && after.healer() {
        events.push((id, Transition::BecameHealer));
    }
    if cured && !after.is_dead() {
        events.push((id, Transition::Cured));
    }
    if !before.is_dead() && after.is_dead() {
        events.push((id, Transition::Died));
    }
    events
}

fn tally(stats: &mut Stats, events: &[(ParticipantId, Transition)]) {
    for (_, transition) in events {
        match transition {
            Transition::Infected => stats.infected += 1,
            Transition::BecameHealer => stats.healers += 1,
            Transition::Cured => stats.cured += 1,
            Transition::Died => stats.dead += 1,
        }
    }
}
