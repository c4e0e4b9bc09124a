//! Decides which probes run when, and turns their outcomes into cache entries.
//!
//! The scheduler itself never blocks on a pooled probe and never waits: [`Scheduler::tick`] runs the inline
//! probes that are due and hands back the pooled work to dispatch, results come back through
//! [`Scheduler::complete`]. All time is passed in, which keeps the state machine testable without a clock.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use bar_protocol::{ClickEvent, ProbeId, Segment};
use tokio::time::Instant;

use crate::{
    cache::{Deadline, SegmentCache},
    config::{ExecMode, GeneralConfig, Palette},
    error::ProbeError,
    probe::{self, compat, Probe, ProbeOutcome},
    registry::Registry,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Upper bound of the time between two wake-ups.
    pub tick: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub inline_budget: Duration,
    pub palette: Palette,
}

impl SchedulerSettings {
    pub fn from_config(general: &GeneralConfig) -> Self {
        SchedulerSettings {
            tick: general.interval,
            backoff_base: general.backoff_base,
            backoff_cap: general.backoff_cap,
            inline_budget: general.inline_budget(),
            palette: general.palette(),
        }
    }

    /// Delay after the `failures`-th failure in a row: `min(cap, base * 2^(failures - 1))`.
    pub fn backoff_for(&self, failures: u32) -> Duration {
        let factor = 1u32.checked_shl(failures.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff_base.checked_mul(factor).map_or(self.backoff_cap, |backoff| backoff.min(self.backoff_cap))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ProbeState {
    Idle,
    /// Will run on the next tick, regardless of its deadline.
    Scheduled,
    Running,
    /// The last run failed. Runs again once the backoff elapsed.
    Failed,
}

/// Marks a probe as busy for as long as it lives.
/// Moved into the blocking work of a pooled run, so the probe stays busy until that work really ended.
#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).ok().map(|_| BusyGuard(flag.clone()))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub type RunId = u64;

/// A probe run to be executed on the worker pool.
pub struct PooledJob {
    pub index: usize,
    pub run_id: RunId,
    pub probe_id: ProbeId,
    probe: Arc<dyn Probe>,
    guard: BusyGuard,
}

impl PooledJob {
    /// The blocking work of this job.
    pub fn into_task(self) -> impl FnOnce() -> ProbeOutcome + Send + 'static {
        let PooledJob { probe, guard, .. } = self;
        move || {
            let _guard = guard;
            probe::execute(&*probe)
        }
    }
}

impl std::fmt::Debug for PooledJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledJob").field("probe_id", &self.probe_id).field("run_id", &self.run_id).finish_non_exhaustive()
    }
}

/// A click to be handled on the worker pool.
pub struct ClickJob {
    pub index: usize,
    pub event: ClickEvent,
    probe: Arc<dyn Probe>,
}

impl ClickJob {
    pub fn into_task(self) -> impl FnOnce() -> Result<(), ProbeError> + Send + 'static {
        let ClickJob { probe, event, .. } = self;
        move || probe::execute_click(&*probe, &event)
    }
}

impl std::fmt::Debug for ClickJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickJob").field("index", &self.index).field("event", &self.event).finish_non_exhaustive()
    }
}

/// Result of a job that ran on the worker pool.
#[derive(Debug)]
pub enum Completion {
    Run { index: usize, run_id: RunId, outcome: ProbeOutcome },
    Click { index: usize, result: Result<(), ProbeError> },
}

struct ProbeSlot {
    id: ProbeId,
    probe: Arc<dyn Probe>,
    cadence: Duration,
    mode: ExecMode,
    state: ProbeState,
    failures: u32,
    busy: Arc<AtomicBool>,
    pending_run: Option<RunId>,
}

impl ProbeSlot {
    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

pub struct Scheduler {
    slots: Vec<ProbeSlot>,
    cache: Arc<SegmentCache>,
    settings: SchedulerSettings,
    next_run_id: RunId,
}

impl Scheduler {
    pub fn new(registry: &Registry, cache: Arc<SegmentCache>, settings: SchedulerSettings) -> Self {
        let slots = registry
            .enumerate()
            .iter()
            .map(|registered| ProbeSlot {
                id: registered.id().clone(),
                probe: registered.probe.clone(),
                cadence: registered.descriptor.cadence,
                mode: registered.descriptor.mode,
                state: ProbeState::Idle,
                failures: 0,
                busy: Arc::new(AtomicBool::new(false)),
                pending_run: None,
            })
            .collect();
        Scheduler { slots, cache, settings, next_run_id: 0 }
    }

    pub fn state(&self, index: usize) -> Option<ProbeState> {
        self.slots.get(index).map(|slot| slot.state)
    }

    pub fn mode(&self, index: usize) -> Option<ExecMode> {
        self.slots.get(index).map(|slot| slot.mode)
    }

    pub fn failures(&self, index: usize) -> Option<u32> {
        self.slots.get(index).map(|slot| slot.failures)
    }

    /// Number of pooled runs whose outcome has not been reported yet.
    pub fn in_flight(&self) -> usize {
        self.slots.iter().filter(|slot| slot.pending_run.is_some()).count()
    }

    fn is_due(&self, slot: &ProbeSlot, now: Instant) -> bool {
        if slot.is_busy() {
            return false;
        }
        slot.state == ProbeState::Scheduled || self.cache.deadline(slot.id.as_str()).map_or(true, |deadline| deadline.is_due(now))
    }

    /// Run every inline probe that is due, in registry order, and return the pooled runs to dispatch.
    pub fn tick(&mut self, now: Instant) -> Vec<PooledJob> {
        let mut jobs = Vec::new();
        for index in 0..self.slots.len() {
            if !self.is_due(&self.slots[index], now) {
                continue;
            }
            self.slots[index].state = ProbeState::Scheduled;
            match self.slots[index].mode {
                ExecMode::Inline => self.run_inline(index, now),
                ExecMode::Pooled => jobs.extend(self.start_pooled(index)),
            }
        }
        jobs
    }

    fn run_inline(&mut self, index: usize, now: Instant) {
        let slot = &mut self.slots[index];
        slot.state = ProbeState::Running;
        let started = std::time::Instant::now();
        let outcome = probe::execute(&*slot.probe);
        let elapsed = started.elapsed();
        if elapsed > self.settings.inline_budget {
            log::warn!(
                "Inline probe `{}` took {:?} (budget {:?}), running it on the worker pool from now on",
                slot.id,
                elapsed,
                self.settings.inline_budget
            );
            slot.mode = ExecMode::Pooled;
        }
        self.apply_outcome(index, outcome, now);
    }

    fn start_pooled(&mut self, index: usize) -> Option<PooledJob> {
        let run_id = self.next_run_id;
        let slot = &mut self.slots[index];
        let Some(guard) = BusyGuard::acquire(&slot.busy) else {
            log::debug!("Probe `{}` is still running, skipping it this tick", slot.id);
            return None;
        };
        self.next_run_id += 1;
        slot.state = ProbeState::Running;
        slot.pending_run = Some(run_id);
        Some(PooledJob { index, run_id, probe_id: slot.id.clone(), probe: slot.probe.clone(), guard })
    }

    /// Apply the result of a job that ran on the worker pool.
    pub fn complete(&mut self, completion: Completion, now: Instant) {
        match completion {
            Completion::Run { index, run_id, outcome } => {
                let Some(slot) = self.slots.get_mut(index) else { return };
                if slot.pending_run != Some(run_id) {
                    log::debug!("Discarding outdated result of probe `{}` (run {})", slot.id, run_id);
                    return;
                }
                slot.pending_run = None;
                self.apply_outcome(index, outcome, now);
            }
            Completion::Click { index, result: Ok(()) } => self.request_refresh(index, now),
            Completion::Click { index, result: Err(err) } => {
                if let Some(slot) = self.slots.get(index) {
                    log::warn!("Click handler of probe `{}` failed: {}", slot.id, err);
                }
                self.apply_outcome(index, Err(err), now);
            }
        }
    }

    fn apply_outcome(&mut self, index: usize, outcome: ProbeOutcome, now: Instant) {
        if index >= self.slots.len() {
            return;
        }
        let backoff = match &outcome {
            Err(_) => Some(self.settings.backoff_for(self.slots[index].failures.saturating_add(1))),
            Ok(_) => None,
        };
        let slot = &mut self.slots[index];
        match outcome {
            Ok(output) => {
                if slot.failures > 0 {
                    log::info!("Probe `{}` recovered after {} failure(s)", slot.id, slot.failures);
                }
                slot.failures = 0;
                slot.state = ProbeState::Idle;
                let valid_until = match output.cached_until {
                    Some(duration) => Deadline::At(now + duration),
                    None if slot.cadence.is_zero() => Deadline::OnDemand,
                    None => Deadline::At(now + slot.cadence),
                };
                let segments = compat::finalize(&slot.id, output.segments, &self.settings.palette);
                self.cache.replace_probe(&slot.id, segments, valid_until, now);
            }
            Err(err) => {
                let backoff = backoff.unwrap_or(self.settings.backoff_cap);
                slot.failures = slot.failures.saturating_add(1);
                slot.state = ProbeState::Failed;
                log::warn!("Probe `{}` failed ({} in a row), retrying in {:?}: {}", slot.id, slot.failures, backoff, err);
                let mut segment = Segment::text(format!("{}: {}", slot.id, err.class()))
                    .with_name(slot.id.as_str())
                    .with_color(self.settings.palette.bad.as_str());
                segment.urgent = Some(true);
                self.cache.replace_probe(&slot.id, vec![segment], Deadline::At(now + backoff), now);
            }
        }
    }

    /// Schedule a single probe for the next tick.
    pub fn request_refresh(&mut self, index: usize, now: Instant) {
        let Some(slot) = self.slots.get_mut(index) else { return };
        self.cache.expire(slot.id.as_str(), now);
        if !slot.is_busy() {
            slot.state = ProbeState::Scheduled;
        }
    }

    /// Expire everything, and schedule every probe that is not running right now for the next tick.
    pub fn refresh_all(&mut self, now: Instant) {
        log::info!("Refreshing all probes");
        self.cache.expire_all(now);
        for slot in self.slots.iter_mut().filter(|slot| !slot.is_busy()) {
            slot.state = ProbeState::Scheduled;
        }
    }

    /// Find the probe a click belongs to. Clicks on anything that is not a probe segment are dropped.
    pub fn route_click(&self, registry: &Registry, event: ClickEvent) -> Option<ClickJob> {
        let Some(index) = registry.index_of(&event.name) else {
            log::debug!("Ignoring click on `{}`, which is not a probe", event.name);
            return None;
        };
        let slot = &self.slots[index];
        if !slot.probe.handles_clicks() {
            log::debug!("Ignoring click on probe `{}`, which does not handle clicks", slot.id);
            return None;
        }
        log::debug!("Routing {} click to probe `{}`", event.mouse_button(), slot.id);
        Some(ClickJob { index, event, probe: slot.probe.clone() })
    }

    /// When the scheduler should wake up next, at the latest one tick from now.
    pub fn next_wake(&self, now: Instant) -> Instant {
        let latest = now + self.settings.tick;
        let earliest_due = self
            .slots
            .iter()
            .filter(|slot| !slot.is_busy())
            .filter_map(|slot| {
                if slot.state == ProbeState::Scheduled {
                    return Some(now);
                }
                let Some(entry) = self.cache.entry(slot.id.as_str()) else { return Some(now) };
                match entry.valid_until {
                    Deadline::OnDemand => None,
                    // a result that is stale right away is refreshed once per tick
                    Deadline::At(at) if at <= entry.produced_at => Some(entry.produced_at + self.settings.tick),
                    Deadline::At(at) => Some(at),
                }
            })
            .min();
        earliest_due.map_or(latest, |due| due.clamp(now, latest))
    }
}
