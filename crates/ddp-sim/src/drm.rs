use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ddp_hw::vblank::period_ns_from_hz;
use ddp_hw::{DrmHost, FlipEvent, HwError};

use crate::log::{SimEvent, SimLog};

/// A page-flip event as userspace would receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredEvent {
    pub pipe: u32,
    pub event: FlipEvent,
    /// Vblank counter at delivery.
    pub sequence: u64,
    pub timestamp_ns: u64,
}

type WaitHook = Arc<dyn Fn(u32) + Send + Sync>;

#[derive(Default)]
struct DrmState {
    vblank_refs: BTreeMap<u32, i32>,
    vblank_on: BTreeMap<u32, bool>,
    counters: BTreeMap<u32, u64>,
    delivered: Vec<DeliveredEvent>,
    connector_bpc: Vec<u32>,
    fail_get: bool,
    unbalanced_puts: u32,
    wait_hook: Option<WaitHook>,
}

/// The host modesetting framework's side of vblank handling.
pub struct SimDrm {
    log: SimLog,
    refresh_hz: u32,
    state: Mutex<DrmState>,
}

impl fmt::Debug for SimDrm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimDrm")
            .field("refresh_hz", &self.refresh_hz)
            .finish_non_exhaustive()
    }
}

impl SimDrm {
    pub fn new(log: SimLog, refresh_hz: u32) -> Self {
        Self {
            log,
            refresh_hz,
            state: Mutex::new(DrmState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, DrmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_connector_bpc(&self, bpc: &[u32]) {
        self.state().connector_bpc = bpc.to_vec();
    }

    pub fn fail_vblank_get(&self, fail: bool) {
        self.state().fail_get = fail;
    }

    /// Runs `hook` (outside any sim lock) whenever the pipeline waits for a vblank; tests use it
    /// to deliver the interrupt the wait is blocked on.
    pub fn on_wait_vblank(&self, hook: impl Fn(u32) + Send + Sync + 'static) {
        self.state().wait_hook = Some(Arc::new(hook));
    }

    pub fn vblank_refs(&self, pipe: u32) -> i32 {
        self.state().vblank_refs.get(&pipe).copied().unwrap_or(0)
    }

    pub fn vblank_enabled(&self, pipe: u32) -> bool {
        self.state().vblank_on.get(&pipe).copied().unwrap_or(false)
    }

    pub fn vblank_count(&self, pipe: u32) -> u64 {
        self.state().counters.get(&pipe).copied().unwrap_or(0)
    }

    pub fn delivered(&self) -> Vec<DeliveredEvent> {
        self.state().delivered.clone()
    }

    pub fn delivered_ids(&self) -> Vec<u64> {
        self.state().delivered.iter().map(|ev| ev.event.id).collect()
    }

    /// Number of `vblank_put` calls that had no reference to drop.
    pub fn unbalanced_puts(&self) -> u32 {
        self.state().unbalanced_puts
    }
}

impl DrmHost for SimDrm {
    fn vblank_get(&self, pipe: u32) -> Result<(), HwError> {
        let mut state = self.state();
        if state.fail_get {
            return Err(HwError::Busy);
        }
        *state.vblank_refs.entry(pipe).or_insert(0) += 1;
        self.log.push(SimEvent::VblankGet(pipe));
        Ok(())
    }

    fn vblank_put(&self, pipe: u32) {
        let mut state = self.state();
        let refs = state.vblank_refs.entry(pipe).or_insert(0);
        if *refs == 0 {
            state.unbalanced_puts += 1;
        } else {
            *refs -= 1;
        }
        self.log.push(SimEvent::VblankPut(pipe));
    }

    fn send_vblank_event(&self, pipe: u32, event: FlipEvent) {
        let mut state = self.state();
        let sequence = state.counters.get(&pipe).copied().unwrap_or(0);
        let period = period_ns_from_hz(Some(self.refresh_hz)).unwrap_or(0);
        self.log.push(SimEvent::SendEvent {
            pipe,
            id: event.id,
        });
        state.delivered.push(DeliveredEvent {
            pipe,
            event,
            sequence,
            timestamp_ns: sequence * period,
        });
    }

    fn handle_vblank(&self, pipe: u32) {
        *self.state().counters.entry(pipe).or_insert(0) += 1;
        self.log.push(SimEvent::HandleVblank(pipe));
    }

    fn vblank_on(&self, pipe: u32) {
        self.state().vblank_on.insert(pipe, true);
        self.log.push(SimEvent::VblankOn(pipe));
    }

    fn vblank_off(&self, pipe: u32) {
        self.state().vblank_on.insert(pipe, false);
        self.log.push(SimEvent::VblankOff(pipe));
    }

    fn wait_one_vblank(&self, pipe: u32) {
        self.log.push(SimEvent::WaitVblank(pipe));
        let hook = self.state().wait_hook.clone();
        if let Some(hook) = hook {
            hook(pipe);
        }
    }

    fn connector_bpc(&self, _pipe: u32) -> Vec<u32> {
        self.state().connector_bpc.clone()
    }
}
