use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ddp_hw::{DdpCompId, PowerDomain};

use crate::comp::CompCall;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    ClockPrepare(DdpCompId),
    ClockUnprepare(DdpCompId),
    ClockEnable(DdpCompId),
    ClockDisable(DdpCompId),
    PowerGet(PowerDomain),
    PowerPut(PowerDomain),

    MutexGet(u32),
    MutexPut(u32),
    MutexPrepare(u32),
    MutexUnprepare(u32),
    MutexAdd(u32, DdpCompId),
    MutexRemove(u32, DdpCompId),
    MutexEnable(u32),
    MutexDisable(u32),
    MutexAcquire(u32),
    MutexRelease(u32),

    PathAdd(DdpCompId, DdpCompId),
    PathRemove(DdpCompId, DdpCompId),

    /// A component operation. `queued` calls were recorded into a packet, not written.
    Comp {
        comp: DdpCompId,
        call: CompCall,
        queued: bool,
    },

    VblankGet(u32),
    VblankPut(u32),
    VblankOn(u32),
    VblankOff(u32),
    WaitVblank(u32),
    HandleVblank(u32),
    SendEvent { pipe: u32, id: u64 },

    PacketSubmit { id: u64, blocking: bool },
    PacketExec { id: u64, ok: bool },
    PacketReject { id: u64 },
}

/// Shared, append-only call log.
#[derive(Debug, Clone, Default)]
pub struct SimLog {
    events: Arc<Mutex<Vec<SimEvent>>>,
}

impl SimLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SimEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, event: SimEvent) {
        self.lock().push(event);
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.lock().clone()
    }

    /// Returns and clears the log.
    pub fn take(&self) -> Vec<SimEvent> {
        std::mem::take(&mut *self.lock())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn count(&self, pred: impl Fn(&SimEvent) -> bool) -> usize {
        self.lock().iter().filter(|event| pred(event)).count()
    }

    /// Position of the first event matching `pred`.
    pub fn position(&self, pred: impl Fn(&SimEvent) -> bool) -> Option<usize> {
        self.lock().iter().position(pred)
    }

    /// Component calls only, in order.
    pub fn comp_calls(&self) -> Vec<(DdpCompId, CompCall, bool)> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                SimEvent::Comp { comp, call, queued } => Some((*comp, call.clone(), *queued)),
                _ => None,
            })
            .collect()
    }
}
