//! The single outstanding page-flip completion of a pipeline.
//!
//! Arming, readiness and resolution all happen under one lock, and resolution takes the event
//! out of the cell before handing it on, so a flip can be resolved at most once no matter which
//! context (vblank interrupt, packet callback, caller) gets there first.

use std::sync::{Mutex, MutexGuard, PoisonError};

use ddp_hw::FlipEvent;

#[derive(Debug)]
struct PendingFlip {
    serial: u64,
    event: FlipEvent,
}

#[derive(Debug, Default)]
struct FlipCell {
    pending: Option<PendingFlip>,
    /// The writes of the pending flip have been issued; the next vblank may complete it.
    ready: bool,
    next_serial: u64,
}

#[derive(Debug, Default)]
pub(crate) struct FlipCompletion {
    cell: Mutex<FlipCell>,
}

impl FlipCompletion {
    fn lock(&self) -> MutexGuard<'_, FlipCell> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arms `event`. Hands the event back if another flip is still outstanding.
    pub fn arm(&self, event: FlipEvent) -> Result<u64, FlipEvent> {
        let mut cell = self.lock();
        if cell.pending.is_some() {
            return Err(event);
        }
        cell.next_serial += 1;
        let serial = cell.next_serial;
        cell.pending = Some(PendingFlip { serial, event });
        cell.ready = false;
        Ok(serial)
    }

    pub fn mark_ready(&self) {
        let mut cell = self.lock();
        if cell.pending.is_some() {
            cell.ready = true;
        }
    }

    /// Resolves the pending flip if its writes have been issued. `sink` runs under the lock.
    pub fn complete_ready(&self, sink: impl FnOnce(FlipEvent)) -> bool {
        let mut cell = self.lock();
        if !cell.ready {
            return false;
        }
        cell.ready = false;
        match cell.pending.take() {
            Some(flip) => {
                sink(flip.event);
                true
            }
            None => false,
        }
    }

    /// Resolves the pending flip only if it is the one armed as `serial`.
    pub fn complete(&self, serial: u64, sink: impl FnOnce(FlipEvent)) -> bool {
        let mut cell = self.lock();
        if cell.pending.as_ref().map(|flip| flip.serial) != Some(serial) {
            return false;
        }
        cell.ready = false;
        match cell.pending.take() {
            Some(flip) => {
                sink(flip.event);
                true
            }
            None => false,
        }
    }

    /// Resolves whatever is pending, ready or not.
    pub fn complete_any(&self, sink: impl FnOnce(FlipEvent)) -> bool {
        let mut cell = self.lock();
        cell.ready = false;
        match cell.pending.take() {
            Some(flip) => {
                sink(flip.event);
                true
            }
            None => false,
        }
    }

    pub fn pending_serial(&self) -> Option<u64> {
        self.lock().pending.as_ref().map(|flip| flip.serial)
    }

    pub fn is_pending(&self) -> bool {
        self.lock().pending.is_some()
    }
}
