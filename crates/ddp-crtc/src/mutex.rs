//! Bookkeeping around a pipeline's hardware mutex.
//!
//! The hardware gives no way to read back which components are registered, so the engine keeps
//! its own record. While the mutex is enabled the record must equal the chain, in chain order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ddp_hw::{DdpCompId, DispMutexHw, HwError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutexSnapshot {
    pub pipe: u32,
    pub registered: Vec<DdpCompId>,
    pub enabled: bool,
    pub prepared: bool,
}

#[derive(Debug, Default)]
struct MutexBook {
    registered: Vec<DdpCompId>,
    enabled: bool,
    prepared: bool,
}

pub(crate) struct DispMutex {
    hw: Arc<dyn DispMutexHw>,
    book: Mutex<MutexBook>,
}

impl DispMutex {
    pub fn new(hw: Arc<dyn DispMutexHw>) -> Self {
        Self {
            hw,
            book: Mutex::new(MutexBook::default()),
        }
    }

    fn book(&self) -> MutexGuard<'_, MutexBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn hw(&self) -> &Arc<dyn DispMutexHw> {
        &self.hw
    }

    pub fn prepare(&self) -> Result<(), HwError> {
        self.hw.prepare()?;
        self.book().prepared = true;
        Ok(())
    }

    pub fn unprepare(&self) {
        let mut book = self.book();
        if !book.prepared {
            return;
        }
        self.hw.unprepare();
        book.prepared = false;
    }

    pub fn add_comp(&self, comp: DdpCompId) {
        let mut book = self.book();
        if book.registered.contains(&comp) {
            warn!(pipe = self.hw.pipe(), %comp, "component already registered to mutex");
            return;
        }
        self.hw.add_comp(comp);
        book.registered.push(comp);
    }

    pub fn remove_comp(&self, comp: DdpCompId) {
        let mut book = self.book();
        let Some(pos) = book.registered.iter().position(|c| *c == comp) else {
            return;
        };
        if book.enabled && book.registered.len() == 1 {
            warn!(pipe = self.hw.pipe(), %comp, "removing last component from an enabled mutex");
        }
        self.hw.remove_comp(comp);
        book.registered.remove(pos);
    }

    /// Enables the mutex; `chain` is the sequence it is expected to gate.
    pub fn enable(&self, chain: &[DdpCompId]) {
        let mut book = self.book();
        if book.registered != chain {
            warn!(
                pipe = self.hw.pipe(),
                registered = ?book.registered,
                expected = ?chain,
                "mutex registration does not match the chain"
            );
        }
        self.hw.enable();
        book.enabled = true;
        debug!(pipe = self.hw.pipe(), comps = book.registered.len(), "mutex enabled");
    }

    pub fn disable(&self) {
        let mut book = self.book();
        self.hw.disable();
        book.enabled = false;
    }

    pub fn acquire(&self) {
        self.hw.acquire();
    }

    pub fn release(&self) {
        self.hw.release();
    }

    pub fn snapshot(&self) -> MutexSnapshot {
        let book = self.book();
        MutexSnapshot {
            pipe: self.hw.pipe(),
            registered: book.registered.clone(),
            enabled: book.enabled,
            prepared: book.prepared,
        }
    }
}
