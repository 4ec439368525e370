use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ddp_hw::error::EIO;
use ddp_hw::{DdpCompId, DispMutexHw, DispMutexProvider, HwError};

use crate::log::{SimEvent, SimLog};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimMutexState {
    pub registered: Vec<DdpCompId>,
    pub enabled: bool,
    /// Outstanding prepare references.
    pub prepared: i32,
    pub enable_count: u32,
    /// The registered set observed at every enable.
    pub registered_at_enable: Vec<Vec<DdpCompId>>,
    pub acquired: bool,
    pub in_use: bool,
}

#[derive(Debug, Default)]
struct SimMutexInner {
    state: SimMutexState,
    fail_prepare: bool,
}

/// One simulated hardware mutex instance.
#[derive(Debug)]
pub struct SimMutex {
    pipe: u32,
    log: SimLog,
    inner: Mutex<SimMutexInner>,
}

impl SimMutex {
    fn new(pipe: u32, log: SimLog) -> Self {
        Self {
            pipe,
            log,
            inner: Mutex::new(SimMutexInner::default()),
        }
    }

    pub fn state(&self) -> SimMutexState {
        lock(&self.inner).state.clone()
    }

    pub fn fail_prepare(&self, fail: bool) {
        lock(&self.inner).fail_prepare = fail;
    }
}

impl DispMutexHw for SimMutex {
    fn pipe(&self) -> u32 {
        self.pipe
    }

    fn prepare(&self) -> Result<(), HwError> {
        let mut inner = lock(&self.inner);
        if inner.fail_prepare {
            return Err(HwError::MutexClock { errno: EIO });
        }
        inner.state.prepared += 1;
        self.log.push(SimEvent::MutexPrepare(self.pipe));
        Ok(())
    }

    fn unprepare(&self) {
        lock(&self.inner).state.prepared -= 1;
        self.log.push(SimEvent::MutexUnprepare(self.pipe));
    }

    fn add_comp(&self, comp: DdpCompId) {
        lock(&self.inner).state.registered.push(comp);
        self.log.push(SimEvent::MutexAdd(self.pipe, comp));
    }

    fn remove_comp(&self, comp: DdpCompId) {
        lock(&self.inner).state.registered.retain(|c| *c != comp);
        self.log.push(SimEvent::MutexRemove(self.pipe, comp));
    }

    fn enable(&self) {
        let mut inner = lock(&self.inner);
        let registered = inner.state.registered.clone();
        inner.state.registered_at_enable.push(registered);
        inner.state.enabled = true;
        inner.state.enable_count += 1;
        self.log.push(SimEvent::MutexEnable(self.pipe));
    }

    fn disable(&self) {
        lock(&self.inner).state.enabled = false;
        self.log.push(SimEvent::MutexDisable(self.pipe));
    }

    fn acquire(&self) {
        lock(&self.inner).state.acquired = true;
        self.log.push(SimEvent::MutexAcquire(self.pipe));
    }

    fn release(&self) {
        lock(&self.inner).state.acquired = false;
        self.log.push(SimEvent::MutexRelease(self.pipe));
    }
}

/// Hands out one mutex per pipe; a mutex already handed out is busy until put back.
#[derive(Debug)]
pub struct SimMutexProvider {
    log: SimLog,
    mutexes: Mutex<BTreeMap<u32, Arc<SimMutex>>>,
    fail_get: Mutex<bool>,
}

impl SimMutexProvider {
    pub fn new(log: SimLog) -> Self {
        Self {
            log,
            mutexes: Mutex::new(BTreeMap::new()),
            fail_get: Mutex::new(false),
        }
    }

    /// The mutex instance for `pipe`, created on first use.
    pub fn mutex(&self, pipe: u32) -> Arc<SimMutex> {
        let mut mutexes = lock(&self.mutexes);
        Arc::clone(
            mutexes
                .entry(pipe)
                .or_insert_with(|| Arc::new(SimMutex::new(pipe, self.log.clone()))),
        )
    }

    pub fn fail_get(&self, fail: bool) {
        *lock(&self.fail_get) = fail;
    }
}

impl DispMutexProvider for SimMutexProvider {
    fn get(&self, pipe: u32) -> Result<Arc<dyn DispMutexHw>, HwError> {
        if *lock(&self.fail_get) {
            return Err(HwError::MutexUnavailable { pipe });
        }
        let mutex = self.mutex(pipe);
        {
            let mut inner = lock(&mutex.inner);
            if inner.state.in_use {
                return Err(HwError::Busy);
            }
            inner.state.in_use = true;
        }
        self.log.push(SimEvent::MutexGet(pipe));
        Ok(mutex)
    }

    fn put(&self, mutex: Arc<dyn DispMutexHw>) {
        let pipe = mutex.pipe();
        lock(&self.mutex(pipe).inner).state.in_use = false;
        self.log.push(SimEvent::MutexPut(pipe));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutex_is_exclusive_until_put() {
        let provider = SimMutexProvider::new(SimLog::new());
        let first = provider.get(0).unwrap();
        assert!(matches!(provider.get(0), Err(HwError::Busy)));
        assert!(provider.get(1).is_ok());

        provider.put(first);
        assert!(provider.get(0).is_ok());
    }

    #[test]
    fn enable_records_the_registered_set() {
        let provider = SimMutexProvider::new(SimLog::new());
        let hw = provider.get(0).unwrap();
        hw.add_comp(DdpCompId::Ovl0);
        hw.add_comp(DdpCompId::Dsi0);
        hw.enable();

        let state = provider.mutex(0).state();
        assert!(state.enabled);
        assert_eq!(
            state.registered_at_enable,
            vec![vec![DdpCompId::Ovl0, DdpCompId::Dsi0]]
        );
    }
}
