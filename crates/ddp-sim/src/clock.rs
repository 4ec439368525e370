use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ddp_hw::error::EIO;
use ddp_hw::{ClockPower, DdpCompId, HwError, PowerDomain};

use crate::log::{SimEvent, SimLog};

/// Outstanding reference counts. Only non-zero entries are kept, so two snapshots compare equal
/// exactly when every count matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockSnapshot {
    pub prepared: BTreeMap<DdpCompId, i32>,
    pub enabled: BTreeMap<DdpCompId, i32>,
    pub power: BTreeMap<PowerDomain, i32>,
}

impl ClockSnapshot {
    pub fn is_idle(&self) -> bool {
        self.enabled.is_empty() && self.power.is_empty()
    }
}

#[derive(Debug, Default)]
struct ClockState {
    counts: ClockSnapshot,
    fail_prepare: Option<DdpCompId>,
    fail_enable: Option<DdpCompId>,
    fail_power: Option<PowerDomain>,
}

fn bump<K: Ord>(map: &mut BTreeMap<K, i32>, key: K, delta: i32) {
    let count = map.entry(key).or_insert(0);
    *count += delta;
    if *count == 0 {
        map.retain(|_, count| *count != 0);
    }
}

#[derive(Debug)]
pub struct SimClocks {
    log: SimLog,
    state: Mutex<ClockState>,
}

impl SimClocks {
    pub fn new(log: SimLog) -> Self {
        Self {
            log,
            state: Mutex::new(ClockState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_prepare_on(&self, comp: DdpCompId) {
        self.state().fail_prepare = Some(comp);
    }

    pub fn fail_enable_on(&self, comp: DdpCompId) {
        self.state().fail_enable = Some(comp);
    }

    pub fn fail_power_on(&self, domain: PowerDomain) {
        self.state().fail_power = Some(domain);
    }

    pub fn clear_faults(&self) {
        let mut state = self.state();
        state.fail_prepare = None;
        state.fail_enable = None;
        state.fail_power = None;
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        self.state().counts.clone()
    }

    pub fn enable_count(&self, comp: DdpCompId) -> i32 {
        self.state().counts.enabled.get(&comp).copied().unwrap_or(0)
    }
}

impl ClockPower for SimClocks {
    fn prepare(&self, comp: DdpCompId) -> Result<(), HwError> {
        let mut state = self.state();
        if state.fail_prepare == Some(comp) {
            return Err(HwError::ClockPrepare { comp, errno: EIO });
        }
        bump(&mut state.counts.prepared, comp, 1);
        self.log.push(SimEvent::ClockPrepare(comp));
        Ok(())
    }

    fn unprepare(&self, comp: DdpCompId) {
        bump(&mut self.state().counts.prepared, comp, -1);
        self.log.push(SimEvent::ClockUnprepare(comp));
    }

    fn enable(&self, comp: DdpCompId) -> Result<(), HwError> {
        let mut state = self.state();
        if state.fail_enable == Some(comp) {
            return Err(HwError::ClockEnable { comp, errno: EIO });
        }
        bump(&mut state.counts.enabled, comp, 1);
        self.log.push(SimEvent::ClockEnable(comp));
        Ok(())
    }

    fn disable(&self, comp: DdpCompId) {
        bump(&mut self.state().counts.enabled, comp, -1);
        self.log.push(SimEvent::ClockDisable(comp));
    }

    fn runtime_get(&self, domain: PowerDomain) -> Result<(), HwError> {
        let mut state = self.state();
        if state.fail_power == Some(domain) {
            return Err(HwError::PowerDomain { domain, errno: EIO });
        }
        bump(&mut state.counts.power, domain, 1);
        self.log.push(SimEvent::PowerGet(domain));
        Ok(())
    }

    fn runtime_put(&self, domain: PowerDomain) {
        bump(&mut self.state().counts.power, domain, -1);
        self.log.push(SimEvent::PowerPut(domain));
    }
}
