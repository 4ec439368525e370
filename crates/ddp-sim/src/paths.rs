use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use ddp_hw::{DdpCompId, PathRouting};

use crate::log::{SimEvent, SimLog};

/// Routing links of the simulated display subsystem config block.
#[derive(Debug)]
pub struct SimPaths {
    log: SimLog,
    links: Mutex<BTreeSet<(DdpCompId, DdpCompId)>>,
}

impl SimPaths {
    pub fn new(log: SimLog) -> Self {
        Self {
            log,
            links: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn links(&self) -> Vec<(DdpCompId, DdpCompId)> {
        let links = self.links.lock().unwrap_or_else(PoisonError::into_inner);
        links.iter().copied().collect()
    }
}

impl PathRouting for SimPaths {
    fn add_comp_to_path(&self, cur: DdpCompId, next: DdpCompId) {
        let mut links = self.links.lock().unwrap_or_else(PoisonError::into_inner);
        links.insert((cur, next));
        self.log.push(SimEvent::PathAdd(cur, next));
    }

    fn remove_comp_from_path(&self, cur: DdpCompId, next: DdpCompId) {
        let mut links = self.links.lock().unwrap_or_else(PoisonError::into_inner);
        links.remove(&(cur, next));
        self.log.push(SimEvent::PathRemove(cur, next));
    }
}
