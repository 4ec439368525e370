use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use ddp_hw::{CmdqProvider, DdpCompId, DdpComponents, DdpResources};

use crate::clock::SimClocks;
use crate::cmdq::SimCmdq;
use crate::comp::{SimComponent, SimRegs};
use crate::drm::SimDrm;
use crate::log::SimLog;
use crate::mutex::SimMutexProvider;
use crate::paths::SimPaths;

const SUBSYS: u8 = 0x14;
const REG_BASE: u32 = 0x1400_0000;
const REFRESH_HZ: u32 = 60;

/// A whole simulated display subsystem, wired up the way a platform probe would.
///
/// ```ignore
/// let sim = SimPlatform::new()
///     .with_components(&[(DdpCompId::Ovl0, 4), (DdpCompId::Rdma0, 0), (DdpCompId::Dsi0, 0)]);
/// let crtc = DdpCrtc::create(&sim.resources(), &sim.components(), &path, 0, platform)?;
/// ```
pub struct SimPlatform {
    pub log: SimLog,
    pub clocks: Arc<SimClocks>,
    pub mutexes: Arc<SimMutexProvider>,
    pub paths: Arc<SimPaths>,
    pub drm: Arc<SimDrm>,
    pub cmdq: Option<SimCmdq>,
    regs: Arc<Mutex<Vec<Arc<SimRegs>>>>,
    comps: BTreeMap<DdpCompId, Arc<SimComponent>>,
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPlatform {
    pub fn new() -> Self {
        let log = SimLog::new();
        Self {
            clocks: Arc::new(SimClocks::new(log.clone())),
            mutexes: Arc::new(SimMutexProvider::new(log.clone())),
            paths: Arc::new(SimPaths::new(log.clone())),
            drm: Arc::new(SimDrm::new(log.clone(), REFRESH_HZ)),
            cmdq: None,
            regs: Arc::default(),
            comps: BTreeMap::new(),
            log,
        }
    }

    /// Adds a command-queue co-processor serving every pipe.
    pub fn with_cmdq(mut self) -> Self {
        self.cmdq = Some(SimCmdq::new(self.log.clone(), Arc::clone(&self.regs)));
        self
    }

    pub fn with_components(mut self, comps: &[(DdpCompId, u32)]) -> Self {
        for &(id, layer_nr) in comps {
            self.add_component(id, layer_nr);
        }
        self
    }

    /// Adds a component with its own register window. Re-adding an id replaces it.
    pub fn add_component(&mut self, id: DdpCompId, layer_nr: u32) -> Arc<SimComponent> {
        let block = {
            let mut regs = self.regs.lock().unwrap_or_else(PoisonError::into_inner);
            let base = REG_BASE + (regs.len() as u32) * SimRegs::WINDOW;
            let block = Arc::new(SimRegs::new(SUBSYS, base));
            regs.push(Arc::clone(&block));
            block
        };
        let comp = Arc::new(SimComponent::new(id, layer_nr, block, self.log.clone()));
        self.comps.insert(id, Arc::clone(&comp));
        comp
    }

    /// The sim handle for `id`.
    ///
    /// Panics if the component was never added; tests only ask for what they built.
    pub fn component(&self, id: DdpCompId) -> &Arc<SimComponent> {
        match self.comps.get(&id) {
            Some(comp) => comp,
            None => panic!("component {id} not in the simulated platform"),
        }
    }

    pub fn components(&self) -> DdpComponents {
        let mut out = DdpComponents::new();
        for comp in self.comps.values() {
            out.insert(Arc::clone(comp) as _);
        }
        out
    }

    pub fn resources(&self) -> DdpResources {
        DdpResources {
            clocks: Arc::clone(&self.clocks) as _,
            mutexes: Arc::clone(&self.mutexes) as _,
            paths: Arc::clone(&self.paths) as _,
            drm: Arc::clone(&self.drm) as _,
            cmdq: self.cmdq.clone().map(|cmdq| Arc::new(cmdq) as Arc<dyn CmdqProvider>),
        }
    }

    pub fn cmdq(&self) -> Option<&SimCmdq> {
        self.cmdq.as_ref()
    }
}
