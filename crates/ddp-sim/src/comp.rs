use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use ddp_hw::{
    CompConfig, DdpCompId, DdpComponent, GammaEntry, HwTarget, LayerPending, RegisterBlock,
};

use crate::log::{SimEvent, SimLog};

pub const REG_EN: u32 = 0x0c;
pub const REG_SIZE: u32 = 0x30;
pub const REG_BPC: u32 = 0x34;
pub const REG_BGCLR_IN: u32 = 0x38;
pub const REG_LAYER_BASE: u32 = 0x40;
pub const REG_LAYER_STRIDE: u32 = 0x20;
pub const REG_GAMMA_LUT: u32 = 0x700;

pub const fn reg_layer_con(idx: u32) -> u32 {
    REG_LAYER_BASE + idx * REG_LAYER_STRIDE
}

pub const fn reg_layer_addr(idx: u32) -> u32 {
    reg_layer_con(idx) + 0x04
}

/// What a component was asked to do, as recorded in the [`SimLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompCall {
    BgclrInOn(Option<DdpCompId>),
    BgclrInOff,
    Config(CompConfig),
    Start,
    Stop,
    LayerConfig { idx: u32, enable: bool },
    GammaSet(usize),
    EnableVblank,
    DisableVblank,
}

/// A component's register file.
#[derive(Debug)]
pub struct SimRegs {
    subsys: u8,
    base: u32,
    values: Mutex<BTreeMap<u32, u32>>,
}

impl SimRegs {
    /// Size of every simulated register window.
    pub const WINDOW: u32 = 0x1000;

    pub fn new(subsys: u8, base: u32) -> Self {
        Self {
            subsys,
            base,
            values: Mutex::new(BTreeMap::new()),
        }
    }

    /// Whether `addr` (subsystem-relative) falls in this window.
    pub fn contains(&self, subsys: u8, addr: u32) -> bool {
        subsys == self.subsys && addr >= self.base && addr - self.base < Self::WINDOW
    }

    pub fn get(&self, offset: u32) -> u32 {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.get(&offset).copied().unwrap_or(0)
    }
}

impl RegisterBlock for SimRegs {
    fn subsys(&self) -> u8 {
        self.subsys
    }

    fn base(&self) -> u32 {
        self.base
    }

    fn read(&self, offset: u32) -> u32 {
        self.get(offset)
    }

    fn write(&self, offset: u32, value: u32) {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(offset, value);
    }
}

/// A generic pipeline block backed by [`SimRegs`].
#[derive(Debug)]
pub struct SimComponent {
    id: DdpCompId,
    layer_nr: u32,
    regs: Arc<SimRegs>,
    log: SimLog,
    vblank_enabled: AtomicBool,
}

impl SimComponent {
    pub fn new(id: DdpCompId, layer_nr: u32, regs: Arc<SimRegs>, log: SimLog) -> Self {
        Self {
            id,
            layer_nr,
            regs,
            log,
            vblank_enabled: AtomicBool::new(false),
        }
    }

    pub fn regs(&self) -> &Arc<SimRegs> {
        &self.regs
    }

    pub fn running(&self) -> bool {
        self.regs.get(REG_EN) & 1 != 0
    }

    pub fn layer_enabled(&self, idx: u32) -> bool {
        self.regs.get(reg_layer_con(idx)) & 1 != 0
    }

    pub fn layer_addr(&self, idx: u32) -> u32 {
        self.regs.get(reg_layer_addr(idx))
    }

    pub fn vblank_enabled(&self) -> bool {
        self.vblank_enabled.load(Ordering::Relaxed)
    }

    fn record(&self, call: CompCall, hw: &HwTarget<'_>) {
        self.log.push(SimEvent::Comp {
            comp: self.id,
            call,
            queued: hw.is_queued(),
        });
    }
}

impl DdpComponent for SimComponent {
    fn id(&self) -> DdpCompId {
        self.id
    }

    fn layer_nr(&self) -> u32 {
        self.layer_nr
    }

    fn config(&self, cfg: &CompConfig, hw: &mut HwTarget<'_>) {
        hw.write(&*self.regs, REG_SIZE, (cfg.height << 16) | (cfg.width & 0xffff));
        if cfg.bpc != 0 {
            hw.write(&*self.regs, REG_BPC, cfg.bpc);
        }
        self.record(CompCall::Config(*cfg), hw);
    }

    fn start(&self, hw: &mut HwTarget<'_>) {
        hw.write_mask(&*self.regs, REG_EN, 1, 1);
        self.record(CompCall::Start, hw);
    }

    fn stop(&self, hw: &mut HwTarget<'_>) {
        hw.write_mask(&*self.regs, REG_EN, 0, 1);
        self.record(CompCall::Stop, hw);
    }

    fn layer_config(&self, idx: u32, state: &LayerPending, hw: &mut HwTarget<'_>) {
        if state.enable {
            hw.write(&*self.regs, reg_layer_addr(idx), state.fb.addr as u32);
        }
        hw.write_mask(&*self.regs, reg_layer_con(idx), u32::from(state.enable), 1);
        self.record(
            CompCall::LayerConfig {
                idx,
                enable: state.enable,
            },
            hw,
        );
    }

    fn gamma_set(&self, lut: &[GammaEntry], hw: &mut HwTarget<'_>) {
        let words: Vec<u32> = lut.iter().map(|entry| entry.to_lut_word()).collect();
        hw.write_buffer(&*self.regs, REG_GAMMA_LUT, &words);
        self.record(CompCall::GammaSet(lut.len()), hw);
    }

    fn bgclr_in_on(&self, prev: Option<DdpCompId>, hw: &mut HwTarget<'_>) {
        hw.write_mask(&*self.regs, REG_BGCLR_IN, 1, 1);
        self.record(CompCall::BgclrInOn(prev), hw);
    }

    fn bgclr_in_off(&self, hw: &mut HwTarget<'_>) {
        hw.write_mask(&*self.regs, REG_BGCLR_IN, 0, 1);
        self.record(CompCall::BgclrInOff, hw);
    }

    fn enable_vblank(&self) {
        self.vblank_enabled.store(true, Ordering::Relaxed);
        self.log.push(SimEvent::Comp {
            comp: self.id,
            call: CompCall::EnableVblank,
            queued: false,
        });
    }

    fn disable_vblank(&self) {
        self.vblank_enabled.store(false, Ordering::Relaxed);
        self.log.push(SimEvent::Comp {
            comp: self.id,
            call: CompCall::DisableVblank,
            queued: false,
        });
    }
}
