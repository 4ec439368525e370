//! Hardware operations issued against a component chain.
//!
//! Everything the engine does to hardware is first expressed as a list of [`DdpOp`]s and then
//! applied against a [`HwTarget`]. The same list can therefore be written directly from the CPU or
//! recorded into one command packet, and the order of operations is the same either way.

use std::sync::Arc;

use ddp_hw::{
    CompConfig, DdpCompId, DdpCompType, DdpComponent, GammaEntry, HwTarget, LayerPending,
};
use tracing::warn;

use crate::config::PlatformData;
use crate::routing::LayerRouting;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdpOp {
    BgclrInOn {
        comp: DdpCompId,
        prev: Option<DdpCompId>,
    },
    BgclrInOff {
        comp: DdpCompId,
    },
    Config {
        comp: DdpCompId,
        cfg: CompConfig,
    },
    Start {
        comp: DdpCompId,
    },
    Stop {
        comp: DdpCompId,
    },
    LayerConfig {
        comp: DdpCompId,
        local: u32,
        state: LayerPending,
    },
    GammaSet {
        comp: DdpCompId,
        lut: Arc<[GammaEntry]>,
    },
}

impl DdpOp {
    pub fn comp(&self) -> DdpCompId {
        match self {
            DdpOp::BgclrInOn { comp, .. }
            | DdpOp::BgclrInOff { comp }
            | DdpOp::Config { comp, .. }
            | DdpOp::Start { comp }
            | DdpOp::Stop { comp }
            | DdpOp::LayerConfig { comp, .. }
            | DdpOp::GammaSet { comp, .. } => *comp,
        }
    }
}

pub(crate) fn apply_ops(chain: &[Arc<dyn DdpComponent>], ops: &[DdpOp], hw: &mut HwTarget<'_>) {
    for op in ops {
        let Some(comp) = chain.iter().find(|comp| comp.id() == op.comp()) else {
            warn!(comp = %op.comp(), "dropping op for component outside the chain");
            continue;
        };
        match op {
            DdpOp::BgclrInOn { prev, .. } => comp.bgclr_in_on(*prev, hw),
            DdpOp::BgclrInOff { .. } => comp.bgclr_in_off(hw),
            DdpOp::Config { cfg, .. } => comp.config(cfg, hw),
            DdpOp::Start { .. } => comp.start(hw),
            DdpOp::Stop { .. } => comp.stop(hw),
            DdpOp::LayerConfig { local, state, .. } => comp.layer_config(*local, state, hw),
            DdpOp::GammaSet { lut, .. } => comp.gamma_set(lut, hw),
        }
    }
}

/// Bit depth for the chain: the smallest depth any connector advertises (zero meaning unknown),
/// never above `max_bpc`.
pub fn negotiate_bpc(connector_bpc: &[u32], max_bpc: u32) -> u32 {
    connector_bpc
        .iter()
        .copied()
        .filter(|&bpc| bpc != 0)
        .fold(max_bpc, u32::min)
}

/// Initial configuration pass: every component gets its background input, timing and start in
/// chain order, followed by a disable of every layer slot.
pub fn bring_up_ops(
    chain: &[Arc<dyn DdpComponent>],
    routing: &LayerRouting,
    cfg: CompConfig,
    platform: &PlatformData,
) -> Vec<DdpOp> {
    let mut ops = Vec::with_capacity(chain.len() * 3 + routing.layer_nr() as usize);
    let mut prev = None;
    for comp in chain {
        let id = comp.id();
        ops.push(DdpOp::BgclrInOn { comp: id, prev });

        let mut comp_cfg = cfg;
        if platform.dither_exist && id.comp_type() == DdpCompType::Gamma {
            comp_cfg.bpc = 0;
        }
        ops.push(DdpOp::Config {
            comp: id,
            cfg: comp_cfg,
        });
        ops.push(DdpOp::Start { comp: id });
        prev = Some(id);
    }

    ops.extend((0..routing.layer_nr()).filter_map(|layer| {
        routing.route(layer).map(|route| DdpOp::LayerConfig {
            comp: route.comp,
            local: route.local,
            state: LayerPending::disabled(),
        })
    }));
    ops
}

/// Teardown pass: stop every component, then detach the background input of all but the tail.
pub fn teardown_ops(chain: &[Arc<dyn DdpComponent>]) -> Vec<DdpOp> {
    let stops = chain.iter().map(|comp| DdpOp::Stop { comp: comp.id() });
    let tail = chain.len().saturating_sub(1);
    let bgclr = chain[..tail]
        .iter()
        .map(|comp| DdpOp::BgclrInOff { comp: comp.id() });
    stops.chain(bgclr).collect()
}

/// Reprograms the colour tables on every component of the chain.
pub fn gamma_ops(chain: &[Arc<dyn DdpComponent>], lut: &Arc<[GammaEntry]>) -> Vec<DdpOp> {
    chain
        .iter()
        .map(|comp| DdpOp::GammaSet {
            comp: comp.id(),
            lut: Arc::clone(lut),
        })
        .collect()
}
