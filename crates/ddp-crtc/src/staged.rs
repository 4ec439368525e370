use ddp_hw::{CompConfig, DdpCompId, LayerPending};

use crate::ops::DdpOp;
use crate::routing::LayerRouting;

/// Register state staged by the caller and waiting to be written.
///
/// Shared between the caller (which stages) and whichever path issues the writes: `flush` in
/// shadow-register or command-queue mode, the vblank interrupt otherwise.
#[derive(Debug, Default)]
pub(crate) struct StagedHw {
    mode: Option<CompConfig>,
    planes: Vec<LayerPending>,
    pending_planes: bool,
}

impl StagedHw {
    pub fn new(layer_nr: u32) -> Self {
        Self {
            mode: None,
            planes: vec![LayerPending::disabled(); layer_nr as usize],
            pending_planes: false,
        }
    }

    pub fn layer(&self, idx: u32) -> Option<&LayerPending> {
        self.planes.get(idx as usize)
    }

    /// Records new buffer/format state for a layer. `state.dirty` says whether it needs a write.
    pub fn stage_layer(&mut self, idx: u32, state: LayerPending) -> bool {
        let Some(slot) = self.planes.get_mut(idx as usize) else {
            return false;
        };
        let dirty = slot.dirty || state.dirty;
        *slot = LayerPending {
            dirty,
            config: slot.config,
            ..state
        };
        true
    }

    /// Marks a layer as needing a write right away.
    pub fn configure_layer(&mut self, idx: u32, state: LayerPending) -> bool {
        let Some(slot) = self.planes.get_mut(idx as usize) else {
            return false;
        };
        *slot = LayerPending {
            dirty: false,
            config: true,
            ..state
        };
        true
    }

    /// Turns every dirty layer into a pending write.
    pub fn promote_dirty(&mut self) {
        for plane in &mut self.planes {
            if plane.dirty {
                plane.dirty = false;
                plane.config = true;
            }
        }
        if self.planes.iter().any(|plane| plane.config) {
            self.pending_planes = true;
        }
    }

    pub fn set_mode(&mut self, cfg: CompConfig) {
        self.mode = Some(cfg);
    }

    /// Stages a disable of every layer.
    pub fn disable_all(&mut self) {
        for plane in &mut self.planes {
            plane.enable = false;
            plane.dirty = false;
            plane.config = true;
        }
        self.pending_planes = !self.planes.is_empty();
    }

    /// Drains the staged state into ops and clears every `config` flag written.
    pub fn take_ops(&mut self, head: DdpCompId, routing: &LayerRouting) -> Vec<DdpOp> {
        let mut ops = Vec::new();
        if let Some(cfg) = self.mode.take() {
            ops.push(DdpOp::Config {
                comp: head,
                cfg: CompConfig { bpc: 0, ..cfg },
            });
        }
        if std::mem::take(&mut self.pending_planes) {
            for (idx, plane) in self.planes.iter_mut().enumerate() {
                if !plane.config {
                    continue;
                }
                plane.config = false;
                if let Some(route) = routing.route(idx as u32) {
                    ops.push(DdpOp::LayerConfig {
                        comp: route.comp,
                        local: route.local,
                        state: LayerPending {
                            config: false,
                            ..plane.clone()
                        },
                    });
                }
            }
        }
        ops
    }
}
