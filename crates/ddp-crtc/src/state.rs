//! Per-transaction commit state.
//!
//! The host framework owns `CrtcState` values: it duplicates the current state at the start of
//! every atomic transaction, hands it to the pipeline for `begin`/`flush`, and drops the old one
//! afterwards.

use std::sync::Arc;

use ddp_hw::{CmdqPacket, FlipEvent, GammaEntry};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayMode {
    pub name: String,
    pub hdisplay: u32,
    pub vdisplay: u32,
    pub vrefresh: u32,
}

impl DisplayMode {
    pub fn new(hdisplay: u32, vdisplay: u32, vrefresh: u32) -> Self {
        Self {
            name: format!("{hdisplay}x{vdisplay}"),
            hdisplay,
            vdisplay,
            vrefresh,
        }
    }
}

#[derive(Debug, Default)]
pub struct CrtcState {
    pub adjusted_mode: DisplayMode,
    /// Page-flip completion requested by this transaction.
    pub event: Option<FlipEvent>,
    pub color_mgmt_changed: bool,
    pub gamma_lut: Option<Arc<[GammaEntry]>>,

    pub pending_config: bool,
    pub pending_width: u32,
    pub pending_height: u32,
    pub pending_vrefresh: u32,

    /// Packet opened by `begin` in command-queue mode; consumed by `flush`.
    pub(crate) cmdq_handle: Option<CmdqPacket>,
}

impl CrtcState {
    pub fn new(mode: DisplayMode) -> Self {
        Self {
            adjusted_mode: mode,
            ..Default::default()
        }
    }

    /// Copies the state for the next transaction. Everything that belongs to a single commit
    /// (pending mode, event, packet) starts out cleared.
    pub fn duplicate(&self) -> Self {
        Self {
            adjusted_mode: self.adjusted_mode.clone(),
            gamma_lut: self.gamma_lut.clone(),
            ..Default::default()
        }
    }

    pub fn reset(&mut self) {
        let mode = std::mem::take(&mut self.adjusted_mode);
        *self = Self::new(mode);
    }

    pub fn has_packet(&self) -> bool {
        self.cmdq_handle.is_some()
    }
}
