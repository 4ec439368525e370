//! Hardware-facing contracts for the display data path (DDP).
//!
//! This crate holds everything the pipeline commit engine (`ddp-crtc`) consumes from its
//! collaborators, without committing to any particular SoC register map:
//! - the pipeline component model ([`comp`]) and the register target abstraction ([`regs`]) that
//!   lets the same component code either poke registers directly or append to a command packet,
//! - command-queue packets and the client contract used to submit them ([`cmdq`]),
//! - clock/power, hardware-mutex and routing-link providers, and
//! - the atomic-modesetting framework's vblank/event contract ([`vblank`]).
#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

pub mod clock;
pub mod cmdq;
pub mod comp;
pub mod error;
pub mod mutex;
pub mod regs;
pub mod routing;
pub mod vblank;

pub use clock::{ClockPower, PowerDomain};
pub use cmdq::{
    CmdqCallback, CmdqCbData, CmdqChannel, CmdqClient, CmdqInstr, CmdqPacket, CmdqProvider,
    CmdqRejected, CmdqSignal,
};
pub use comp::{
    CompConfig, DdpCompId, DdpCompType, DdpComponent, DdpComponents, GammaEntry, LayerFb,
    LayerPending, PixelFormat,
};
pub use error::HwError;
pub use mutex::{DispMutexHw, DispMutexProvider};
pub use regs::{HwTarget, RegisterBlock};
pub use routing::PathRouting;
pub use vblank::{DrmHost, FlipEvent};

/// Platform collaborators handed to a pipeline instance at creation time.
///
/// `cmdq` is optional: platforms without a command-queue co-processor leave it unset and get
/// the immediate (CPU register write) commit path.
#[derive(Clone)]
pub struct DdpResources {
    pub clocks: Arc<dyn ClockPower>,
    pub mutexes: Arc<dyn DispMutexProvider>,
    pub paths: Arc<dyn PathRouting>,
    pub drm: Arc<dyn DrmHost>,
    pub cmdq: Option<Arc<dyn CmdqProvider>>,
}

impl fmt::Debug for DdpResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DdpResources")
            .field("cmdq", &self.cmdq.is_some())
            .finish_non_exhaustive()
    }
}
