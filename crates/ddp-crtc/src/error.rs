use ddp_hw::error::EINVAL;
use ddp_hw::{DdpCompId, HwError, PowerDomain};
use thiserror::Error;

use crate::crtc::CrtcLifecycle;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrtcError {
    #[error("failed to prepare clock for {comp}")]
    ClockPrepare {
        comp: DdpCompId,
        #[source]
        source: HwError,
    },

    #[error("failed to enable clock for {comp}")]
    ClockEnable {
        comp: DdpCompId,
        #[source]
        source: HwError,
    },

    #[error("failed to get power domain {domain:?}")]
    Power {
        domain: PowerDomain,
        #[source]
        source: HwError,
    },

    #[error("failed to get display mutex for pipe {pipe}")]
    MutexGet {
        pipe: u32,
        #[source]
        source: HwError,
    },

    #[error("failed to prepare display mutex")]
    MutexPrepare(#[source] HwError),

    #[error("layer {index} out of range (pipeline has {layer_nr} layers)")]
    LayerOutOfRange { index: u32, layer_nr: u32 },

    #[error("cannot enable a pipeline that is {from:?}")]
    InvalidTransition { from: CrtcLifecycle },
}

impl CrtcError {
    /// Kernel-style errno for callers bridging into C-shaped interfaces.
    pub fn errno(&self) -> i32 {
        match self {
            CrtcError::ClockPrepare { source, .. }
            | CrtcError::ClockEnable { source, .. }
            | CrtcError::Power { source, .. }
            | CrtcError::MutexGet { source, .. }
            | CrtcError::MutexPrepare(source) => source.errno(),
            CrtcError::LayerOutOfRange { .. } | CrtcError::InvalidTransition { .. } => EINVAL,
        }
    }
}

pub type Result<T> = std::result::Result<T, CrtcError>;
