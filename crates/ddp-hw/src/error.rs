use thiserror::Error;

use crate::clock::PowerDomain;
use crate::comp::DdpCompId;

pub const EINVAL: i32 = 22;
pub const ENODEV: i32 = 19;
pub const ENOMEM: i32 = 12;
pub const EBUSY: i32 = 16;
pub const ETIMEDOUT: i32 = 110;
pub const EIO: i32 = 5;

/// Failure reported by a platform collaborator.
///
/// Every variant maps onto a kernel-style errno via [`HwError::errno`] so callers that bridge
/// into C-shaped interfaces can surface a stable code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HwError {
    #[error("clock prepare failed for {comp} (errno {errno})")]
    ClockPrepare { comp: DdpCompId, errno: i32 },

    #[error("clock enable failed for {comp} (errno {errno})")]
    ClockEnable { comp: DdpCompId, errno: i32 },

    #[error("power domain {domain:?} unavailable (errno {errno})")]
    PowerDomain { domain: PowerDomain, errno: i32 },

    #[error("no display mutex available for pipe {pipe}")]
    MutexUnavailable { pipe: u32 },

    #[error("display mutex clock failed (errno {errno})")]
    MutexClock { errno: i32 },

    #[error("command packet allocation failed")]
    PacketCreate,

    #[error("command queue execution failed with status {status}")]
    CmdqExec { status: i32 },

    #[error("command queue busy")]
    Busy,

    #[error("timed out waiting for hardware")]
    Timeout,
}

impl HwError {
    pub fn errno(&self) -> i32 {
        match self {
            HwError::ClockPrepare { errno, .. }
            | HwError::ClockEnable { errno, .. }
            | HwError::PowerDomain { errno, .. }
            | HwError::MutexClock { errno } => *errno,
            HwError::MutexUnavailable { .. } => ENODEV,
            HwError::PacketCreate => ENOMEM,
            HwError::CmdqExec { status } => *status,
            HwError::Busy => EBUSY,
            HwError::Timeout => ETIMEDOUT,
        }
    }
}
