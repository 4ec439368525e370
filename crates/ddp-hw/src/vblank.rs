//! Vblank timing helpers and the host modesetting framework's vblank/event contract.
//!
//! The commit engine never counts vblanks itself. It takes and drops vblank references, hands
//! page-flip completion events back to the host, and forwards the vblank interrupt so the host can
//! advance its counters and timestamps.

use crate::error::HwError;

/// Convert a refresh rate (Hz) into a frame period in nanoseconds.
///
/// Returns `None` when the rate is unknown (`None` or `Some(0)`).
pub fn period_ns_from_hz(hz: Option<u32>) -> Option<u64> {
    hz.and_then(|hz| {
        if hz == 0 {
            return None;
        }
        // Use ceil division to keep 60 Hz at 16_666_667 ns (rather than truncating to 16_666_666).
        Some(1_000_000_000u64.div_ceil(hz as u64))
    })
}

/// A page-flip completion event owned by the host framework.
///
/// `pipe` is filled in by the commit engine when the event is armed so the host can stamp it
/// with the right vblank counter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlipEvent {
    pub id: u64,
    pub pipe: Option<u32>,
}

impl FlipEvent {
    pub fn new(id: u64) -> Self {
        Self { id, pipe: None }
    }
}

pub trait DrmHost: Send + Sync {
    /// Takes a vblank reference on `pipe`, keeping the interrupt on while a flip is pending.
    fn vblank_get(&self, pipe: u32) -> Result<(), HwError>;

    fn vblank_put(&self, pipe: u32);

    /// Delivers a completed page-flip event to userspace.
    fn send_vblank_event(&self, pipe: u32, event: FlipEvent);

    /// Advances the host's vblank counter and timestamp.
    fn handle_vblank(&self, pipe: u32);

    fn vblank_on(&self, pipe: u32);

    fn vblank_off(&self, pipe: u32);

    /// Blocks until the next vblank (or a host-defined timeout) passes.
    fn wait_one_vblank(&self, pipe: u32);

    /// Bits-per-component advertised by each connector attached to `pipe`. Zero means "unknown".
    fn connector_bpc(&self, pipe: u32) -> Vec<u32>;
}
