use serde::{Deserialize, Serialize};

/// Highest bit depth per colour component the pipeline negotiates.
pub const MAX_BPC: u32 = 10;

/// Default number of gamma LUT entries.
pub const LUT_SIZE: usize = 512;

/// Per-SoC platform description.
///
/// Read once when a pipeline instance is created; later changes to the source configuration do not
/// affect live instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformData {
    /// The chain double-buffers its registers and latches them on mutex release, so staged writes
    /// are issued at flush time inside an acquire/release pair.
    pub shadow_register: bool,
    /// A dedicated dither block exists, so the gamma block is configured without dithering.
    pub dither_exist: bool,
    pub max_bpc: u32,
    pub lut_size: usize,
}

impl Default for PlatformData {
    fn default() -> Self {
        Self {
            shadow_register: false,
            dither_exist: false,
            max_bpc: MAX_BPC,
            lut_size: LUT_SIZE,
        }
    }
}

/// How a pipeline instance issues its register writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// CPU register writes; page flips complete from the vblank interrupt.
    Immediate,
    /// Command-queue packets; page flips complete from the packet callback.
    Cmdq,
}
