//! Pipeline components: the individual hardware stages of a display data path.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::regs::HwTarget;

/// Identity of a display hardware block.
///
/// The serde spelling matches the platform description naming (`"ovl0"`, `"ovl0_2l"`, ...).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DdpCompId {
    Ovl0,
    #[serde(rename = "ovl0_2l")]
    Ovl2L0,
    Ovl1,
    #[serde(rename = "ovl1_2l")]
    Ovl2L1,
    Rdma0,
    Rdma1,
    Rdma2,
    Color0,
    Color1,
    Ccorr,
    Aal0,
    Gamma,
    Dither,
    Dsi0,
    Dsi1,
    Dpi0,
    Dpi1,
    Wdma0,
    Ufoe,
    Od0,
    Pwm0,
    Bls,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DdpCompType {
    Ovl,
    Rdma,
    Wdma,
    Color,
    Ccorr,
    Aal,
    Gamma,
    Dither,
    Dsi,
    Dpi,
    Ufoe,
    Od,
    Pwm,
    Bls,
}

impl DdpCompId {
    pub const ALL: [DdpCompId; 22] = [
        DdpCompId::Ovl0,
        DdpCompId::Ovl2L0,
        DdpCompId::Ovl1,
        DdpCompId::Ovl2L1,
        DdpCompId::Rdma0,
        DdpCompId::Rdma1,
        DdpCompId::Rdma2,
        DdpCompId::Color0,
        DdpCompId::Color1,
        DdpCompId::Ccorr,
        DdpCompId::Aal0,
        DdpCompId::Gamma,
        DdpCompId::Dither,
        DdpCompId::Dsi0,
        DdpCompId::Dsi1,
        DdpCompId::Dpi0,
        DdpCompId::Dpi1,
        DdpCompId::Wdma0,
        DdpCompId::Ufoe,
        DdpCompId::Od0,
        DdpCompId::Pwm0,
        DdpCompId::Bls,
    ];

    pub fn comp_type(self) -> DdpCompType {
        match self {
            DdpCompId::Ovl0 | DdpCompId::Ovl2L0 | DdpCompId::Ovl1 | DdpCompId::Ovl2L1 => {
                DdpCompType::Ovl
            }
            DdpCompId::Rdma0 | DdpCompId::Rdma1 | DdpCompId::Rdma2 => DdpCompType::Rdma,
            DdpCompId::Color0 | DdpCompId::Color1 => DdpCompType::Color,
            DdpCompId::Ccorr => DdpCompType::Ccorr,
            DdpCompId::Aal0 => DdpCompType::Aal,
            DdpCompId::Gamma => DdpCompType::Gamma,
            DdpCompId::Dither => DdpCompType::Dither,
            DdpCompId::Dsi0 | DdpCompId::Dsi1 => DdpCompType::Dsi,
            DdpCompId::Dpi0 | DdpCompId::Dpi1 => DdpCompType::Dpi,
            DdpCompId::Wdma0 => DdpCompType::Wdma,
            DdpCompId::Ufoe => DdpCompType::Ufoe,
            DdpCompId::Od0 => DdpCompType::Od,
            DdpCompId::Pwm0 => DdpCompType::Pwm,
            DdpCompId::Bls => DdpCompType::Bls,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DdpCompId::Ovl0 => "ovl0",
            DdpCompId::Ovl2L0 => "ovl0_2l",
            DdpCompId::Ovl1 => "ovl1",
            DdpCompId::Ovl2L1 => "ovl1_2l",
            DdpCompId::Rdma0 => "rdma0",
            DdpCompId::Rdma1 => "rdma1",
            DdpCompId::Rdma2 => "rdma2",
            DdpCompId::Color0 => "color0",
            DdpCompId::Color1 => "color1",
            DdpCompId::Ccorr => "ccorr",
            DdpCompId::Aal0 => "aal0",
            DdpCompId::Gamma => "gamma",
            DdpCompId::Dither => "dither",
            DdpCompId::Dsi0 => "dsi0",
            DdpCompId::Dsi1 => "dsi1",
            DdpCompId::Dpi0 => "dpi0",
            DdpCompId::Dpi1 => "dpi1",
            DdpCompId::Wdma0 => "wdma0",
            DdpCompId::Ufoe => "ufoe",
            DdpCompId::Od0 => "od0",
            DdpCompId::Pwm0 => "pwm0",
            DdpCompId::Bls => "bls",
        }
    }
}

impl fmt::Display for DdpCompId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Timing/format parameters pushed to every component on (re)configuration.
///
/// `bpc == 0` means "keep the component's current bit depth".
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CompConfig {
    pub width: u32,
    pub height: u32,
    pub vrefresh: u32,
    pub bpc: u32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    #[default]
    Xrgb8888,
    Argb8888,
    Rgb888,
    Rgb565,
    Uyvy,
    Yuyv,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Xrgb8888 | PixelFormat::Argb8888 => 4,
            PixelFormat::Rgb888 => 3,
            PixelFormat::Rgb565 | PixelFormat::Uyvy | PixelFormat::Yuyv => 2,
        }
    }
}

/// Buffer/format descriptor scanned out by one layer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LayerFb {
    pub addr: u64,
    pub pitch: u32,
    pub format: PixelFormat,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Pending hardware state of one layer slot.
///
/// `dirty` is raised by whoever changes the buffer/format; `config` means "needs a hardware
/// write" and is owned by the commit engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LayerPending {
    pub enable: bool,
    pub dirty: bool,
    pub config: bool,
    pub fb: LayerFb,
}

impl LayerPending {
    /// A layer showing `fb`, flagged dirty.
    pub fn showing(fb: LayerFb) -> Self {
        Self {
            enable: true,
            dirty: true,
            config: false,
            fb,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GammaEntry {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl GammaEntry {
    /// Packs the entry into the 10-bit-per-channel hardware LUT word layout.
    pub fn to_lut_word(self) -> u32 {
        let r = u32::from(self.red >> 6);
        let g = u32::from(self.green >> 6);
        let b = u32::from(self.blue >> 6);
        (r << 20) | (g << 10) | b
    }
}

/// One hardware stage of a display data path.
///
/// Every operation that touches registers receives a [`HwTarget`] so the same component code
/// serves both the direct register path and command-packet recording.
pub trait DdpComponent: Send + Sync {
    fn id(&self) -> DdpCompId;

    /// Number of hardware layer slots this component scans out (0 for non-overlay blocks).
    fn layer_nr(&self) -> u32 {
        0
    }

    fn config(&self, cfg: &CompConfig, hw: &mut HwTarget<'_>);

    fn start(&self, hw: &mut HwTarget<'_>);

    fn stop(&self, hw: &mut HwTarget<'_>);

    fn layer_config(&self, _idx: u32, _state: &LayerPending, _hw: &mut HwTarget<'_>) {}

    fn gamma_set(&self, _lut: &[GammaEntry], _hw: &mut HwTarget<'_>) {}

    /// Routes the previous component's output into this component's background-colour input.
    fn bgclr_in_on(&self, _prev: Option<DdpCompId>, _hw: &mut HwTarget<'_>) {}

    fn bgclr_in_off(&self, _hw: &mut HwTarget<'_>) {}

    fn enable_vblank(&self) {}

    fn disable_vblank(&self) {}
}

impl fmt::Debug for dyn DdpComponent + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DdpComponent")
            .field("id", &self.id())
            .field("layer_nr", &self.layer_nr())
            .finish()
    }
}

/// Components discovered at probe time, keyed by id.
#[derive(Clone, Default)]
pub struct DdpComponents {
    by_id: BTreeMap<DdpCompId, Arc<dyn DdpComponent>>,
}

impl DdpComponents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `comp`, replacing any previous component with the same id.
    pub fn insert(&mut self, comp: Arc<dyn DdpComponent>) -> Option<Arc<dyn DdpComponent>> {
        self.by_id.insert(comp.id(), comp)
    }

    pub fn get(&self, id: DdpCompId) -> Option<Arc<dyn DdpComponent>> {
        self.by_id.get(&id).cloned()
    }

    pub fn contains(&self, id: DdpCompId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl fmt::Debug for DdpComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.by_id.keys()).finish()
    }
}
