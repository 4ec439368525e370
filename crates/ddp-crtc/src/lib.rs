//! Display-pipeline commit engine.
//!
//! A [`DdpCrtc`] owns one chain of display hardware components, the hardware mutex that gates
//! their synchronized start, and the per-commit state that turns an atomic modesetting
//! transaction into register writes. Writes are issued either directly from the CPU (with
//! page-flip completion signalled from the vblank interrupt) or recorded into command-queue
//! packets that a co-processor executes asynchronously (with completion signalled from the
//! packet callback). The choice is made once per instance, at creation.
//!
//! The commit cycle mirrors the atomic helpers the host framework drives:
//!
//! ```text
//! create ─► enable ─► { begin ─► stage/configure layers ─► flush }* ─► disable
//!                       ▲                                     │
//!                       └──── vblank irq / packet callback ◄──┘ (completes the page flip)
//! ```
#![forbid(unsafe_code)]

mod backend;
pub mod config;
mod crtc;
pub mod error;
mod flip;
pub mod mutex;
pub mod ops;
pub mod routing;
mod staged;
pub mod state;
pub mod stats;

pub use config::{BackendKind, PlatformData, LUT_SIZE, MAX_BPC};
pub use crtc::{CrtcIrq, CrtcLifecycle, DdpCrtc};
pub use error::{CrtcError, Result};
pub use mutex::MutexSnapshot;
pub use ops::DdpOp;
pub use routing::{LayerRoute, LayerRouting, PlaneType};
pub use state::{CrtcState, DisplayMode};
pub use stats::{CrtcStats, CrtcStatsSnapshot};
