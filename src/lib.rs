//! MediaTek-style display data path (DDP) pipeline engine.
//!
//! This facade ties the workspace together:
//! - [`hw`] (`ddp-hw`): component model and the collaborator contracts a platform implements,
//! - [`crtc`] (`ddp-crtc`): the per-pipe commit engine,
//! - [`config`]: the JSON display description that says which components form each pipe.
//!
//! A platform probe typically loads a [`DisplayConfig`], registers its components, and calls
//! [`DisplayConfig::create_crtcs`] to get one [`DdpCrtc`] per populated pipe.
#![forbid(unsafe_code)]

pub mod config;

pub use ddp_crtc as crtc;
pub use ddp_hw as hw;

pub use config::{ConfigError, DisplayConfig, PipeConfig};
pub use ddp_crtc::{CrtcError, CrtcState, DdpCrtc, DisplayMode, PlatformData};
