//! Shared helpers for `ddp-crtc` integration tests.
#![allow(dead_code)]

use ddp_crtc::{CrtcState, DdpCrtc, DisplayMode, PlatformData};
use ddp_hw::{DdpCompId, FlipEvent, LayerFb, LayerPending, PixelFormat};
use ddp_sim::{CompCall, SimEvent, SimPlatform};

pub const PIPE: u32 = 0;

/// Overlay with four layers feeding a read DMA and a DSI encoder.
pub const BASIC_PATH: [(DdpCompId, u32); 3] = [
    (DdpCompId::Ovl0, 4),
    (DdpCompId::Rdma0, 0),
    (DdpCompId::Dsi0, 0),
];

/// Two overlays chained back to back (4 + 2 layers).
pub const SPLIT_OVERLAY_PATH: [(DdpCompId, u32); 4] = [
    (DdpCompId::Ovl0, 4),
    (DdpCompId::Ovl2L0, 2),
    (DdpCompId::Rdma0, 0),
    (DdpCompId::Dsi0, 0),
];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn mode() -> DisplayMode {
    DisplayMode::new(1920, 1080, 60)
}

pub fn path_ids(path: &[(DdpCompId, u32)]) -> Vec<DdpCompId> {
    path.iter().map(|(id, _)| *id).collect()
}

pub fn sim(path: &[(DdpCompId, u32)]) -> SimPlatform {
    init_tracing();
    SimPlatform::new().with_components(path)
}

pub fn cmdq_sim(path: &[(DdpCompId, u32)]) -> SimPlatform {
    init_tracing();
    SimPlatform::new().with_cmdq().with_components(path)
}

pub fn create(sim: &SimPlatform, path: &[(DdpCompId, u32)], platform: PlatformData) -> DdpCrtc {
    DdpCrtc::create(
        &sim.resources(),
        &sim.components(),
        &path_ids(path),
        PIPE,
        platform,
    )
    .expect("create failed")
    .expect("no pipeline for a fully probed path")
}

/// Creates and enables a pipeline, then clears the call log.
pub fn enabled(sim: &SimPlatform, path: &[(DdpCompId, u32)], platform: PlatformData) -> DdpCrtc {
    let mut crtc = create(sim, path, platform);
    crtc.enable(&CrtcState::new(mode())).expect("enable failed");
    sim.log.clear();
    crtc
}

pub fn fb(addr: u64) -> LayerFb {
    LayerFb {
        addr,
        pitch: 1920 * 4,
        format: PixelFormat::Xrgb8888,
        x: 0,
        y: 0,
        width: 1920,
        height: 1080,
    }
}

pub fn showing(addr: u64) -> LayerPending {
    LayerPending::showing(fb(addr))
}

/// One transaction: begin (with an event if `event` is set), show `addr` on `layer`, flush.
pub fn commit(crtc: &DdpCrtc, event: Option<u64>, layer: u32, addr: u64) -> CrtcState {
    let mut state = CrtcState::new(mode());
    state.event = event.map(FlipEvent::new);
    crtc.begin(&mut state);
    crtc.stage_layer(layer, showing(addr)).expect("layer in range");
    crtc.flush(&mut state);
    state
}

pub fn direct(comp: DdpCompId, call: CompCall) -> SimEvent {
    SimEvent::Comp {
        comp,
        call,
        queued: false,
    }
}

pub fn queued(comp: DdpCompId, call: CompCall) -> SimEvent {
    SimEvent::Comp {
        comp,
        call,
        queued: true,
    }
}
