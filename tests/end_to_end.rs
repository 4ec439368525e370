use ddp::crtc::BackendKind;
use ddp::hw::{DdpCompId, FlipEvent, LayerFb, LayerPending};
use ddp::{CrtcState, DisplayConfig, DisplayMode};
use ddp_sim::{ClockSnapshot, SimPlatform};
use pretty_assertions::assert_eq;

const CONFIG: &str = r#"{
    "platform": { "dither_exist": true },
    "pipes": [
        { "pipe": 0, "path": ["ovl0", "ovl0_2l", "rdma0", "color0", "gamma", "dither", "dsi0"] },
        { "pipe": 1, "path": ["ovl1", "rdma1", "dpi0"] },
        { "pipe": 2, "path": ["ovl1_2l", "rdma2", "dsi1"] }
    ]
}"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Pipe 2's components are not probed; pipe 1 is the only one with a command-queue channel.
fn platform() -> SimPlatform {
    let sim = SimPlatform::new().with_cmdq().with_components(&[
        (DdpCompId::Ovl0, 4),
        (DdpCompId::Ovl2L0, 2),
        (DdpCompId::Rdma0, 0),
        (DdpCompId::Color0, 0),
        (DdpCompId::Gamma, 0),
        (DdpCompId::Dither, 0),
        (DdpCompId::Dsi0, 0),
        (DdpCompId::Ovl1, 4),
        (DdpCompId::Rdma1, 0),
        (DdpCompId::Dpi0, 0),
    ]);
    if let Some(cmdq) = sim.cmdq() {
        cmdq.restrict_to_pipes(&[1]);
    }
    sim
}

fn flip(id: u64, addr: u64) -> (CrtcState, LayerPending) {
    let mut state = CrtcState::new(DisplayMode::new(1920, 1080, 60));
    state.event = Some(FlipEvent::new(id));
    let layer = LayerPending::showing(LayerFb {
        addr,
        ..Default::default()
    });
    (state, layer)
}

#[test]
fn configured_pipes_commit_independently() {
    init_tracing();
    let sim = platform();
    let config = DisplayConfig::from_json(CONFIG).unwrap();

    let mut crtcs = config
        .create_crtcs(&sim.resources(), &sim.components())
        .unwrap();
    let pipes: Vec<(u32, BackendKind, u32)> = crtcs
        .iter()
        .map(|crtc| (crtc.pipe(), crtc.backend_kind(), crtc.layer_nr()))
        .collect();
    assert_eq!(
        pipes,
        vec![(0, BackendKind::Immediate, 6), (1, BackendKind::Cmdq, 4)]
    );

    for crtc in &mut crtcs {
        let mode = DisplayMode::new(1920, 1080, 60);
        crtc.enable(&CrtcState::new(mode)).unwrap();
    }

    // Pipe 0: layer 4 is the first slot of the second overlay.
    let (mut state, layer) = flip(100, 0xa000);
    crtcs[0].begin(&mut state);
    crtcs[0].stage_layer(4, layer).unwrap();
    crtcs[0].flush(&mut state);

    let (mut state, layer) = flip(200, 0xb000);
    crtcs[1].begin(&mut state);
    crtcs[1].stage_layer(0, layer).unwrap();
    crtcs[1].flush(&mut state);

    assert!(sim.drm.delivered().is_empty());

    crtcs[0].on_vblank_irq();
    assert_eq!(sim.drm.delivered_ids(), vec![100]);
    assert_eq!(sim.component(DdpCompId::Ovl2L0).layer_addr(0), 0xa000);

    // Pipe 1's vblank does nothing for its flip; the packet callback does.
    crtcs[1].on_vblank_irq();
    assert_eq!(sim.drm.delivered_ids(), vec![100]);
    assert_eq!(sim.cmdq().map(|cmdq| cmdq.run_pending()), Some(1));
    assert_eq!(sim.drm.delivered_ids(), vec![100, 200]);
    assert_eq!(sim.component(DdpCompId::Ovl1).layer_addr(0), 0xb000);

    let pipes: Vec<Option<u32>> = sim
        .drm
        .delivered()
        .into_iter()
        .map(|ev| ev.event.pipe)
        .collect();
    assert_eq!(pipes, vec![Some(0), Some(1)]);

    drop(crtcs);
    assert_eq!(sim.clocks.snapshot(), ClockSnapshot::default());
    assert!(sim.paths.links().is_empty());
    assert!(!sim.mutexes.mutex(0).state().in_use);
    assert!(!sim.mutexes.mutex(1).state().in_use);
}

#[test]
fn creation_error_releases_earlier_pipes() {
    init_tracing();
    let sim = platform();
    sim.clocks.fail_prepare_on(DdpCompId::Rdma1);
    let config = DisplayConfig::from_json(CONFIG).unwrap();

    let err = config
        .create_crtcs(&sim.resources(), &sim.components())
        .unwrap_err();
    assert_eq!(err.errno(), ddp::hw::error::EIO);
    assert_eq!(sim.clocks.snapshot(), ClockSnapshot::default());
    assert!(!sim.mutexes.mutex(0).state().in_use);
}
