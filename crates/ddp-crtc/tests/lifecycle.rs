mod common;

use common::*;
use ddp_crtc::{CrtcError, CrtcLifecycle, CrtcState, DdpCrtc, PlaneType, PlatformData};
use ddp_hw::{CompConfig, DdpCompId, PowerDomain};
use ddp_sim::{ClockSnapshot, CompCall, SimEvent, SimPlatform};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const FOUR_STAGE_PATH: [(DdpCompId, u32); 4] = [
    (DdpCompId::Ovl0, 4),
    (DdpCompId::Rdma0, 0),
    (DdpCompId::Color0, 0),
    (DdpCompId::Dsi0, 0),
];

#[test]
fn enable_brings_the_chain_up_in_order() {
    let sim = sim(&BASIC_PATH);
    let mut crtc = create(&sim, &BASIC_PATH, PlatformData::default());
    sim.log.clear();

    crtc.enable(&CrtcState::new(mode())).unwrap();

    use DdpCompId::{Dsi0, Ovl0, Rdma0};
    let cfg = CompConfig {
        width: 1920,
        height: 1080,
        vrefresh: 60,
        bpc: 10,
    };
    let mut expected = vec![
        SimEvent::PowerGet(PowerDomain::Larb(Ovl0)),
        SimEvent::PowerGet(PowerDomain::Mmsys),
        SimEvent::MutexPrepare(PIPE),
        SimEvent::ClockEnable(Ovl0),
        SimEvent::ClockEnable(Rdma0),
        SimEvent::ClockEnable(Dsi0),
        SimEvent::PathAdd(Ovl0, Rdma0),
        SimEvent::PathAdd(Rdma0, Dsi0),
        SimEvent::MutexAdd(PIPE, Ovl0),
        SimEvent::MutexAdd(PIPE, Rdma0),
        SimEvent::MutexAdd(PIPE, Dsi0),
        SimEvent::MutexEnable(PIPE),
        direct(Ovl0, CompCall::BgclrInOn(None)),
        direct(Ovl0, CompCall::Config(cfg)),
        direct(Ovl0, CompCall::Start),
        direct(Rdma0, CompCall::BgclrInOn(Some(Ovl0))),
        direct(Rdma0, CompCall::Config(cfg)),
        direct(Rdma0, CompCall::Start),
        direct(Dsi0, CompCall::BgclrInOn(Some(Rdma0))),
        direct(Dsi0, CompCall::Config(cfg)),
        direct(Dsi0, CompCall::Start),
    ];
    for idx in 0..4 {
        expected.push(direct(
            Ovl0,
            CompCall::LayerConfig { idx, enable: false },
        ));
    }
    expected.push(SimEvent::VblankOn(PIPE));

    assert_eq!(sim.log.events(), expected);
    assert_eq!(crtc.lifecycle(), CrtcLifecycle::Enabled);
    assert!(sim.component(Ovl0).running());
    assert!(sim.component(Dsi0).running());
}

#[test]
fn disable_tears_down_in_reverse() {
    let sim = sim(&BASIC_PATH);
    let mut crtc = enabled(&sim, &BASIC_PATH, PlatformData::default());

    crtc.disable();

    use DdpCompId::{Dsi0, Ovl0, Rdma0};
    let mut expected: Vec<SimEvent> = (0..4)
        .map(|idx| direct(Ovl0, CompCall::LayerConfig { idx, enable: false }))
        .collect();
    expected.extend([
        SimEvent::WaitVblank(PIPE),
        SimEvent::VblankOff(PIPE),
        direct(Ovl0, CompCall::Stop),
        direct(Rdma0, CompCall::Stop),
        direct(Dsi0, CompCall::Stop),
        direct(Ovl0, CompCall::BgclrInOff),
        direct(Rdma0, CompCall::BgclrInOff),
        SimEvent::MutexRemove(PIPE, Ovl0),
        SimEvent::MutexRemove(PIPE, Rdma0),
        SimEvent::MutexDisable(PIPE),
        SimEvent::PathRemove(Ovl0, Rdma0),
        SimEvent::PathRemove(Rdma0, Dsi0),
        SimEvent::MutexRemove(PIPE, Dsi0),
        SimEvent::ClockDisable(Dsi0),
        SimEvent::ClockDisable(Rdma0),
        SimEvent::ClockDisable(Ovl0),
        SimEvent::MutexUnprepare(PIPE),
        SimEvent::PowerPut(PowerDomain::Mmsys),
        SimEvent::PowerPut(PowerDomain::Larb(Ovl0)),
    ]);

    assert_eq!(sim.log.events(), expected);
    assert_eq!(crtc.lifecycle(), CrtcLifecycle::Disabled);
    assert!(sim.clocks.snapshot().is_idle());
    assert!(sim.paths.links().is_empty());
    assert!(!sim.component(Ovl0).running());
}

#[test]
fn clock_enable_failure_unwinds_what_was_enabled() {
    let sim = sim(&FOUR_STAGE_PATH);
    let mut crtc = create(&sim, &FOUR_STAGE_PATH, PlatformData::default());
    sim.clocks.fail_enable_on(DdpCompId::Color0);
    sim.log.clear();

    let err = crtc.enable(&CrtcState::new(mode())).unwrap_err();
    assert!(
        matches!(
            err,
            CrtcError::ClockEnable {
                comp: DdpCompId::Color0,
                ..
            }
        ),
        "{err:?}"
    );

    let disables: Vec<_> = sim
        .log
        .events()
        .into_iter()
        .filter(|event| matches!(event, SimEvent::ClockDisable(_)))
        .collect();
    assert_eq!(
        disables,
        vec![
            SimEvent::ClockDisable(DdpCompId::Rdma0),
            SimEvent::ClockDisable(DdpCompId::Ovl0),
        ]
    );
    assert!(sim.clocks.snapshot().is_idle());

    let mutex = sim.mutexes.mutex(PIPE).state();
    assert_eq!(mutex.enable_count, 0);
    assert_eq!(mutex.prepared, 0);
    assert!(mutex.registered.is_empty());
    assert_eq!(crtc.lifecycle(), CrtcLifecycle::Disabled);
    assert_eq!(sim.log.count(|e| matches!(e, SimEvent::VblankOn(_))), 0);
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    Larb,
    Mmsys,
    MutexPrepare,
    ClockEnable(usize),
}

fn inject(sim: &SimPlatform, fault: Fault) {
    match fault {
        Fault::Larb => sim
            .clocks
            .fail_power_on(PowerDomain::Larb(FOUR_STAGE_PATH[0].0)),
        Fault::Mmsys => sim.clocks.fail_power_on(PowerDomain::Mmsys),
        Fault::MutexPrepare => sim.mutexes.mutex(PIPE).fail_prepare(true),
        Fault::ClockEnable(idx) => sim.clocks.fail_enable_on(FOUR_STAGE_PATH[idx].0),
    }
}

fn any_fault() -> impl Strategy<Value = Fault> {
    prop_oneof![
        Just(Fault::Larb),
        Just(Fault::Mmsys),
        Just(Fault::MutexPrepare),
        (0..FOUR_STAGE_PATH.len()).prop_map(Fault::ClockEnable),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn failed_enable_leaks_nothing(fault in any_fault()) {
        let sim = sim(&FOUR_STAGE_PATH);
        let mut crtc = create(&sim, &FOUR_STAGE_PATH, PlatformData::default());
        let prepared = sim.clocks.snapshot().prepared;

        inject(&sim, fault);
        prop_assert!(crtc.enable(&CrtcState::new(mode())).is_err());
        prop_assert!(sim.clocks.snapshot().is_idle());
        prop_assert_eq!(&sim.clocks.snapshot().prepared, &prepared);
        let mutex = sim.mutexes.mutex(PIPE).state();
        prop_assert_eq!(mutex.prepared, 0);
        prop_assert!(!mutex.enabled);
        prop_assert!(sim.paths.links().is_empty());
        prop_assert_eq!(crtc.lifecycle(), CrtcLifecycle::Disabled);

        // The same instance comes up cleanly once the fault is gone.
        sim.clocks.clear_faults();
        sim.mutexes.mutex(PIPE).fail_prepare(false);
        prop_assert!(crtc.enable(&CrtcState::new(mode())).is_ok());
        crtc.disable();
        prop_assert!(sim.clocks.snapshot().is_idle());

        drop(crtc);
        prop_assert_eq!(sim.clocks.snapshot(), ClockSnapshot::default());
    }
}

#[test]
fn disable_when_not_enabled_is_a_no_op() {
    let sim = sim(&BASIC_PATH);
    let mut crtc = create(&sim, &BASIC_PATH, PlatformData::default());
    sim.log.clear();

    crtc.disable();
    assert!(sim.log.events().is_empty());

    crtc.enable(&CrtcState::new(mode())).unwrap();
    crtc.disable();
    sim.log.clear();
    crtc.disable();
    assert!(sim.log.events().is_empty());
}

#[test]
fn enable_twice_is_rejected() {
    let sim = sim(&BASIC_PATH);
    let mut crtc = enabled(&sim, &BASIC_PATH, PlatformData::default());

    let err = crtc.enable(&CrtcState::new(mode())).unwrap_err();
    assert_eq!(
        err,
        CrtcError::InvalidTransition {
            from: CrtcLifecycle::Enabled
        }
    );
    assert!(sim.log.events().is_empty());
}

#[test]
fn mutex_holds_exactly_the_chain_while_enabled() {
    let sim = sim(&FOUR_STAGE_PATH);
    let mut crtc = create(&sim, &FOUR_STAGE_PATH, PlatformData::default());
    let chain = path_ids(&FOUR_STAGE_PATH);

    for _ in 0..3 {
        crtc.enable(&CrtcState::new(mode())).unwrap();
        let book = crtc.mutex_state();
        assert_eq!(book.registered, chain);
        assert!(book.enabled);
        assert!(book.prepared);
        crtc.disable();
        assert!(crtc.mutex_state().registered.is_empty());
    }

    let hw = sim.mutexes.mutex(PIPE).state();
    assert_eq!(hw.enable_count, 3);
    assert!(hw.registered_at_enable.iter().all(|set| *set == chain));
    assert!(!hw.enabled);
}

#[test]
fn bit_depth_follows_the_connectors() {
    let sim = sim(&BASIC_PATH);
    sim.drm.set_connector_bpc(&[0, 8, 10]);
    let mut crtc = create(&sim, &BASIC_PATH, PlatformData::default());
    crtc.enable(&CrtcState::new(mode())).unwrap();

    let configs: Vec<u32> = sim
        .log
        .comp_calls()
        .into_iter()
        .filter_map(|(_, call, _)| match call {
            CompCall::Config(cfg) => Some(cfg.bpc),
            _ => None,
        })
        .collect();
    assert_eq!(configs, vec![8, 8, 8]);
}

#[test]
fn gamma_block_keeps_its_depth_when_a_dither_block_exists() {
    let path = [
        (DdpCompId::Ovl0, 4),
        (DdpCompId::Gamma, 0),
        (DdpCompId::Dither, 0),
        (DdpCompId::Dsi0, 0),
    ];
    let sim = sim(&path);
    let platform = PlatformData {
        dither_exist: true,
        ..Default::default()
    };
    let mut crtc = create(&sim, &path, platform);
    crtc.enable(&CrtcState::new(mode())).unwrap();

    let depths: Vec<(DdpCompId, u32)> = sim
        .log
        .comp_calls()
        .into_iter()
        .filter_map(|(comp, call, _)| match call {
            CompCall::Config(cfg) => Some((comp, cfg.bpc)),
            _ => None,
        })
        .collect();
    assert_eq!(
        depths,
        vec![
            (DdpCompId::Ovl0, 10),
            (DdpCompId::Gamma, 0),
            (DdpCompId::Dither, 10),
            (DdpCompId::Dsi0, 10),
        ]
    );
}

#[test]
fn empty_or_unprobed_path_creates_nothing() {
    let sim = sim(&BASIC_PATH);
    let res = sim.resources();
    let comps = sim.components();

    assert!(DdpCrtc::create(&res, &comps, &[], PIPE, PlatformData::default())
        .unwrap()
        .is_none());

    let path = [DdpCompId::Ovl0, DdpCompId::Rdma1, DdpCompId::Dsi0];
    assert!(DdpCrtc::create(&res, &comps, &path, PIPE, PlatformData::default())
        .unwrap()
        .is_none());

    // Nothing was taken on the way out.
    assert!(sim.log.events().is_empty());
}

#[test]
fn missing_mutex_fails_creation() {
    let sim = sim(&BASIC_PATH);
    sim.mutexes.fail_get(true);

    let err = DdpCrtc::create(
        &sim.resources(),
        &sim.components(),
        &path_ids(&BASIC_PATH),
        PIPE,
        PlatformData::default(),
    )
    .unwrap_err();
    assert!(matches!(err, CrtcError::MutexGet { pipe: PIPE, .. }), "{err:?}");
    assert_eq!(err.errno(), ddp_hw::error::ENODEV);
}

#[test]
fn clock_prepare_failure_releases_earlier_clocks_and_the_mutex() {
    let sim = sim(&FOUR_STAGE_PATH);
    sim.clocks.fail_prepare_on(DdpCompId::Color0);

    let err = DdpCrtc::create(
        &sim.resources(),
        &sim.components(),
        &path_ids(&FOUR_STAGE_PATH),
        PIPE,
        PlatformData::default(),
    )
    .unwrap_err();
    assert!(
        matches!(
            err,
            CrtcError::ClockPrepare {
                comp: DdpCompId::Color0,
                ..
            }
        ),
        "{err:?}"
    );
    assert_eq!(sim.clocks.snapshot(), ClockSnapshot::default());
    assert!(!sim.mutexes.mutex(PIPE).state().in_use);
}

#[test]
fn drop_releases_everything() {
    let sim = sim(&BASIC_PATH);
    let crtc = enabled(&sim, &BASIC_PATH, PlatformData::default());
    assert!(sim.mutexes.mutex(PIPE).state().in_use);

    drop(crtc);

    assert_eq!(sim.clocks.snapshot(), ClockSnapshot::default());
    let mutex = sim.mutexes.mutex(PIPE).state();
    assert!(!mutex.in_use);
    assert!(!mutex.enabled);
    assert!(!sim.drm.vblank_enabled(PIPE));
}

#[test]
fn plane_types_follow_zpos() {
    let sim = sim(&SPLIT_OVERLAY_PATH);
    let crtc = create(&sim, &SPLIT_OVERLAY_PATH, PlatformData::default());

    assert_eq!(crtc.layer_nr(), 6);
    assert_eq!(crtc.plane_type(0), Some(PlaneType::Primary));
    assert_eq!(crtc.plane_type(1), Some(PlaneType::Cursor));
    assert_eq!(crtc.plane_type(5), Some(PlaneType::Overlay));
    assert_eq!(crtc.plane_type(6), None);
    assert_eq!(crtc.gamma_size(), 512);
}

#[test]
fn vblank_interrupt_is_toggled_on_the_first_component() {
    let sim = sim(&BASIC_PATH);
    let crtc = enabled(&sim, &BASIC_PATH, PlatformData::default());

    crtc.enable_vblank();
    assert!(sim.component(DdpCompId::Ovl0).vblank_enabled());
    assert!(!sim.component(DdpCompId::Rdma0).vblank_enabled());
    crtc.disable_vblank();
    assert!(!sim.component(DdpCompId::Ovl0).vblank_enabled());
}
