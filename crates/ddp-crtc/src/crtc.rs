use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ddp_hw::{
    ClockPower, CmdqCbData, CompConfig, DdpCompId, DdpComponent, DdpComponents, DdpResources,
    DispMutexProvider, DrmHost, FlipEvent, LayerPending, PathRouting, PowerDomain,
};
use tracing::{debug, error, info, warn};

use crate::backend::{CmdqBackend, CommitBackend, CommitWork, ImmediateBackend};
use crate::config::{BackendKind, PlatformData};
use crate::error::{CrtcError, Result};
use crate::flip::FlipCompletion;
use crate::mutex::{DispMutex, MutexSnapshot};
use crate::ops::{bring_up_ops, negotiate_bpc, teardown_ops, DdpOp};
use crate::routing::{LayerRouting, PlaneType};
use crate::staged::StagedHw;
use crate::state::CrtcState;
use crate::stats::{CrtcStats, CrtcStatsSnapshot};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrtcLifecycle {
    Disabled,
    Enabling,
    Enabled,
    Disabling,
}

/// State shared between the caller and the interrupt-context producers (vblank handler, packet
/// callbacks).
pub(crate) struct CrtcCore {
    pipe: u32,
    chain: Vec<Arc<dyn DdpComponent>>,
    routing: LayerRouting,
    platform: PlatformData,
    mutex: DispMutex,
    clocks: Arc<dyn ClockPower>,
    paths: Arc<dyn PathRouting>,
    drm: Arc<dyn DrmHost>,
    staged: Mutex<StagedHw>,
    flip: FlipCompletion,
    stats: CrtcStats,
}

impl CrtcCore {
    pub fn pipe(&self) -> u32 {
        self.pipe
    }

    pub fn chain(&self) -> &[Arc<dyn DdpComponent>] {
        &self.chain
    }

    pub fn platform(&self) -> &PlatformData {
        &self.platform
    }

    pub fn mutex(&self) -> &DispMutex {
        &self.mutex
    }

    pub fn flip(&self) -> &FlipCompletion {
        &self.flip
    }

    pub fn stats(&self) -> &CrtcStats {
        &self.stats
    }

    fn head(&self) -> DdpCompId {
        self.chain[0].id()
    }

    fn comp_ids(&self) -> Vec<DdpCompId> {
        self.chain.iter().map(|comp| comp.id()).collect()
    }

    pub fn take_staged_ops(&self) -> Vec<DdpOp> {
        lock(&self.staged).take_ops(self.head(), &self.routing)
    }

    fn deliver(&self, event: FlipEvent) {
        debug!(pipe = self.pipe, event = event.id, "page flip done");
        self.drm.send_vblank_event(self.pipe, event);
        self.drm.vblank_put(self.pipe);
        self.stats.inc_flips_completed();
    }

    pub fn complete_flip(&self, serial: u64) {
        self.flip.complete(serial, |event| self.deliver(event));
    }

    /// Completion callback of an asynchronously flushed packet.
    pub fn on_packet_done(&self, serial: Option<u64>, data: CmdqCbData) {
        let CmdqCbData { packet, status } = data;
        if let Err(err) = status {
            warn!(
                pipe = self.pipe,
                packet = packet.id(),
                %err,
                "command packet execution failed"
            );
            self.stats.inc_packet_failures();
        }
        if let Some(serial) = serial {
            self.complete_flip(serial);
        }
        drop(packet);
    }
}

/// One display pipeline instance: a chain of components scanned out together.
pub struct DdpCrtc {
    core: Arc<CrtcCore>,
    backend: Arc<dyn CommitBackend>,
    mutexes: Arc<dyn DispMutexProvider>,
    lifecycle: CrtcLifecycle,
}

impl fmt::Debug for DdpCrtc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DdpCrtc")
            .field("pipe", &self.core.pipe)
            .field("chain", &self.core.comp_ids())
            .field("backend", &self.backend.kind())
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

impl DdpCrtc {
    /// Builds the pipeline for `path` on `pipe`.
    ///
    /// Returns `Ok(None)` when there is nothing to drive: an empty path, or a path naming a
    /// component that was not probed (disabled in the platform description).
    pub fn create(
        res: &DdpResources,
        comps: &DdpComponents,
        path: &[DdpCompId],
        pipe: u32,
        platform: PlatformData,
    ) -> Result<Option<Self>> {
        if path.is_empty() {
            debug!(pipe, "empty display path; no pipeline created");
            return Ok(None);
        }

        let mut chain = Vec::with_capacity(path.len());
        for &id in path {
            match comps.get(id) {
                Some(comp) => chain.push(comp),
                None => {
                    info!(
                        pipe,
                        comp = %id,
                        "path component disabled or missing; no pipeline created"
                    );
                    return Ok(None);
                }
            }
        }

        let mutex_hw = res.mutexes.get(pipe).map_err(|source| {
            error!(pipe, %source, "failed to get display mutex");
            CrtcError::MutexGet { pipe, source }
        })?;

        for (i, comp) in chain.iter().enumerate() {
            if let Err(source) = res.clocks.prepare(comp.id()) {
                error!(pipe, comp = %comp.id(), %source, "failed to prepare clock");
                for prev in chain[..i].iter().rev() {
                    res.clocks.unprepare(prev.id());
                }
                res.mutexes.put(mutex_hw);
                return Err(CrtcError::ClockPrepare {
                    comp: comp.id(),
                    source,
                });
            }
        }

        let backend: Arc<dyn CommitBackend> =
            match res.cmdq.as_ref().and_then(|cmdq| cmdq.channel(pipe)) {
                Some(channel) => Arc::new(CmdqBackend::new(channel)),
                None => Arc::new(ImmediateBackend),
            };

        let routing = LayerRouting::from_chain(&chain);
        let layer_nr = routing.layer_nr();
        info!(
            pipe,
            comps = chain.len(),
            layers = layer_nr,
            backend = ?backend.kind(),
            "display pipeline created"
        );

        let core = CrtcCore {
            pipe,
            chain,
            routing,
            platform,
            mutex: DispMutex::new(mutex_hw),
            clocks: Arc::clone(&res.clocks),
            paths: Arc::clone(&res.paths),
            drm: Arc::clone(&res.drm),
            staged: Mutex::new(StagedHw::new(layer_nr)),
            flip: FlipCompletion::default(),
            stats: CrtcStats::new(),
        };

        Ok(Some(Self {
            core: Arc::new(core),
            backend,
            mutexes: Arc::clone(&res.mutexes),
            lifecycle: CrtcLifecycle::Disabled,
        }))
    }

    pub fn pipe(&self) -> u32 {
        self.core.pipe
    }

    pub fn lifecycle(&self) -> CrtcLifecycle {
        self.lifecycle
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn components(&self) -> Vec<DdpCompId> {
        self.core.comp_ids()
    }

    pub fn layer_nr(&self) -> u32 {
        self.core.routing.layer_nr()
    }

    pub fn routing(&self) -> &LayerRouting {
        &self.core.routing
    }

    pub fn plane_type(&self, layer: u32) -> Option<PlaneType> {
        (layer < self.layer_nr()).then(|| PlaneType::for_zpos(layer))
    }

    pub fn gamma_size(&self) -> usize {
        self.core.platform.lut_size
    }

    pub fn platform(&self) -> &PlatformData {
        &self.core.platform
    }

    pub fn stats(&self) -> CrtcStatsSnapshot {
        self.core.stats.snapshot()
    }

    pub fn mutex_state(&self) -> MutexSnapshot {
        self.core.mutex.snapshot()
    }

    pub fn flip_pending(&self) -> bool {
        self.core.flip.is_pending()
    }

    /// Brings the pipeline up for `state`'s mode.
    ///
    /// On failure every resource taken so far is released in reverse order and the pipeline stays
    /// disabled.
    pub fn enable(&mut self, state: &CrtcState) -> Result<()> {
        if self.lifecycle != CrtcLifecycle::Disabled {
            return Err(CrtcError::InvalidTransition {
                from: self.lifecycle,
            });
        }
        self.lifecycle = CrtcLifecycle::Enabling;

        let core = &self.core;
        let larb = PowerDomain::Larb(core.head());
        if let Err(source) = core.clocks.runtime_get(larb) {
            error!(pipe = core.pipe, %source, "failed to get larb power");
            self.lifecycle = CrtcLifecycle::Disabled;
            return Err(CrtcError::Power {
                domain: larb,
                source,
            });
        }

        if let Err(err) = self.hw_init(state) {
            error!(pipe = self.core.pipe, %err, "pipeline bring-up failed");
            self.core.clocks.runtime_put(larb);
            self.lifecycle = CrtcLifecycle::Disabled;
            return Err(err);
        }

        self.core.drm.vblank_on(self.core.pipe);
        self.lifecycle = CrtcLifecycle::Enabled;
        info!(pipe = self.core.pipe, mode = %state.adjusted_mode.name, "pipeline enabled");
        Ok(())
    }

    fn hw_init(&self, state: &CrtcState) -> Result<()> {
        let core = &self.core;
        let mode = &state.adjusted_mode;
        let bpc = negotiate_bpc(&core.drm.connector_bpc(core.pipe), core.platform.max_bpc);
        debug!(
            pipe = core.pipe,
            width = mode.hdisplay,
            height = mode.vdisplay,
            vrefresh = mode.vrefresh,
            bpc,
            "bringing up pipeline"
        );

        core.clocks
            .runtime_get(PowerDomain::Mmsys)
            .map_err(|source| CrtcError::Power {
                domain: PowerDomain::Mmsys,
                source,
            })?;

        if let Err(source) = core.mutex.prepare() {
            core.clocks.runtime_put(PowerDomain::Mmsys);
            return Err(CrtcError::MutexPrepare(source));
        }

        for (i, comp) in core.chain.iter().enumerate() {
            if let Err(source) = core.clocks.enable(comp.id()) {
                for prev in core.chain[..i].iter().rev() {
                    core.clocks.disable(prev.id());
                }
                core.mutex.unprepare();
                core.clocks.runtime_put(PowerDomain::Mmsys);
                return Err(CrtcError::ClockEnable {
                    comp: comp.id(),
                    source,
                });
            }
        }

        for pair in core.chain.windows(2) {
            core.paths.add_comp_to_path(pair[0].id(), pair[1].id());
        }
        for comp in &core.chain {
            core.mutex.add_comp(comp.id());
        }
        core.mutex.enable(&core.comp_ids());

        *lock(&core.staged) = StagedHw::new(core.routing.layer_nr());
        let cfg = CompConfig {
            width: mode.hdisplay,
            height: mode.vdisplay,
            vrefresh: mode.vrefresh,
            bpc,
        };
        let ops = bring_up_ops(&core.chain, &core.routing, cfg, &core.platform);
        self.backend.run_pass(core, &ops);
        Ok(())
    }

    /// Shuts the pipeline down. A no-op unless enabled.
    pub fn disable(&mut self) {
        if self.lifecycle != CrtcLifecycle::Enabled {
            debug!(pipe = self.core.pipe, lifecycle = ?self.lifecycle, "disable ignored");
            return;
        }
        self.lifecycle = CrtcLifecycle::Disabling;
        let core = &self.core;

        lock(&core.staged).disable_all();
        self.backend.drain(core);
        core.drm.wait_one_vblank(core.pipe);
        core.drm.vblank_off(core.pipe);

        if core.flip.complete_any(|event| core.deliver(event)) {
            debug!(pipe = core.pipe, "completed outstanding page flip on disable");
        }

        self.hw_fini();
        core.clocks.runtime_put(PowerDomain::Larb(core.head()));
        self.lifecycle = CrtcLifecycle::Disabled;
        info!(pipe = core.pipe, "pipeline disabled");
    }

    fn hw_fini(&self) {
        let core = &self.core;
        let ops = teardown_ops(&core.chain);
        self.backend.run_pass(core, &ops);

        let (tail, rest) = match core.chain.split_last() {
            Some(split) => split,
            None => return,
        };
        for comp in rest {
            core.mutex.remove_comp(comp.id());
        }
        core.mutex.disable();
        for pair in core.chain.windows(2) {
            core.paths.remove_comp_from_path(pair[0].id(), pair[1].id());
        }
        core.mutex.remove_comp(tail.id());

        for comp in core.chain.iter().rev() {
            core.clocks.disable(comp.id());
        }
        core.mutex.unprepare();
        core.clocks.runtime_put(PowerDomain::Mmsys);
    }

    /// Starts a commit. Arms the transaction's page-flip event unless one is still outstanding,
    /// in which case the new event stays in `state` and the commit proceeds without it.
    pub fn begin(&self, state: &mut CrtcState) {
        let core = &self.core;
        if let Some(mut event) = state.event.take() {
            if core.flip.is_pending() {
                error!(
                    pipe = core.pipe,
                    event = event.id,
                    "new event while there is still a pending event"
                );
                core.stats.inc_ordering_violations();
                state.event = Some(event);
            } else {
                event.pipe = Some(core.pipe);
                if let Err(err) = core.drm.vblank_get(core.pipe) {
                    warn!(pipe = core.pipe, %err, "failed to take vblank reference");
                }
                match core.flip.arm(event) {
                    Ok(serial) => {
                        debug!(pipe = core.pipe, serial, "flip armed");
                        core.stats.inc_flips_armed();
                    }
                    Err(event) => {
                        // Lost a race with another arm; give the reference back.
                        core.drm.vblank_put(core.pipe);
                        core.stats.inc_ordering_violations();
                        state.event = Some(event);
                    }
                }
            }
        }

        self.backend.begin(core, state);
    }

    /// Copies the adjusted mode into the pending mode fields.
    pub fn mode_set_nofb(&self, state: &mut CrtcState) {
        let mode = &state.adjusted_mode;
        debug!(pipe = self.core.pipe, mode = %mode.name, "mode set");
        state.pending_width = mode.hdisplay;
        state.pending_height = mode.vdisplay;
        state.pending_vrefresh = mode.vrefresh;
        state.pending_config = true;
    }

    /// Records new buffer/format state for a layer; written at the next flush if `dirty`.
    pub fn stage_layer(&self, layer: u32, pending: LayerPending) -> Result<()> {
        if lock(&self.core.staged).stage_layer(layer, pending) {
            Ok(())
        } else {
            Err(self.out_of_range(layer))
        }
    }

    /// Marks a layer as needing a write with `pending` as its content. Pure state update.
    pub fn configure_layer(&self, layer: u32, pending: LayerPending) -> Result<()> {
        if lock(&self.core.staged).configure_layer(layer, pending) {
            Ok(())
        } else {
            Err(self.out_of_range(layer))
        }
    }

    pub fn layer_state(&self, layer: u32) -> Option<LayerPending> {
        lock(&self.core.staged).layer(layer).cloned()
    }

    fn out_of_range(&self, index: u32) -> CrtcError {
        CrtcError::LayerOutOfRange {
            index,
            layer_nr: self.layer_nr(),
        }
    }

    /// Ends a commit: promotes staged state and hands the writes to the backend.
    pub fn flush(&self, state: &mut CrtcState) {
        let core = &self.core;
        {
            let mut staged = lock(&core.staged);
            if std::mem::take(&mut state.pending_config) {
                staged.set_mode(CompConfig {
                    width: state.pending_width,
                    height: state.pending_height,
                    vrefresh: state.pending_vrefresh,
                    bpc: 0,
                });
            }
            staged.promote_dirty();
        }

        let gamma = if state.color_mgmt_changed {
            state.gamma_lut.clone()
        } else {
            None
        };
        // A flip armed by an earlier, never-flushed transaction rides on this one.
        let work = CommitWork {
            serial: core.flip.pending_serial(),
            gamma,
        };
        self.backend.flush(core, state, work);
    }

    /// Handle for the vblank interrupt of this pipeline.
    pub fn irq_handle(&self) -> CrtcIrq {
        CrtcIrq {
            core: Arc::clone(&self.core),
            backend: Arc::clone(&self.backend),
        }
    }

    pub fn on_vblank_irq(&self) {
        self.irq_handle().handle();
    }

    pub fn enable_vblank(&self) {
        self.core.chain[0].enable_vblank();
    }

    pub fn disable_vblank(&self) {
        self.core.chain[0].disable_vblank();
    }
}

impl Drop for DdpCrtc {
    fn drop(&mut self) {
        if self.lifecycle == CrtcLifecycle::Enabled {
            self.disable();
        }
        for comp in self.core.chain.iter().rev() {
            self.core.clocks.unprepare(comp.id());
        }
        self.mutexes.put(Arc::clone(self.core.mutex.hw()));
        debug!(pipe = self.core.pipe, "display pipeline destroyed");
    }
}

/// Vblank interrupt entry point for one pipeline. Cheap to clone into an interrupt thread.
#[derive(Clone)]
pub struct CrtcIrq {
    core: Arc<CrtcCore>,
    backend: Arc<dyn CommitBackend>,
}

impl CrtcIrq {
    pub fn pipe(&self) -> u32 {
        self.core.pipe
    }

    pub fn handle(&self) {
        let core = &self.core;
        core.stats.inc_vblank_irqs();
        self.backend.on_vblank(core);
        core.drm.handle_vblank(core.pipe);
        if self.backend.completes_on_vblank() {
            core.flip.complete_ready(|event| core.deliver(event));
        }
    }
}

impl fmt::Debug for CrtcIrq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrtcIrq")
            .field("pipe", &self.core.pipe)
            .finish_non_exhaustive()
    }
}
