//! Commit backends: how a pipeline's register writes reach hardware.
//!
//! The pipeline's control flow (enable, begin, flush, disable) is the same for every platform.
//! What differs is where writes go and who completes the page flip:
//! - [`ImmediateBackend`] writes registers from the CPU and completes flips from the vblank
//!   interrupt once the flush has marked them ready.
//! - [`CmdqBackend`] records writes into command packets executed by a co-processor and completes
//!   flips from the packet callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ddp_hw::{
    CmdqCallback, CmdqChannel, CmdqClient, CmdqPacket, CmdqSignal, GammaEntry, HwTarget,
};
use tracing::{debug, warn};

use crate::config::BackendKind;
use crate::crtc::CrtcCore;
use crate::ops::{apply_ops, gamma_ops, DdpOp};
use crate::state::CrtcState;

/// Work carried from `flush` into the backend.
#[derive(Debug, Default)]
pub(crate) struct CommitWork {
    /// Serial of the flip pending on the pipeline when the flush started, if any.
    pub serial: Option<u64>,
    /// New colour table to program on every component.
    pub gamma: Option<Arc<[GammaEntry]>>,
}

pub(crate) trait CommitBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Issues a bring-up or teardown pass and returns once it reached hardware.
    fn run_pass(&self, core: &CrtcCore, ops: &[DdpOp]);

    fn begin(&self, core: &CrtcCore, state: &mut CrtcState);

    fn flush(&self, core: &Arc<CrtcCore>, state: &mut CrtcState, work: CommitWork);

    /// Pushes whatever is staged to hardware now, without a page flip attached.
    fn drain(&self, core: &CrtcCore);

    /// Work done from the vblank interrupt before the host's vblank bookkeeping.
    fn on_vblank(&self, core: &CrtcCore);

    /// Whether the vblank interrupt completes page flips.
    fn completes_on_vblank(&self) -> bool;
}

#[derive(Debug, Default)]
pub(crate) struct ImmediateBackend;

impl ImmediateBackend {
    fn apply_staged(&self, core: &CrtcCore) {
        let ops = core.take_staged_ops();
        if ops.is_empty() {
            return;
        }
        apply_ops(core.chain(), &ops, &mut HwTarget::Direct);
    }

    /// Shadow-register path: everything written between acquire and release latches together.
    fn apply_staged_locked(&self, core: &CrtcCore, gamma: Option<&Arc<[GammaEntry]>>) {
        core.mutex().acquire();
        if let Some(lut) = gamma {
            apply_ops(core.chain(), &gamma_ops(core.chain(), lut), &mut HwTarget::Direct);
        }
        self.apply_staged(core);
        core.mutex().release();
    }
}

impl CommitBackend for ImmediateBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Immediate
    }

    fn run_pass(&self, core: &CrtcCore, ops: &[DdpOp]) {
        apply_ops(core.chain(), ops, &mut HwTarget::Direct);
    }

    fn begin(&self, _core: &CrtcCore, _state: &mut CrtcState) {}

    fn flush(&self, core: &Arc<CrtcCore>, _state: &mut CrtcState, work: CommitWork) {
        if core.platform().shadow_register {
            self.apply_staged_locked(core, work.gamma.as_ref());
        } else if let Some(lut) = &work.gamma {
            apply_ops(core.chain(), &gamma_ops(core.chain(), lut), &mut HwTarget::Direct);
        }
        if work.serial.is_some() {
            core.flip().mark_ready();
        }
    }

    fn drain(&self, core: &CrtcCore) {
        if core.platform().shadow_register {
            self.apply_staged_locked(core, None);
        } else {
            self.apply_staged(core);
        }
    }

    fn on_vblank(&self, core: &CrtcCore) {
        if !core.platform().shadow_register {
            self.apply_staged(core);
        }
    }

    fn completes_on_vblank(&self) -> bool {
        true
    }
}

/// Command-queue backend for one pipe.
///
/// Every packet opens with two ordering instructions: clear its own completion signal, then wait
/// for the signal of the most recently submitted packet. The co-processor may pipeline packets,
/// but each one starts only after its predecessor finished.
pub(crate) struct CmdqBackend {
    client: Arc<dyn CmdqClient>,
    event: u16,
    next_seq: AtomicU64,
    last_submitted: AtomicU64,
}

impl CmdqBackend {
    pub fn new(channel: CmdqChannel) -> Self {
        Self {
            client: channel.client,
            event: channel.event,
            next_seq: AtomicU64::new(1),
            last_submitted: AtomicU64::new(0),
        }
    }

    fn open_packet(&self, core: &CrtcCore) -> Option<CmdqPacket> {
        match self.client.create_packet() {
            Ok(mut packet) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                packet.clear_event(CmdqSignal {
                    event: self.event,
                    seq,
                });
                packet.wait_event(CmdqSignal {
                    event: self.event,
                    seq: self.last_submitted.load(Ordering::Acquire),
                });
                Some(packet)
            }
            Err(err) => {
                warn!(
                    pipe = core.pipe(),
                    %err,
                    "command packet creation failed; writing registers directly"
                );
                core.stats().inc_packet_failures();
                None
            }
        }
    }

    fn mark_submitted(&self, signal: Option<CmdqSignal>) {
        if let Some(signal) = signal {
            self.last_submitted.store(signal.seq, Ordering::Release);
        }
    }
}

impl CommitBackend for CmdqBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cmdq
    }

    fn run_pass(&self, core: &CrtcCore, ops: &[DdpOp]) {
        let Some(mut packet) = self.open_packet(core) else {
            apply_ops(core.chain(), ops, &mut HwTarget::Direct);
            return;
        };
        apply_ops(core.chain(), ops, &mut HwTarget::Queued(&mut packet));
        let signal = packet.signal();
        let id = packet.id();
        match self.client.flush(packet) {
            Ok(()) => {
                self.mark_submitted(signal);
                core.stats().inc_packets_submitted();
                debug!(pipe = core.pipe(), packet = id, ops = ops.len(), "pass executed");
            }
            Err(err) => {
                warn!(pipe = core.pipe(), packet = id, %err, "command queue pass failed");
                core.stats().inc_packet_failures();
            }
        }
    }

    fn begin(&self, core: &CrtcCore, state: &mut CrtcState) {
        if state.cmdq_handle.is_some() {
            debug!(pipe = core.pipe(), "replacing unflushed command packet");
        }
        state.cmdq_handle = self.open_packet(core);
    }

    fn flush(&self, core: &Arc<CrtcCore>, state: &mut CrtcState, work: CommitWork) {
        let mut ops = core.take_staged_ops();
        if let Some(lut) = &work.gamma {
            ops.extend(gamma_ops(core.chain(), lut));
        }

        let Some(mut packet) = state.cmdq_handle.take() else {
            apply_ops(core.chain(), &ops, &mut HwTarget::Direct);
            if let Some(serial) = work.serial {
                core.complete_flip(serial);
            }
            return;
        };

        apply_ops(core.chain(), &ops, &mut HwTarget::Queued(&mut packet));
        let signal = packet.signal();
        let id = packet.id();
        let serial = work.serial;
        let cb_core = Arc::clone(core);
        let callback: CmdqCallback = Box::new(move |data| cb_core.on_packet_done(serial, data));

        match self.client.flush_async(packet, callback) {
            Ok(()) => {
                self.mark_submitted(signal);
                core.stats().inc_packets_submitted();
                debug!(pipe = core.pipe(), packet = id, ?serial, "packet submitted");
            }
            Err(rejected) => {
                warn!(
                    pipe = core.pipe(),
                    packet = id,
                    error = %rejected.error,
                    "command queue rejected packet; completing flip now"
                );
                core.stats().inc_packet_failures();
                drop(rejected.packet);
                if let Some(serial) = serial {
                    core.complete_flip(serial);
                }
            }
        }
    }

    fn drain(&self, core: &CrtcCore) {
        let ops = core.take_staged_ops();
        if !ops.is_empty() {
            self.run_pass(core, &ops);
        }
    }

    fn on_vblank(&self, _core: &CrtcCore) {}

    fn completes_on_vblank(&self) -> bool {
        false
    }
}
