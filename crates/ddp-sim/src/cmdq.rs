//! Simulated command-queue co-processor.
//!
//! Submitted packets sit in a queue until the test (or the blocking `flush`) runs them. A packet
//! is runnable once every signal it waits on has been raised; sequence 0 counts as raised. When
//! several packets are runnable the engine may pick any of them, which is how tests model
//! pipelined execution. Callbacks fire outside the engine lock, like a real completion thread.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ddp_hw::error::EIO;
use ddp_hw::{
    CmdqCallback, CmdqCbData, CmdqChannel, CmdqClient, CmdqInstr, CmdqPacket, CmdqProvider,
    CmdqRejected, CmdqSignal, HwError, RegisterBlock,
};
use tracing::debug;

use crate::comp::SimRegs;
use crate::log::{SimEvent, SimLog};

/// Event id of pipe 0's stream-done line; pipe `n` uses `CMDQ_EVENT_BASE + n`.
pub const CMDQ_EVENT_BASE: u16 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecRecord {
    pub id: u64,
    /// Sequence of the signal the packet raised.
    pub seq: Option<u64>,
    pub ok: bool,
}

struct Submitted {
    packet: CmdqPacket,
    callback: Option<CmdqCallback>,
}

#[derive(Default)]
struct Engine {
    next_id: u64,
    queue: VecDeque<Submitted>,
    raised: BTreeSet<CmdqSignal>,
    executed: Vec<ExecRecord>,
    submit_order: Vec<u64>,
    fail_create: u32,
    reject_next: bool,
    exec_fail_next: bool,
    auto_run: bool,
    pipes: Option<BTreeSet<u32>>,
}

impl Engine {
    fn runnable(&self) -> Vec<usize> {
        self.queue
            .iter()
            .enumerate()
            .filter(|(_, sub)| {
                sub.packet
                    .waits()
                    .all(|signal| signal.is_initial() || self.raised.contains(&signal))
            })
            .map(|(idx, _)| idx)
            .collect()
    }
}

/// Cloneable handle to one simulated co-processor shared by every pipe.
#[derive(Clone)]
pub struct SimCmdq {
    log: SimLog,
    regs: Arc<Mutex<Vec<Arc<SimRegs>>>>,
    engine: Arc<Mutex<Engine>>,
}

impl SimCmdq {
    pub fn new(log: SimLog, regs: Arc<Mutex<Vec<Arc<SimRegs>>>>) -> Self {
        Self {
            log,
            regs,
            engine: Arc::new(Mutex::new(Engine::default())),
        }
    }

    fn engine(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve only the listed pipes; others get no channel.
    pub fn restrict_to_pipes(&self, pipes: &[u32]) {
        self.engine().pipes = Some(pipes.iter().copied().collect());
    }

    /// Run packets as soon as they are submitted.
    pub fn set_auto_run(&self, auto_run: bool) {
        self.engine().auto_run = auto_run;
    }

    /// Make the next `count` packet allocations fail.
    pub fn fail_create(&self, count: u32) {
        self.engine().fail_create = count;
    }

    pub fn reject_next(&self) {
        self.engine().reject_next = true;
    }

    pub fn exec_fail_next(&self) {
        self.engine().exec_fail_next = true;
    }

    pub fn pending(&self) -> usize {
        self.engine().queue.len()
    }

    pub fn runnable(&self) -> usize {
        self.engine().runnable().len()
    }

    pub fn executed(&self) -> Vec<ExecRecord> {
        self.engine().executed.clone()
    }

    /// Packet ids in the order they were accepted.
    pub fn submit_order(&self) -> Vec<u64> {
        self.engine().submit_order.clone()
    }

    /// Executes one runnable packet, chosen as `pick` modulo the number of runnable packets.
    /// Returns the executed packet id, or `None` if nothing can run.
    pub fn run_next(&self, pick: usize) -> Option<u64> {
        let (submitted, status) = {
            let mut engine = self.engine();
            let runnable = engine.runnable();
            if runnable.is_empty() {
                return None;
            }
            let idx = runnable[pick % runnable.len()];
            let submitted = engine.queue.remove(idx)?;

            let status = if std::mem::take(&mut engine.exec_fail_next) {
                Err(HwError::CmdqExec { status: -EIO })
            } else {
                self.execute(&submitted.packet);
                Ok(())
            };
            let signal = submitted.packet.signal();
            if let Some(signal) = signal {
                engine.raised.insert(signal);
            }
            engine.executed.push(ExecRecord {
                id: submitted.packet.id(),
                seq: signal.map(|signal| signal.seq),
                ok: status.is_ok(),
            });
            (submitted, status)
        };

        let id = submitted.packet.id();
        self.log.push(SimEvent::PacketExec {
            id,
            ok: status.is_ok(),
        });
        debug!(packet = id, ok = status.is_ok(), "packet executed");
        if let Some(callback) = submitted.callback {
            callback(CmdqCbData {
                packet: submitted.packet,
                status,
            });
        }
        Some(id)
    }

    /// Runs packets oldest-first until nothing is runnable. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_next(0).is_some() {
            ran += 1;
        }
        ran
    }

    fn execute(&self, packet: &CmdqPacket) {
        let regs = self.regs.lock().unwrap_or_else(PoisonError::into_inner);
        let find = |subsys: u8, addr: u32| regs.iter().find(|r| r.contains(subsys, addr));
        for instr in packet.instrs() {
            match instr {
                CmdqInstr::WriteMask {
                    subsys,
                    addr,
                    value,
                    mask,
                } => {
                    if let Some(block) = find(*subsys, *addr) {
                        let offset = addr - block.base();
                        if *mask == u32::MAX {
                            block.write(offset, *value);
                        } else {
                            block.write_mask(offset, *value, *mask);
                        }
                    }
                }
                CmdqInstr::Copy {
                    subsys,
                    addr,
                    words,
                } => {
                    if let Some(block) = find(*subsys, *addr) {
                        let offset = addr - block.base();
                        for (i, word) in words.iter().enumerate() {
                            block.write(offset + (i as u32) * 4, *word);
                        }
                    }
                }
                CmdqInstr::ClearEvent(_) | CmdqInstr::WaitEvent(_) => {}
            }
        }
    }

    fn accept(&self, packet: CmdqPacket, callback: Option<CmdqCallback>) -> bool {
        let mut engine = self.engine();
        engine.submit_order.push(packet.id());
        engine.queue.push_back(Submitted { packet, callback });
        engine.auto_run
    }
}

impl CmdqClient for SimCmdq {
    fn create_packet(&self) -> Result<CmdqPacket, HwError> {
        let mut engine = self.engine();
        if engine.fail_create > 0 {
            engine.fail_create -= 1;
            return Err(HwError::PacketCreate);
        }
        engine.next_id += 1;
        Ok(CmdqPacket::new(engine.next_id))
    }

    fn flush_async(&self, packet: CmdqPacket, callback: CmdqCallback) -> Result<(), CmdqRejected> {
        let id = packet.id();
        if std::mem::take(&mut self.engine().reject_next) {
            self.log.push(SimEvent::PacketReject { id });
            return Err(CmdqRejected {
                packet,
                error: HwError::Busy,
            });
        }
        self.log.push(SimEvent::PacketSubmit {
            id,
            blocking: false,
        });
        if self.accept(packet, Some(callback)) {
            self.run_pending();
        }
        Ok(())
    }

    fn flush(&self, packet: CmdqPacket) -> Result<(), HwError> {
        let id = packet.id();
        self.log.push(SimEvent::PacketSubmit { id, blocking: true });
        self.accept(packet, None);
        loop {
            let done = self.engine().executed.iter().rev().find(|rec| rec.id == id).copied();
            if let Some(record) = done {
                return if record.ok {
                    Ok(())
                } else {
                    Err(HwError::CmdqExec { status: -EIO })
                };
            }
            if self.run_next(0).is_none() {
                let mut engine = self.engine();
                engine.queue.retain(|sub| sub.packet.id() != id);
                return Err(HwError::Timeout);
            }
        }
    }
}

impl CmdqProvider for SimCmdq {
    fn channel(&self, pipe: u32) -> Option<CmdqChannel> {
        if let Some(pipes) = &self.engine().pipes {
            if !pipes.contains(&pipe) {
                return None;
            }
        }
        let event = CMDQ_EVENT_BASE + u16::try_from(pipe).ok()?;
        Some(CmdqChannel {
            client: Arc::new(self.clone()),
            event,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn packet(cmdq: &SimCmdq, seq: u64, wait: u64) -> CmdqPacket {
        let mut packet = cmdq.create_packet().unwrap();
        packet.clear_event(CmdqSignal { event: 1, seq });
        packet.wait_event(CmdqSignal { event: 1, seq: wait });
        packet
    }

    #[test]
    fn waiting_packet_is_not_runnable_until_signalled() {
        let cmdq = SimCmdq::new(SimLog::new(), Default::default());
        let first = packet(&cmdq, 1, 0);
        let second = packet(&cmdq, 2, 1);
        let done = Arc::new(AtomicUsize::new(0));

        let d = Arc::clone(&done);
        cmdq.flush_async(second, Box::new(move |_: CmdqCbData| {
            d.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        assert_eq!(cmdq.runnable(), 0);

        let d = Arc::clone(&done);
        cmdq.flush_async(first, Box::new(move |_: CmdqCbData| {
            d.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        assert_eq!(cmdq.runnable(), 1);

        assert_eq!(cmdq.run_pending(), 2);
        assert_eq!(done.load(Ordering::SeqCst), 2);
        let seqs: Vec<_> = cmdq.executed().iter().map(|rec| rec.seq).collect();
        assert_eq!(seqs, vec![Some(1), Some(2)]);
    }

    #[test]
    fn blocking_flush_times_out_on_unraised_signal() {
        let cmdq = SimCmdq::new(SimLog::new(), Default::default());
        let stuck = packet(&cmdq, 2, 7);
        assert_eq!(cmdq.flush(stuck), Err(HwError::Timeout));
        assert_eq!(cmdq.pending(), 0);
    }

    #[test]
    fn rejected_packet_comes_back() {
        let cmdq = SimCmdq::new(SimLog::new(), Default::default());
        cmdq.reject_next();
        let pkt = packet(&cmdq, 1, 0);
        let id = pkt.id();
        let rejected = cmdq.flush_async(pkt, Box::new(|_: CmdqCbData| {})).unwrap_err();
        assert_eq!(rejected.packet.id(), id);
        assert_eq!(cmdq.pending(), 0);
    }

    #[test]
    fn restricted_pipes_get_no_channel() {
        let cmdq = SimCmdq::new(SimLog::new(), Default::default());
        cmdq.restrict_to_pipes(&[1]);
        assert!(cmdq.channel(0).is_none());
        assert_eq!(cmdq.channel(1).map(|ch| ch.event), Some(CMDQ_EVENT_BASE + 1));
    }
}
