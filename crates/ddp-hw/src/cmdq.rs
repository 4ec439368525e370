//! Command-queue packets and the client contract used to submit them.
//!
//! A packet is an ordered list of instructions executed by the command-queue co-processor. The
//! display engine only ever uses four kinds: clear/wait on a completion signal, masked register
//! writes and buffer copies into a register range.
//!
//! Ownership follows the packet: `flush_async` moves the packet into the queue and the queue hands
//! it back through [`CmdqCbData`] once execution finished, so a packet can never be released while
//! the co-processor still references it.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::HwError;

/// A completion signal raised by the co-processor when a packet finishes.
///
/// Signals are numbered per event line; sequence 0 is the initial signal and counts as raised.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CmdqSignal {
    pub event: u16,
    pub seq: u64,
}

impl CmdqSignal {
    pub const fn initial(event: u16) -> Self {
        Self { event, seq: 0 }
    }

    pub fn is_initial(&self) -> bool {
        self.seq == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CmdqInstr {
    /// Clears the signal this packet raises when it completes.
    ClearEvent(CmdqSignal),
    /// Stalls the co-processor until the signal has been raised.
    WaitEvent(CmdqSignal),
    WriteMask {
        subsys: u8,
        addr: u32,
        value: u32,
        mask: u32,
    },
    Copy {
        subsys: u8,
        addr: u32,
        words: Vec<u32>,
    },
}

/// An instruction packet allocated by a [`CmdqClient`].
#[derive(Debug, PartialEq, Eq)]
pub struct CmdqPacket {
    id: u64,
    instrs: Vec<CmdqInstr>,
}

impl CmdqPacket {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            instrs: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn instrs(&self) -> &[CmdqInstr] {
        &self.instrs
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn clear_event(&mut self, signal: CmdqSignal) {
        self.instrs.push(CmdqInstr::ClearEvent(signal));
    }

    pub fn wait_event(&mut self, signal: CmdqSignal) {
        self.instrs.push(CmdqInstr::WaitEvent(signal));
    }

    pub fn write_mask(&mut self, subsys: u8, addr: u32, value: u32, mask: u32) {
        self.instrs.push(CmdqInstr::WriteMask {
            subsys,
            addr,
            value,
            mask,
        });
    }

    pub fn copy(&mut self, subsys: u8, addr: u32, words: &[u32]) {
        self.instrs.push(CmdqInstr::Copy {
            subsys,
            addr,
            words: words.to_vec(),
        });
    }

    /// The signal this packet raises on completion (the first signal it clears).
    pub fn signal(&self) -> Option<CmdqSignal> {
        self.instrs.iter().find_map(|instr| match instr {
            CmdqInstr::ClearEvent(signal) => Some(*signal),
            _ => None,
        })
    }

    pub fn waits(&self) -> impl Iterator<Item = CmdqSignal> + '_ {
        self.instrs.iter().filter_map(|instr| match instr {
            CmdqInstr::WaitEvent(signal) => Some(*signal),
            _ => None,
        })
    }

    /// Number of register-touching instructions.
    pub fn write_count(&self) -> usize {
        self.instrs
            .iter()
            .filter(|instr| matches!(instr, CmdqInstr::WriteMask { .. } | CmdqInstr::Copy { .. }))
            .count()
    }
}

/// Handed back to the submitter once an asynchronously flushed packet finished executing.
#[derive(Debug)]
pub struct CmdqCbData {
    pub packet: CmdqPacket,
    pub status: Result<(), HwError>,
}

/// Completion callback. Runs in the co-processor completion context: it must not block.
pub type CmdqCallback = Box<dyn FnOnce(CmdqCbData) + Send + 'static>;

/// The queue refused a packet at submission time; the packet comes back to the caller.
#[derive(Debug, Error)]
#[error("command queue rejected packet: {error}")]
pub struct CmdqRejected {
    pub packet: CmdqPacket,
    #[source]
    pub error: HwError,
}

pub trait CmdqClient: Send + Sync {
    fn create_packet(&self) -> Result<CmdqPacket, HwError>;

    /// Queues `packet` for execution and returns immediately; `callback` fires exactly once when
    /// the packet completed, successfully or not.
    fn flush_async(&self, packet: CmdqPacket, callback: CmdqCallback) -> Result<(), CmdqRejected>;

    /// Executes `packet` and waits for it to complete. The packet is released either way.
    fn flush(&self, packet: CmdqPacket) -> Result<(), HwError>;
}

/// A pipe's command-queue mailbox channel plus its stream-done event line.
#[derive(Clone)]
pub struct CmdqChannel {
    pub client: Arc<dyn CmdqClient>,
    pub event: u16,
}

impl fmt::Debug for CmdqChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmdqChannel")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

pub trait CmdqProvider: Send + Sync {
    /// Returns the channel serving `pipe`, or `None` when the pipe has no command queue.
    fn channel(&self, pipe: u32) -> Option<CmdqChannel>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_is_first_cleared_event() {
        let mut packet = CmdqPacket::new(1);
        assert_eq!(packet.signal(), None);

        packet.clear_event(CmdqSignal { event: 3, seq: 5 });
        packet.wait_event(CmdqSignal { event: 3, seq: 4 });
        packet.write_mask(0, 0x10, 1, 1);

        assert_eq!(packet.signal(), Some(CmdqSignal { event: 3, seq: 5 }));
        assert_eq!(
            packet.waits().collect::<Vec<_>>(),
            vec![CmdqSignal { event: 3, seq: 4 }]
        );
        assert_eq!(packet.write_count(), 1);
        assert_eq!(packet.len(), 3);
    }

    #[test]
    fn initial_signal_has_sequence_zero() {
        assert!(CmdqSignal::initial(9).is_initial());
        assert!(!CmdqSignal { event: 9, seq: 1 }.is_initial());
    }
}
