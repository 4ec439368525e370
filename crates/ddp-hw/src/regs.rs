use crate::cmdq::CmdqPacket;

/// A component's memory-mapped register window.
///
/// `subsys` and `base` identify the window to the command-queue co-processor, which addresses
/// registers as `(subsys, base + offset)` rather than through a CPU mapping.
pub trait RegisterBlock: Send + Sync {
    fn subsys(&self) -> u8;

    fn base(&self) -> u32;

    fn read(&self, offset: u32) -> u32;

    fn write(&self, offset: u32, value: u32);

    fn write_mask(&self, offset: u32, value: u32, mask: u32) {
        let old = self.read(offset);
        self.write(offset, (old & !mask) | (value & mask));
    }
}

/// Where a component's register writes go.
#[derive(Debug)]
pub enum HwTarget<'a> {
    /// Write the registers now, from the calling CPU.
    Direct,
    /// Record the writes into a command packet for the co-processor.
    Queued(&'a mut CmdqPacket),
}

impl HwTarget<'_> {
    pub fn is_queued(&self) -> bool {
        matches!(self, HwTarget::Queued(_))
    }

    pub fn write(&mut self, regs: &dyn RegisterBlock, offset: u32, value: u32) {
        self.write_mask(regs, offset, value, u32::MAX);
    }

    pub fn write_mask(&mut self, regs: &dyn RegisterBlock, offset: u32, value: u32, mask: u32) {
        match self {
            HwTarget::Direct => {
                if mask == u32::MAX {
                    regs.write(offset, value);
                } else {
                    regs.write_mask(offset, value, mask);
                }
            }
            HwTarget::Queued(packet) => {
                packet.write_mask(regs.subsys(), regs.base() + offset, value, mask);
            }
        }
    }

    /// Writes `words` to consecutive registers starting at `offset`.
    pub fn write_buffer(&mut self, regs: &dyn RegisterBlock, offset: u32, words: &[u32]) {
        match self {
            HwTarget::Direct => {
                for (i, word) in words.iter().enumerate() {
                    regs.write(offset + (i as u32) * 4, *word);
                }
            }
            HwTarget::Queued(packet) => {
                packet.copy(regs.subsys(), regs.base() + offset, words);
            }
        }
    }
}
