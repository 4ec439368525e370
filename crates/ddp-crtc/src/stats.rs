use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one pipeline instance.
///
/// Updated from the caller, the vblank interrupt and the packet callback; all relaxed.
#[derive(Debug, Default)]
pub struct CrtcStats {
    flips_armed: AtomicU64,
    flips_completed: AtomicU64,
    ordering_violations: AtomicU64,
    packets_submitted: AtomicU64,
    /// Packet creation failures, rejected submissions and failed executions.
    packet_failures: AtomicU64,
    vblank_irqs: AtomicU64,
}

impl CrtcStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_flips_armed(&self) {
        self.flips_armed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_flips_completed(&self) {
        self.flips_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ordering_violations(&self) {
        self.ordering_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_packets_submitted(&self) {
        self.packets_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_packet_failures(&self) {
        self.packet_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_vblank_irqs(&self) {
        self.vblank_irqs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CrtcStatsSnapshot {
        CrtcStatsSnapshot {
            flips_armed: self.flips_armed.load(Ordering::Relaxed),
            flips_completed: self.flips_completed.load(Ordering::Relaxed),
            ordering_violations: self.ordering_violations.load(Ordering::Relaxed),
            packets_submitted: self.packets_submitted.load(Ordering::Relaxed),
            packet_failures: self.packet_failures.load(Ordering::Relaxed),
            vblank_irqs: self.vblank_irqs.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CrtcStatsSnapshot {
    pub flips_armed: u64,
    pub flips_completed: u64,
    pub ordering_violations: u64,
    pub packets_submitted: u64,
    pub packet_failures: u64,
    pub vblank_irqs: u64,
}

impl CrtcStatsSnapshot {
    /// Flips armed but not yet completed.
    pub fn flips_outstanding(&self) -> u64 {
        self.flips_armed.saturating_sub(self.flips_completed)
    }
}
