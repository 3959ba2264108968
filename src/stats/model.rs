//! Counter snapshot types shared by the local and remote sources.
//!
//! All counters are monotonic kernel values sampled as-is. Derived values
//! (rates, latencies, utilization) live in [`crate::stats::rates`], never here.

use serde::{Deserialize, Serialize};

/// Link speed sentinel for interfaces whose speed could not be probed.
pub const SPEED_UNKNOWN: i64 = -1;

/// Half-duplex link.
pub const DUPLEX_HALF: u8 = 0x00;
/// Full-duplex link.
pub const DUPLEX_FULL: u8 = 0x01;
/// Duplex sentinel for interfaces whose duplex could not be probed.
pub const DUPLEX_UNKNOWN: u8 = 0xff;

/// Per-CPU tick counters from `/proc/stat`, in the file's column order.
///
/// One instance holds the aggregate `cpu` line, further instances hold
/// `cpu0`, `cpu1`, ... lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub hardirq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl CpuSnapshot {
    /// Sum of all ten tick buckets. Used as the elapsed-time base for
    /// aggregate CPU percentages.
    pub fn total_ticks(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.steal
            + self.hardirq
            + self.softirq
            + self.guest
            + self.guest_nice
    }

    /// Sum of the eight non-guest buckets. A single CPU's uptime in ticks,
    /// used when no dedicated uptime source is available.
    pub fn uptime_ticks(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.steal
            + self.hardirq
            + self.softirq
    }
}

/// Memory and swap levels from `/proc/meminfo`, in kibibytes as reported.
///
/// `mem_used` and `swap_used` are not sampled; call [`derive_used`]
/// right after acquisition.
///
/// [`derive_used`]: MemorySnapshot::derive_used
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub mem_total: u64,
    pub mem_free: u64,
    pub mem_used: u64,
    pub swap_total: u64,
    pub swap_free: u64,
    pub swap_used: u64,
    pub cached: u64,
    pub buffers: u64,
    pub dirty: u64,
    pub writeback: u64,
    pub slab: u64,
}

impl MemorySnapshot {
    /// Fills the two derived fields from the sampled levels.
    pub fn derive_used(&mut self) {
        self.mem_used = self
            .mem_total
            .saturating_sub(self.mem_free)
            .saturating_sub(self.cached)
            .saturating_sub(self.buffers)
            .saturating_sub(self.slab);
        self.swap_used = self.swap_total.saturating_sub(self.swap_free);
    }
}

/// One block device's identity and counters from `/proc/diskstats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDeviceSnapshot {
    pub major: u32,
    pub minor: u32,
    pub name: String,
    /// Reads completed successfully.
    pub r_completed: u64,
    /// Reads merged.
    pub r_merged: u64,
    /// Sectors read.
    pub r_sectors: u64,
    /// Time spent reading (ms).
    pub r_spent: u64,
    /// Writes completed.
    pub w_completed: u64,
    /// Writes merged.
    pub w_merged: u64,
    /// Sectors written.
    pub w_sectors: u64,
    /// Time spent writing (ms).
    pub w_spent: u64,
    /// I/Os currently in progress.
    pub io_in_progress: u64,
    /// Time spent doing I/Os (ms).
    pub t_spent: u64,
    /// Weighted time spent doing I/Os (ms).
    pub t_weighted: u64,
}

/// One network interface's link settings and counters from `/proc/net/dev`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSnapshot {
    pub name: String,
    /// Link speed in bits per second, [`SPEED_UNKNOWN`] until probed.
    pub speed: i64,
    /// [`DUPLEX_HALF`], [`DUPLEX_FULL`] or [`DUPLEX_UNKNOWN`].
    pub duplex: u8,
    pub rbytes: u64,
    pub rpackets: u64,
    pub wbytes: u64,
    pub wpackets: u64,
    pub ierr: u64,
    pub oerr: u64,
    pub coll: u64,
    /// Composite saturation counter: rx errs + rx drop + tx drop + tx fifo
    /// + tx colls + tx carrier.
    pub sat: u64,
}

impl Default for InterfaceSnapshot {
    fn default() -> Self {
        Self {
            name: String::new(),
            speed: SPEED_UNKNOWN,
            duplex: DUPLEX_UNKNOWN,
            rbytes: 0,
            rpackets: 0,
            wbytes: 0,
            wpackets: 0,
            ierr: 0,
            oerr: 0,
            coll: 0,
            sat: 0,
        }
    }
}

/// System load averages over 1, 5 and 15 minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadAvg {
    pub min1: f64,
    pub min5: f64,
    pub min15: f64,
}
