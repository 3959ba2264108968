//! Two-generation snapshot storage.
//!
//! The polling loop owns exactly one [`SnapshotStore`]: the source fills
//! `curr`, the rate engine reads `(prev, curr)`, then [`SnapshotStore::rotate`]
//! copies `curr` into `prev` for the next cycle.

use serde::{Deserialize, Serialize};

use crate::stats::model::{BlockDeviceSnapshot, CpuSnapshot, InterfaceSnapshot, MemorySnapshot};

/// One full sample of every counter family, taken within a single cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Slot 0 is the aggregate line, slots 1.. are per-CPU.
    pub cpus: Vec<CpuSnapshot>,
    pub memory: MemorySnapshot,
    pub disks: Vec<BlockDeviceSnapshot>,
    pub ifaces: Vec<InterfaceSnapshot>,
    /// Aggregate CPU tick sum, the elapsed-time base for CPU percentages.
    pub cpu_ticks: u64,
    /// Single-CPU uptime in ticks, the elapsed-time base for disk/net rates.
    pub uptime: u64,
}

/// Current and previous generation of [`SystemSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    pub curr: SystemSnapshot,
    pub prev: SystemSnapshot,
}

impl SnapshotStore {
    /// Allocates both generations zero-initialized for the given entity
    /// counts. Interfaces start with unknown link settings.
    pub fn sized(n_cpus: usize, n_disks: usize, n_ifaces: usize) -> Self {
        let snapshot = SystemSnapshot {
            cpus: vec![CpuSnapshot::default(); n_cpus],
            disks: vec![BlockDeviceSnapshot::default(); n_disks],
            ifaces: vec![InterfaceSnapshot::default(); n_ifaces],
            ..Default::default()
        };
        Self {
            curr: snapshot.clone(),
            prev: snapshot,
        }
    }

    /// Rotates the current generation into the previous one.
    ///
    /// This is an explicit field-wise copy, not a swap: after rotation both
    /// generations hold the same values and `curr` is safe to overwrite
    /// piecemeal by the next acquisition.
    pub fn rotate(&mut self) {
        self.prev.clone_from(&self.curr);
    }
}
