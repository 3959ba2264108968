//! Source-agnostic acquisition contract.
//!
//! Two interchangeable implementations exist: [`local::LocalSource`] reads
//! kernel pseudo-files, [`remote::RemoteSource`] reads the same counters
//! through SQL views of a companion schema on a PostgreSQL connection.
//! Everything above this module depends only on [`StatsSource`].

pub mod fs;
pub mod local;
pub mod mock;
pub mod remote;

use crate::stats::model::{
    BlockDeviceSnapshot, CpuSnapshot, InterfaceSnapshot, LoadAvg, MemorySnapshot,
};

/// Clock tick frequency assumed when the source cannot report its own.
pub const DEFAULT_HZ: u32 = 100;

/// Entity classes the enumerator can count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    BlockDevice,
    NetworkInterface,
}

/// Non-fatal acquisition failure: the affected family has no data this
/// cycle. The caller reports it and keeps polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    Unavailable(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Unavailable(msg) => write!(f, "stats unavailable: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

/// One CPU acquisition: tick snapshots plus the uptime bases derived from
/// them.
#[derive(Debug, Clone, Default)]
pub struct CpuReading {
    /// Slot 0 is the aggregate, slots 1.. are per-CPU.
    pub cpus: Vec<CpuSnapshot>,
    /// Aggregate tick sum (uptime multiplied by the number of processors).
    pub uptime: u64,
    /// Single-CPU uptime from the cpu0 line, when that line was seen.
    pub cpu0_uptime: Option<u64>,
}

/// Acquisition capability shared by the local and remote sources.
///
/// Failure semantics per method:
/// - counting and frequency methods degrade to 0 / [`DEFAULT_HZ`], never fail
/// - `read_cpu` and `read_memory` return zeroed snapshots on failure,
///   an explicit "no data" state the rate engine renders as 0
/// - `read_disks` and `read_netdev` signal [`SourceError::Unavailable`]
///   instead of fabricating partial data
pub trait StatsSource {
    /// Clock ticks per second of the sampled host.
    fn tick_frequency(&mut self) -> u32;

    /// Number of CPU slots including the aggregate one. 0 when unreadable.
    fn count_cpus(&mut self) -> usize;

    /// Number of devices of the given kind. 0 means "acquisition
    /// unavailable", never an error.
    fn count_devices(&mut self, kind: DeviceKind) -> usize;

    /// Machine uptime in clock ticks from the dedicated uptime source.
    fn read_uptime(&mut self, hz: u32) -> Option<u64>;

    /// Load averages, zeroed on failure.
    fn read_loadavg(&mut self) -> LoadAvg;

    /// CPU tick snapshots for `n_cpus` slots, zeroed on failure.
    fn read_cpu(&mut self, n_cpus: usize) -> CpuReading;

    /// Memory levels with derived fields filled in, zeroed on failure.
    fn read_memory(&mut self) -> MemorySnapshot;

    /// Block device counters for up to `n` devices.
    fn read_disks(&mut self, n: usize) -> Result<Vec<BlockDeviceSnapshot>, SourceError>;

    /// Network interface counters for up to `n` interfaces, with link
    /// settings left at their unknown sentinels.
    fn read_netdev(&mut self, n: usize) -> Result<Vec<InterfaceSnapshot>, SourceError>;

    /// Link speed (bits/s) and duplex for one interface. `None` leaves the
    /// unknown sentinels in place; callers decide the re-probe cadence.
    fn probe_link(&mut self, ifname: &str) -> Option<(i64, u8)>;
}
