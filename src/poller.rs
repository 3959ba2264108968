//! Polling-cycle orchestration.
//!
//! One [`Poller`] owns one source and one snapshot store. Each cycle it
//! acquires every counter family, resolves the per-family intervals, runs
//! the rate engine and rotates the store. Acquisition is synchronous: a
//! slow source stalls the cycle, it never interleaves with the next one.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::source::{DeviceKind, StatsSource};
use crate::stats::model::{DUPLEX_UNKNOWN, LoadAvg, MemorySnapshot, SPEED_UNKNOWN};
use crate::stats::rates::{
    BlockDeviceRates, CpuRates, InterfaceRates, compute_interval, cpu_rates, disk_rates, net_rates,
};
use crate::stats::store::SnapshotStore;

/// Computed output of one polling cycle.
///
/// `None` for a device family means its acquisition was unavailable this
/// cycle — an explicit "no data" indication, not an empty system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    /// Unix timestamp of the acquisition.
    pub timestamp: i64,
    pub loadavg: LoadAvg,
    /// Slot 0 is the aggregate, slots 1.. are per-CPU.
    pub cpu: Vec<CpuRates>,
    /// Absolute levels, not rates.
    pub memory: MemorySnapshot,
    pub disks: Option<Vec<BlockDeviceRates>>,
    pub ifaces: Option<Vec<InterfaceRates>>,
}

/// Drives one source through acquire/diff/rotate cycles.
pub struct Poller<S: StatsSource> {
    source: S,
    hz: u32,
    n_cpus: usize,
    n_disks: usize,
    n_ifaces: usize,
    store: SnapshotStore,
    /// Probed link settings per interface name, probed on first sight.
    links: HashMap<String, (i64, u8)>,
    /// Whether uptime is derived from cpu0 ticks instead of the dedicated
    /// source. Decided on the first cycle and kept for the session.
    uptime_from_cpu0: Option<bool>,
}

impl<S: StatsSource> Poller<S> {
    /// Resolves the tick frequency, enumerates the entity counts and sizes
    /// the snapshot store.
    pub fn new(mut source: S) -> Self {
        let hz = source.tick_frequency();
        // The aggregate CPU slot exists even when enumeration fails.
        let n_cpus = source.count_cpus().max(1);
        let n_disks = source.count_devices(DeviceKind::BlockDevice);
        let n_ifaces = source.count_devices(DeviceKind::NetworkInterface);

        info!(
            "poller ready: hz={}, cpus={}, disks={}, interfaces={}",
            hz,
            n_cpus - 1,
            n_disks,
            n_ifaces
        );

        Self {
            source,
            hz,
            n_cpus,
            n_disks,
            n_ifaces,
            store: SnapshotStore::sized(n_cpus, n_disks, n_ifaces),
            links: HashMap::new(),
            uptime_from_cpu0: None,
        }
    }

    pub fn hz(&self) -> u32 {
        self.hz
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Re-counts devices and reallocates the store wholesale. Call when the
    /// administrator hot-plugs hardware; the poller does not detect this
    /// mid-session.
    pub fn re_enumerate(&mut self) {
        self.n_cpus = self.source.count_cpus().max(1);
        self.n_disks = self.source.count_devices(DeviceKind::BlockDevice);
        self.n_ifaces = self.source.count_devices(DeviceKind::NetworkInterface);
        self.store = SnapshotStore::sized(self.n_cpus, self.n_disks, self.n_ifaces);
        debug!(
            "re-enumerated: cpus={}, disks={}, interfaces={}",
            self.n_cpus - 1,
            self.n_disks,
            self.n_ifaces
        );
    }

    /// Forgets probed link settings; the next cycle probes each interface
    /// again. Probing is comparatively expensive and link settings rarely
    /// change, so the cadence is the caller's decision.
    pub fn reprobe_links(&mut self) {
        self.links.clear();
    }

    /// Resolves this cycle's single-CPU uptime in ticks.
    ///
    /// The choice between the dedicated uptime source and the cpu0 tick sum
    /// is made once on the first cycle; re-deriving it per cycle would mix
    /// bases and drift the interval.
    fn resolve_uptime(&mut self, cpu0_uptime: Option<u64>) -> u64 {
        match self.uptime_from_cpu0 {
            Some(false) => self
                .source
                .read_uptime(self.hz)
                .unwrap_or(self.store.prev.uptime),
            Some(true) => cpu0_uptime.unwrap_or(self.store.prev.uptime),
            None => match self.source.read_uptime(self.hz) {
                Some(ticks) => {
                    self.uptime_from_cpu0 = Some(false);
                    ticks
                }
                None => {
                    debug!("dedicated uptime unavailable, using cpu0 ticks for the session");
                    self.uptime_from_cpu0 = Some(true);
                    cpu0_uptime.unwrap_or(0)
                }
            },
        }
    }

    /// Runs one acquire/diff/rotate cycle.
    ///
    /// On the first cycle the previous generation is all zeroes, so the
    /// reported rates cover the whole time since system startup.
    pub fn cycle(&mut self) -> CycleReport {
        let loadavg = self.source.read_loadavg();

        let reading = self.source.read_cpu(self.n_cpus);
        self.store.curr.cpu_ticks = reading.uptime;
        self.store.curr.uptime = self.resolve_uptime(reading.cpu0_uptime);
        self.store.curr.cpus = reading.cpus;

        self.store.curr.memory = self.source.read_memory();

        // An unavailable family keeps the previous generation's counters in
        // curr (no partial data, no spike on recovery) and reports None.
        let disks_ok = match self.source.read_disks(self.n_disks) {
            Ok(disks) => {
                self.store.curr.disks = disks;
                true
            }
            Err(e) => {
                warn!("{}", e);
                false
            }
        };

        let ifaces_ok = match self.source.read_netdev(self.n_ifaces) {
            Ok(mut ifaces) => {
                self.apply_link_settings(&mut ifaces);
                self.store.curr.ifaces = ifaces;
                true
            }
            Err(e) => {
                warn!("{}", e);
                false
            }
        };

        let itv_cpu = compute_interval(self.store.prev.cpu_ticks, self.store.curr.cpu_ticks);
        let itv = compute_interval(self.store.prev.uptime, self.store.curr.uptime);

        let cpu = self
            .store
            .prev
            .cpus
            .iter()
            .zip(&self.store.curr.cpus)
            .enumerate()
            .map(|(slot, (prev, curr))| {
                // The aggregate tick sum accrues N times faster than one
                // CPU's ticks, so per-CPU slots diff against the single-CPU
                // uptime base instead.
                let base = if slot == 0 { itv_cpu } else { itv };
                cpu_rates(prev, curr, base)
            })
            .collect();

        let disks = disks_ok.then(|| {
            self.store
                .prev
                .disks
                .iter()
                .zip(&self.store.curr.disks)
                .map(|(prev, curr)| disk_rates(prev, curr, itv, self.hz))
                .collect()
        });

        let ifaces = ifaces_ok.then(|| {
            self.store
                .prev
                .ifaces
                .iter()
                .zip(&self.store.curr.ifaces)
                .map(|(prev, curr)| net_rates(prev, curr, itv, self.hz))
                .collect()
        });

        let report = CycleReport {
            timestamp: Utc::now().timestamp(),
            loadavg,
            cpu,
            memory: self.store.curr.memory.clone(),
            disks,
            ifaces,
        };

        self.store.rotate();
        report
    }

    /// Carries probed speed/duplex onto this cycle's interface snapshots,
    /// probing each interface once on first sight. A failed probe is cached
    /// too, leaving the unknown sentinels in place without re-probing every
    /// cycle.
    fn apply_link_settings(&mut self, ifaces: &mut [crate::stats::model::InterfaceSnapshot]) {
        for iface in ifaces {
            let settings = self.links.entry(iface.name.clone()).or_insert_with(|| {
                self.source
                    .probe_link(&iface.name)
                    .unwrap_or((SPEED_UNKNOWN, DUPLEX_UNKNOWN))
            });
            iface.speed = settings.0;
            iface.duplex = settings.1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fs::FileSystem;
    use crate::source::local::LocalSource;
    use crate::source::mock::MockFs;
    use crate::source::{CpuReading, SourceError};
    use crate::stats::model::{
        BlockDeviceSnapshot, CpuSnapshot, DUPLEX_FULL, InterfaceSnapshot,
    };

    /// Scripted source for multi-cycle tests.
    #[derive(Default)]
    struct FakeSource {
        cpu: CpuReading,
        memory: MemorySnapshot,
        disks: Option<Vec<BlockDeviceSnapshot>>,
        ifaces: Option<Vec<InterfaceSnapshot>>,
        uptime: Option<u64>,
        links: HashMap<String, (i64, u8)>,
        probe_calls: usize,
        uptime_calls: usize,
    }

    impl FakeSource {
        fn with_counts(n_cpus: usize, n_disks: usize, n_ifaces: usize) -> Self {
            Self {
                cpu: CpuReading {
                    cpus: vec![CpuSnapshot::default(); n_cpus],
                    ..Default::default()
                },
                disks: Some(vec![BlockDeviceSnapshot::default(); n_disks]),
                ifaces: Some(vec![InterfaceSnapshot::default(); n_ifaces]),
                ..Default::default()
            }
        }
    }

    impl StatsSource for FakeSource {
        fn tick_frequency(&mut self) -> u32 {
            100
        }
        fn count_cpus(&mut self) -> usize {
            self.cpu.cpus.len()
        }
        fn count_devices(&mut self, kind: DeviceKind) -> usize {
            match kind {
                DeviceKind::BlockDevice => self.disks.as_ref().map_or(0, Vec::len),
                DeviceKind::NetworkInterface => self.ifaces.as_ref().map_or(0, Vec::len),
            }
        }
        fn read_uptime(&mut self, _hz: u32) -> Option<u64> {
            self.uptime_calls += 1;
            self.uptime
        }
        fn read_loadavg(&mut self) -> LoadAvg {
            LoadAvg::default()
        }
        fn read_cpu(&mut self, _n_cpus: usize) -> CpuReading {
            self.cpu.clone()
        }
        fn read_memory(&mut self) -> MemorySnapshot {
            self.memory.clone()
        }
        fn read_disks(&mut self, _n: usize) -> Result<Vec<BlockDeviceSnapshot>, SourceError> {
            self.disks
                .clone()
                .ok_or_else(|| SourceError::Unavailable("scripted failure".to_string()))
        }
        fn read_netdev(&mut self, _n: usize) -> Result<Vec<InterfaceSnapshot>, SourceError> {
            self.ifaces
                .clone()
                .ok_or_else(|| SourceError::Unavailable("scripted failure".to_string()))
        }
        fn probe_link(&mut self, ifname: &str) -> Option<(i64, u8)> {
            self.probe_calls += 1;
            self.links.get(ifname).copied()
        }
    }

    #[test]
    fn full_cycle_over_mock_proc() {
        let source = LocalSource::new(MockFs::typical_system(), "/proc");
        let mut poller = Poller::new(source);

        let report = poller.cycle();
        assert_eq!(report.cpu.len(), 3);
        assert_eq!(report.disks.as_ref().unwrap().len(), 1);
        assert_eq!(report.ifaces.as_ref().unwrap().len(), 2);
        assert!(report.memory.mem_total > 0);
        assert!(report.timestamp > 0);
    }

    #[test]
    fn rates_across_two_cycles() {
        let mut source = FakeSource::with_counts(1, 0, 0);
        source.uptime = Some(10_000);
        source.cpu.cpus[0] = CpuSnapshot {
            user: 100,
            system: 50,
            idle: 800,
            ..Default::default()
        };
        source.cpu.uptime = 950;

        let mut poller = Poller::new(source);
        // First cycle: rates since startup.
        let first = poller.cycle();
        assert!(first.cpu[0].user > 0.0);

        let source = poller.source_mut();
        source.cpu.cpus[0] = CpuSnapshot {
            user: 150,
            system: 60,
            idle: 1040,
            ..Default::default()
        };
        source.cpu.uptime = 1250; // +300 ticks
        source.uptime = Some(10_300);

        let report = poller.cycle();
        assert!((report.cpu[0].user - 50.0 / 3.0).abs() < 1e-6);
        assert!((report.cpu[0].sys - 10.0 / 3.0).abs() < 1e-6);
        assert!((report.cpu[0].idle - 80.0).abs() < 1e-6);
    }

    #[test]
    fn per_cpu_slots_use_the_single_cpu_interval() {
        // Two CPUs: the aggregate tick sum grows twice as fast as either
        // CPU's own ticks.
        let mut source = FakeSource::with_counts(3, 0, 0);
        source.uptime = Some(1_000);
        source.cpu.uptime = 2_000;

        let mut poller = Poller::new(source);
        poller.cycle();

        // cpu0 spends the whole next interval (100 ticks) in user mode,
        // cpu1 stays idle.
        let source = poller.source_mut();
        source.uptime = Some(1_100);
        source.cpu.uptime = 2_200;
        source.cpu.cpus[0].user = 100;
        source.cpu.cpus[1].user = 100;
        source.cpu.cpus[2].idle = 100;

        let report = poller.cycle();
        // A fully busy core is 100%, not 100/N.
        assert!((report.cpu[1].user - 100.0).abs() < 1e-6);
        assert!((report.cpu[2].idle - 100.0).abs() < 1e-6);
        // The aggregate slot keeps the aggregate base: one of two CPUs
        // busy is 50%.
        assert!((report.cpu[0].user - 50.0).abs() < 1e-6);
    }

    #[test]
    fn unavailable_family_reports_none_and_recovers_cleanly() {
        let mut source = FakeSource::with_counts(1, 1, 0);
        source.uptime = Some(1_000);
        source.disks.as_mut().unwrap()[0] = BlockDeviceSnapshot {
            name: "sda".to_string(),
            r_completed: 100,
            ..Default::default()
        };

        let mut poller = Poller::new(source);
        assert!(poller.cycle().disks.is_some());

        // Acquisition failure: the family reports None.
        poller.source_mut().disks = None;
        poller.source_mut().uptime = Some(1_100);
        let report = poller.cycle();
        assert!(report.disks.is_none());
        assert!(report.ifaces.is_some());

        // Recovery diffs against the last good counters, not zeroes.
        poller.source_mut().disks = Some(vec![BlockDeviceSnapshot {
            name: "sda".to_string(),
            r_completed: 200,
            ..Default::default()
        }]);
        poller.source_mut().uptime = Some(1_200);
        let report = poller.cycle();
        let disks = report.disks.unwrap();
        // 100 completions over the last 100 ticks at hz=100 is 100/s.
        assert!((disks[0].r_s - 100.0).abs() < 1e-6);
    }

    #[test]
    fn links_probed_once_per_interface() {
        let mut source = FakeSource::with_counts(1, 0, 2);
        source.uptime = Some(1_000);
        source.ifaces.as_mut().unwrap()[0].name = "eth0".to_string();
        source.ifaces.as_mut().unwrap()[1].name = "eth1".to_string();
        source
            .links
            .insert("eth0".to_string(), (1_000_000_000, DUPLEX_FULL));

        let mut poller = Poller::new(source);
        poller.cycle();
        assert_eq!(poller.source_mut().probe_calls, 2);

        // Cached for both the probed and the failed interface.
        poller.cycle();
        assert_eq!(poller.source_mut().probe_calls, 2);
        assert_eq!(
            poller.links.get("eth0").copied(),
            Some((1_000_000_000, DUPLEX_FULL))
        );
        assert_eq!(
            poller.links.get("eth1").copied(),
            Some((SPEED_UNKNOWN, DUPLEX_UNKNOWN))
        );

        poller.reprobe_links();
        poller.cycle();
        assert_eq!(poller.source_mut().probe_calls, 4);
    }

    #[test]
    fn uptime_fallback_is_decided_once() {
        let mut source = FakeSource::with_counts(2, 0, 0);
        source.uptime = None;
        source.cpu.cpu0_uptime = Some(500);

        let mut poller = Poller::new(source);
        poller.cycle();
        assert_eq!(poller.source_mut().uptime_calls, 1);

        // Even if the dedicated source appears later, the session sticks
        // with the cpu0 base.
        poller.source_mut().uptime = Some(9_999);
        poller.source_mut().cpu.cpu0_uptime = Some(600);
        poller.cycle();
        assert_eq!(poller.source_mut().uptime_calls, 1);
        assert_eq!(poller.store.prev.uptime, 600);
    }

    #[test]
    fn re_enumerate_reallocates_wholesale() {
        let mut source = FakeSource::with_counts(1, 1, 1);
        source.uptime = Some(1_000);
        let mut poller = Poller::new(source);
        poller.cycle();

        poller.source_mut().disks = Some(vec![BlockDeviceSnapshot::default(); 3]);
        poller.re_enumerate();
        assert_eq!(poller.store.curr.disks.len(), 3);
        assert_eq!(poller.store.prev.disks.len(), 3);
        // Freshly zeroed, no stale counters survive reallocation.
        assert_eq!(poller.store.prev.disks[0], BlockDeviceSnapshot::default());
    }

    #[test]
    fn empty_device_files_produce_empty_families() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/stat", "cpu  1 2 3 4 5 6 7 8 0 0\n");
        fs.add_file("/proc/diskstats", "");
        fs.add_file("/proc/net/dev", "h1\nh2\n");
        assert!(fs.exists(std::path::Path::new("/proc/stat")));

        let mut poller = Poller::new(LocalSource::new(fs, "/proc"));
        let report = poller.cycle();
        assert_eq!(report.disks.as_ref().unwrap().len(), 0);
        assert_eq!(report.ifaces.as_ref().unwrap().len(), 0);
    }
}
