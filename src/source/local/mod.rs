//! Local source: kernel pseudo-files under a configurable `/proc` root.

#[cfg(target_os = "linux")]
mod ethtool;
pub mod parser;

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::source::fs::FileSystem;
use crate::source::{CpuReading, DEFAULT_HZ, DeviceKind, SourceError, StatsSource};
use crate::stats::model::{BlockDeviceSnapshot, InterfaceSnapshot, LoadAvg, MemorySnapshot};

/// Reads counters from the local kernel through a [`FileSystem`].
///
/// `proc_path` defaults to `/proc` and is overridable for tests and
/// containers.
pub struct LocalSource<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> LocalSource<F> {
    pub fn new(fs: F, proc_path: &str) -> Self {
        Self {
            fs,
            proc_path: proc_path.trim_end_matches('/').to_string(),
        }
    }

    fn path(&self, file: &str) -> PathBuf {
        PathBuf::from(format!("{}/{}", self.proc_path, file))
    }

    fn read(&self, file: &str) -> Option<String> {
        match self.fs.read_to_string(&self.path(file)) {
            Ok(content) => Some(content),
            Err(e) => {
                debug!("can't read {}/{}: {}", self.proc_path, file, e);
                None
            }
        }
    }
}

impl<F: FileSystem> StatsSource for LocalSource<F> {
    fn tick_frequency(&mut self) -> u32 {
        // SAFETY: sysconf is always safe to call; -1 signals failure.
        let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if ticks <= 0 {
            warn!("sysconf(_SC_CLK_TCK) failed, assuming {} Hz", DEFAULT_HZ);
            return DEFAULT_HZ;
        }
        ticks as u32
    }

    fn count_cpus(&mut self) -> usize {
        let Some(content) = self.read("stat") else {
            return 0;
        };
        content
            .lines()
            .filter(|line| line.starts_with("cpu"))
            .count()
    }

    fn count_devices(&mut self, kind: DeviceKind) -> usize {
        let (file, header_lines) = match kind {
            DeviceKind::BlockDevice => ("diskstats", 0),
            DeviceKind::NetworkInterface => ("net/dev", 2),
        };
        let Some(content) = self.read(file) else {
            return 0;
        };
        let lines = content.bytes().filter(|&b| b == b'\n').count();
        lines.saturating_sub(header_lines)
    }

    fn read_uptime(&mut self, hz: u32) -> Option<u64> {
        let content = self.read("uptime")?;
        match parser::parse_uptime(&content, hz) {
            Ok(ticks) => Some(ticks),
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }

    fn read_loadavg(&mut self) -> LoadAvg {
        let Some(content) = self.read("loadavg") else {
            return LoadAvg::default();
        };
        parser::parse_loadavg(&content).unwrap_or_default()
    }

    fn read_cpu(&mut self, n_cpus: usize) -> CpuReading {
        match self.read("stat") {
            Some(content) => parser::parse_stat(&content, n_cpus),
            // Zeroed snapshot, an explicit "no data" state.
            None => CpuReading {
                cpus: vec![Default::default(); n_cpus],
                ..Default::default()
            },
        }
    }

    fn read_memory(&mut self) -> MemorySnapshot {
        match self.read("meminfo") {
            Some(content) => parser::parse_meminfo(&content),
            None => MemorySnapshot::default(),
        }
    }

    fn read_disks(&mut self, n: usize) -> Result<Vec<BlockDeviceSnapshot>, SourceError> {
        let content = self.read("diskstats").ok_or_else(|| {
            SourceError::Unavailable(format!("can't open {}/diskstats", self.proc_path))
        })?;
        Ok(parser::parse_diskstats(&content, n))
    }

    fn read_netdev(&mut self, n: usize) -> Result<Vec<InterfaceSnapshot>, SourceError> {
        let content = self.read("net/dev").ok_or_else(|| {
            SourceError::Unavailable(format!("can't open {}/net/dev", self.proc_path))
        })?;
        Ok(parser::parse_net_dev(&content, n))
    }

    #[cfg(target_os = "linux")]
    fn probe_link(&mut self, ifname: &str) -> Option<(i64, u8)> {
        ethtool::probe(ifname)
    }

    #[cfg(not(target_os = "linux"))]
    fn probe_link(&mut self, _ifname: &str) -> Option<(i64, u8)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::MockFs;

    #[test]
    fn counts_lines_of_device_files() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/diskstats", "8 0 sda ...\n8 1 sda1 ...\n");
        fs.add_file(
            "/proc/net/dev",
            "header1\nheader2\nlo: 0\neth0: 0\neth1: 0\n",
        );
        let mut source = LocalSource::new(fs, "/proc");

        assert_eq!(source.count_devices(DeviceKind::BlockDevice), 2);
        assert_eq!(source.count_devices(DeviceKind::NetworkInterface), 3);
    }

    #[test]
    fn missing_files_count_zero_and_zero_snapshots() {
        let mut source = LocalSource::new(MockFs::new(), "/proc");

        assert_eq!(source.count_devices(DeviceKind::BlockDevice), 0);
        assert_eq!(source.count_cpus(), 0);
        assert_eq!(source.read_loadavg(), LoadAvg::default());
        assert_eq!(source.read_memory(), MemorySnapshot::default());
        assert_eq!(source.read_uptime(100), None);

        let reading = source.read_cpu(2);
        assert_eq!(reading.cpus.len(), 2);
        assert_eq!(reading.uptime, 0);

        assert!(source.read_disks(8).is_err());
        assert!(source.read_netdev(8).is_err());
    }

    #[test]
    fn reads_full_mock_system() {
        let mut source = LocalSource::new(MockFs::typical_system(), "/proc");

        let n_cpus = source.count_cpus();
        assert_eq!(n_cpus, 3); // aggregate + 2 CPUs

        let reading = source.read_cpu(n_cpus);
        assert!(reading.uptime > 0);
        assert!(reading.cpu0_uptime.is_some());

        let mem = source.read_memory();
        assert!(mem.mem_total > 0);
        assert_eq!(
            mem.mem_used,
            mem.mem_total - mem.mem_free - mem.cached - mem.buffers - mem.slab
        );

        let n_disks = source.count_devices(DeviceKind::BlockDevice);
        let disks = source.read_disks(n_disks).unwrap();
        assert!(!disks.is_empty());

        let n_ifaces = source.count_devices(DeviceKind::NetworkInterface);
        let ifaces = source.read_netdev(n_ifaces).unwrap();
        assert_eq!(ifaces.len(), 2);

        let uptime = source.read_uptime(100).unwrap();
        assert!(uptime > 0);
    }

    #[test]
    fn proc_path_is_overridable() {
        let mut fs = MockFs::new();
        fs.add_file("/snapshots/proc/loadavg", "1.00 2.00 3.00 1/1 1\n");
        let mut source = LocalSource::new(fs, "/snapshots/proc/");
        let la = source.read_loadavg();
        assert!((la.min1 - 1.0).abs() < 1e-9);
    }
}
