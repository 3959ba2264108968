//! Parsers for the kernel pseudo-files.
//!
//! Pure functions from file content to snapshot structs, testable with
//! literal string samples. Failure policy follows the acquisition contract:
//! CPU and memory parsers tolerate malformed lines (missing counters stay
//! zero), loadavg and uptime report a [`ParseError`] the caller downgrades.

use crate::source::CpuReading;
use crate::stats::model::{BlockDeviceSnapshot, CpuSnapshot, InterfaceSnapshot, LoadAvg, MemorySnapshot};

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parses `/proc/loadavg`: "0.01 0.05 0.10 1/234 5678".
pub fn parse_loadavg(content: &str) -> Result<LoadAvg, ParseError> {
    let mut fields = content.split_whitespace();
    let mut next = |name: &str| -> Result<f64, ParseError> {
        fields
            .next()
            .ok_or_else(|| ParseError::new(format!("missing {} in loadavg", name)))?
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {} in loadavg", name)))
    };
    Ok(LoadAvg {
        min1: next("min1")?,
        min5: next("min5")?,
        min15: next("min15")?,
    })
}

/// Parses `/proc/uptime` ("12345.67 23456.78") into clock ticks.
pub fn parse_uptime(content: &str, hz: u32) -> Result<u64, ParseError> {
    let first = content
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::new("empty uptime"))?;
    let (sec, cent) = match first.split_once('.') {
        Some((sec, cent)) => (sec, cent),
        None => (first, "0"),
    };
    let sec: u64 = sec
        .parse()
        .map_err(|_| ParseError::new("invalid uptime seconds"))?;
    // Only the first two fractional digits are significant.
    let cent: u64 = cent
        .get(..2)
        .unwrap_or(cent)
        .parse()
        .map_err(|_| ParseError::new("invalid uptime fraction"))?;
    Ok(sec * hz as u64 + cent * hz as u64 / 100)
}

fn parse_ticks(fields: &[&str]) -> CpuSnapshot {
    let tick = |idx: usize| -> u64 {
        fields
            .get(idx)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };
    CpuSnapshot {
        user: tick(0),
        nice: tick(1),
        system: tick(2),
        idle: tick(3),
        iowait: tick(4),
        hardirq: tick(5),
        softirq: tick(6),
        steal: tick(7),
        guest: tick(8),
        guest_nice: tick(9),
    }
}

/// Parses the `cpu*` lines of `/proc/stat` into `n_cpus` slots.
///
/// The aggregate line always fills slot 0; per-CPU lines map their numeric
/// suffix to slot index+1, indices at or beyond `n_cpus - 1` are ignored
/// (protects against a device-count race). Missing lines leave slots zeroed.
pub fn parse_stat(content: &str, n_cpus: usize) -> CpuReading {
    let mut reading = CpuReading {
        cpus: vec![CpuSnapshot::default(); n_cpus],
        ..Default::default()
    };

    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let Some(label) = fields.next() else {
            continue;
        };
        if label == "cpu" {
            let ticks = parse_ticks(&fields.collect::<Vec<_>>());
            reading.uptime = ticks.total_ticks();
            if !reading.cpus.is_empty() {
                reading.cpus[0] = ticks;
            }
        } else if let Some(suffix) = label.strip_prefix("cpu") {
            let Ok(proc_nb) = suffix.parse::<usize>() else {
                continue;
            };
            let ticks = parse_ticks(&fields.collect::<Vec<_>>());
            if proc_nb == 0 && reading.cpu0_uptime.is_none() {
                reading.cpu0_uptime = Some(ticks.uptime_ticks());
            }
            if n_cpus > 1 && proc_nb < n_cpus - 1 {
                reading.cpus[proc_nb + 1] = ticks;
            }
        }
    }

    reading
}

/// The nine `/proc/meminfo` keys the memory snapshot samples.
pub const MEMINFO_KEYS: [&str; 9] = [
    "Buffers:",
    "Cached:",
    "Dirty:",
    "MemFree:",
    "MemTotal:",
    "Slab:",
    "SwapFree:",
    "SwapTotal:",
    "Writeback:",
];

/// Parses `/proc/meminfo`, matching the nine keys by name.
///
/// Key order in the file is not guaranteed. Values stay in kibibytes as
/// reported; derived fields are filled before returning.
pub fn parse_meminfo(content: &str) -> MemorySnapshot {
    let mut mem = MemorySnapshot::default();

    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let Some(key) = fields.next() else {
            continue;
        };
        let Some(value) = fields.next().and_then(|s| s.parse::<u64>().ok()) else {
            continue;
        };
        match key {
            "MemTotal:" => mem.mem_total = value,
            "MemFree:" => mem.mem_free = value,
            "SwapTotal:" => mem.swap_total = value,
            "SwapFree:" => mem.swap_free = value,
            "Cached:" => mem.cached = value,
            "Dirty:" => mem.dirty = value,
            "Writeback:" => mem.writeback = value,
            "Buffers:" => mem.buffers = value,
            "Slab:" => mem.slab = value,
            _ => {}
        }
    }

    mem.derive_used();
    mem
}

/// Parses up to `n` fixed-format lines of `/proc/diskstats`.
///
/// Lines with fewer than the 14 expected fields are skipped.
pub fn parse_diskstats(content: &str, n: usize) -> Vec<BlockDeviceSnapshot> {
    let mut disks = Vec::with_capacity(n);

    for line in content.lines() {
        if disks.len() >= n {
            break;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 14 {
            continue;
        }
        let num = |idx: usize| -> u64 { fields[idx].parse().unwrap_or(0) };
        disks.push(BlockDeviceSnapshot {
            major: fields[0].parse().unwrap_or(0),
            minor: fields[1].parse().unwrap_or(0),
            name: fields[2].to_string(),
            r_completed: num(3),
            r_merged: num(4),
            r_sectors: num(5),
            r_spent: num(6),
            w_completed: num(7),
            w_merged: num(8),
            w_sectors: num(9),
            w_spent: num(10),
            io_in_progress: num(11),
            t_spent: num(12),
            t_weighted: num(13),
        });
    }

    disks
}

/// Parses up to `n` interface lines of `/proc/net/dev`.
///
/// The fixed 2-line header is skipped. The saturation composite sums
/// rx errs, rx drop, tx drop, tx fifo, tx colls and tx carrier — a policy
/// value, not a kernel counter.
pub fn parse_net_dev(content: &str, n: usize) -> Vec<InterfaceSnapshot> {
    let mut ifaces = Vec::with_capacity(n);

    for line in content.lines().skip(2) {
        if ifaces.len() >= n {
            break;
        }
        // "  eth0: 1234 5 ..." — the colon may butt against the first value.
        let Some((name, counters)) = line.split_once(':') else {
            continue;
        };
        let lu: Vec<u64> = counters
            .split_whitespace()
            .map(|s| s.parse().unwrap_or(0))
            .collect();
        if lu.len() < 16 {
            continue;
        }
        ifaces.push(InterfaceSnapshot {
            name: name.trim().to_string(),
            rbytes: lu[0],
            rpackets: lu[1],
            wbytes: lu[8],
            wpackets: lu[9],
            ierr: lu[2],
            oerr: lu[10],
            coll: lu[13],
            sat: lu[2] + lu[3] + lu[11] + lu[12] + lu[13] + lu[14],
            ..Default::default()
        });
    }

    ifaces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::model::{DUPLEX_UNKNOWN, SPEED_UNKNOWN};

    const STAT_SAMPLE: &str = "\
cpu  100 10 50 800 30 5 15 2 0 0
cpu0 60 6 30 400 20 3 10 1 0 0
cpu1 40 4 20 400 10 2 5 1 0 0
intr 123456 0 0
ctxt 7890
btime 1700000000
";

    const MEMINFO_SAMPLE: &str = "\
MemTotal:       16384000 kB
MemFree:         4096000 kB
MemAvailable:    9000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
Dirty:              1200 kB
Writeback:             0 kB
Slab:             256000 kB
SwapTotal:       8192000 kB
SwapFree:        8000000 kB
";

    const DISKSTATS_SAMPLE: &str = "\
   8       0 sda 61132 13352 1221632 30528 116426 158518 7798176 119056 0 70476 149256
   8       1 sda1 500 10 4000 200 300 20 2400 150 0 320 350
";

    const NETDEV_SAMPLE: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1000000    5000    0    0    0     0          0         0  1000000    5000    0    0    0     0       0          0
  eth0: 9000000   60000    1    2    0     0          0         0  4000000   30000    3    4    5     6       7          0
";

    #[test]
    fn loadavg_parses_three_values() {
        let la = parse_loadavg("0.21 0.45 0.60 2/834 12345\n").unwrap();
        assert!((la.min1 - 0.21).abs() < 1e-9);
        assert!((la.min5 - 0.45).abs() < 1e-9);
        assert!((la.min15 - 0.60).abs() < 1e-9);
    }

    #[test]
    fn loadavg_rejects_garbage() {
        assert!(parse_loadavg("").is_err());
        assert!(parse_loadavg("a b c").is_err());
    }

    #[test]
    fn uptime_converts_to_ticks() {
        // 350.75 s at hz=100 is 35075 ticks.
        assert_eq!(parse_uptime("350.75 1200.00\n", 100).unwrap(), 35075);
        assert_eq!(
            parse_uptime("350.75\n", 250).unwrap(),
            350 * 250 + 75 * 250 / 100
        );
        assert!(parse_uptime("", 100).is_err());
    }

    #[test]
    fn stat_fills_aggregate_and_per_cpu_slots() {
        let reading = parse_stat(STAT_SAMPLE, 3);
        assert_eq!(reading.cpus[0].user, 100);
        assert_eq!(reading.cpus[0].idle, 800);
        assert_eq!(reading.cpus[1].user, 60);
        assert_eq!(reading.cpus[2].user, 40);
        // Aggregate tick sum over all ten buckets.
        assert_eq!(reading.uptime, 100 + 10 + 50 + 800 + 30 + 5 + 15 + 2);
        // cpu0's non-guest sum.
        assert_eq!(
            reading.cpu0_uptime,
            Some(60 + 6 + 30 + 400 + 20 + 3 + 10 + 1)
        );
    }

    #[test]
    fn stat_ignores_out_of_range_cpu_indices() {
        // Sized for aggregate + 1 CPU only; cpu1 must be dropped.
        let reading = parse_stat(STAT_SAMPLE, 2);
        assert_eq!(reading.cpus.len(), 2);
        assert_eq!(reading.cpus[1].user, 60);
    }

    #[test]
    fn meminfo_matches_keys_by_name() {
        let mem = parse_meminfo(MEMINFO_SAMPLE);
        assert_eq!(mem.mem_total, 16384000);
        assert_eq!(mem.mem_free, 4096000);
        assert_eq!(mem.cached, 2048000);
        assert_eq!(mem.buffers, 512000);
        assert_eq!(mem.slab, 256000);
        assert_eq!(mem.dirty, 1200);
        assert_eq!(mem.writeback, 0);
        assert_eq!(mem.swap_total, 8192000);
        assert_eq!(mem.swap_free, 8000000);
        assert_eq!(
            mem.mem_used,
            16384000 - 4096000 - 2048000 - 512000 - 256000
        );
        assert_eq!(mem.swap_used, 192000);
    }

    #[test]
    fn meminfo_tolerates_shuffled_and_missing_keys() {
        let mem = parse_meminfo("SwapFree: 10 kB\nMemTotal: 100 kB\n");
        assert_eq!(mem.mem_total, 100);
        assert_eq!(mem.swap_free, 10);
        assert_eq!(mem.cached, 0);
    }

    #[test]
    fn diskstats_parses_all_fourteen_fields() {
        let disks = parse_diskstats(DISKSTATS_SAMPLE, 64);
        assert_eq!(disks.len(), 2);
        let sda = &disks[0];
        assert_eq!(sda.major, 8);
        assert_eq!(sda.minor, 0);
        assert_eq!(sda.name, "sda");
        assert_eq!(sda.r_completed, 61132);
        assert_eq!(sda.r_merged, 13352);
        assert_eq!(sda.r_sectors, 1221632);
        assert_eq!(sda.r_spent, 30528);
        assert_eq!(sda.w_completed, 116426);
        assert_eq!(sda.w_merged, 158518);
        assert_eq!(sda.w_sectors, 7798176);
        assert_eq!(sda.w_spent, 119056);
        assert_eq!(sda.io_in_progress, 0);
        assert_eq!(sda.t_spent, 70476);
        assert_eq!(sda.t_weighted, 149256);
    }

    #[test]
    fn diskstats_respects_device_limit() {
        let disks = parse_diskstats(DISKSTATS_SAMPLE, 1);
        assert_eq!(disks.len(), 1);
        assert_eq!(disks[0].name, "sda");
    }

    #[test]
    fn net_dev_skips_header_and_sums_saturation() {
        let ifaces = parse_net_dev(NETDEV_SAMPLE, 64);
        assert_eq!(ifaces.len(), 2);

        let eth0 = &ifaces[1];
        assert_eq!(eth0.name, "eth0");
        assert_eq!(eth0.rbytes, 9_000_000);
        assert_eq!(eth0.rpackets, 60_000);
        assert_eq!(eth0.wbytes, 4_000_000);
        assert_eq!(eth0.wpackets, 30_000);
        assert_eq!(eth0.ierr, 1);
        assert_eq!(eth0.oerr, 3);
        assert_eq!(eth0.coll, 6);
        // rx errs + rx drop + tx drop + tx fifo + tx colls + tx carrier.
        assert_eq!(eth0.sat, 1 + 2 + 4 + 5 + 6 + 7);
        // Link settings stay unknown until probed.
        assert_eq!(eth0.speed, SPEED_UNKNOWN);
        assert_eq!(eth0.duplex, DUPLEX_UNKNOWN);
    }

    #[test]
    fn net_dev_handles_glued_counters() {
        let content = "h1\nh2\neth0:123 1 0 0 0 0 0 0 456 2 0 0 0 0 0 0\n";
        let ifaces = parse_net_dev(content, 64);
        assert_eq!(ifaces.len(), 1);
        assert_eq!(ifaces[0].name, "eth0");
        assert_eq!(ifaces[0].rbytes, 123);
        assert_eq!(ifaces[0].wbytes, 456);
    }
}
