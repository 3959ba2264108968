//! Remote source: companion-schema views over a PostgreSQL connection.
//!
//! Decoding is positional against the statement catalog of the server's
//! epoch (see [`queries`]). Rows arrive as text columns from the
//! [`executor::QueryExecutor`], mirroring the wire protocol's simple mode.

pub mod executor;
pub mod queries;

use tracing::{debug, info, warn};

use crate::source::local::parser;
use crate::source::{CpuReading, DEFAULT_HZ, DeviceKind, SourceError, StatsSource};
use crate::stats::model::{
    BlockDeviceSnapshot, CpuSnapshot, InterfaceSnapshot, LoadAvg, MemorySnapshot,
};
use executor::{QueryError, QueryExecutor, Table};
use queries::{ServerEpoch, StatementCatalog};

/// Reads counters through the `pgsysmon` companion schema.
pub struct RemoteSource<E: QueryExecutor> {
    exec: E,
    epoch: ServerEpoch,
    catalog: &'static StatementCatalog,
}

fn u64_at(table: &Table, row: usize, col: usize) -> u64 {
    table
        .get(row, col)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn f64_at(table: &Table, row: usize, col: usize) -> f64 {
    table
        .get(row, col)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0)
}

/// Decodes one CPU row's tick columns starting at `first_col`.
///
/// Epochs with fewer than ten tick columns leave the trailing buckets at 0.
fn decode_ticks(table: &Table, row: usize, first_col: usize, n_cols: usize) -> CpuSnapshot {
    let tick = |offset: usize| -> u64 {
        if offset < n_cols {
            u64_at(table, row, first_col + offset)
        } else {
            0
        }
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

impl<E: QueryExecutor> RemoteSource<E> {
    /// Resolves the server epoch once and fixes the statement catalog for
    /// the whole session.
    pub fn new(mut exec: E) -> Result<Self, QueryError> {
        let table = exec.execute("SHOW server_version_num")?;
        let version_num: i32 = table
            .get(0, 0)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| QueryError::Execution("server_version_num not reported".to_string()))?;

        let epoch = ServerEpoch::from_version_num(version_num);
        info!(
            "remote source connected: server_version_num={}, epoch={:?}",
            version_num, epoch
        );

        Ok(Self {
            exec,
            epoch,
            catalog: epoch.catalog(),
        })
    }

    pub fn epoch(&self) -> ServerEpoch {
        self.epoch
    }

    fn count_rows(&mut self, sql: &str) -> usize {
        match self.exec.execute(sql) {
            Ok(table) if !table.is_empty() => u64_at(&table, 0, 0) as usize,
            Ok(_) => 0,
            Err(e) => {
                debug!("{}", e);
                0
            }
        }
    }
}

impl<E: QueryExecutor> StatsSource for RemoteSource<E> {
    fn tick_frequency(&mut self) -> u32 {
        let Some(sql) = self.catalog.clock_ticks else {
            // Schema epoch without the helper function.
            debug!("no clock-ticks helper on this epoch, assuming {} Hz", DEFAULT_HZ);
            return DEFAULT_HZ;
        };
        match self.exec.execute(sql) {
            Ok(table) => table
                .get(0, 0)
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_HZ),
            Err(e) => {
                warn!("can't get clock ticks, assuming {} Hz: {}", DEFAULT_HZ, e);
                DEFAULT_HZ
            }
        }
    }

    fn count_cpus(&mut self) -> usize {
        // Per-CPU row count plus the aggregate slot.
        match self.exec.execute(self.catalog.cpu_part) {
            Ok(table) if !table.is_empty() => table.len() + 1,
            Ok(_) => 0,
            Err(e) => {
                debug!("{}", e);
                0
            }
        }
    }

    fn count_devices(&mut self, kind: DeviceKind) -> usize {
        let sql = match kind {
            DeviceKind::BlockDevice => self.catalog.disk_count,
            DeviceKind::NetworkInterface => self.catalog.netdev_count,
        };
        self.count_rows(sql)
    }

    fn read_uptime(&mut self, hz: u32) -> Option<u64> {
        let table = self.exec.execute(self.catalog.uptime).ok()?;
        let seconds = table.get(0, 0)?;
        parser::parse_uptime(seconds, hz).ok()
    }

    fn read_loadavg(&mut self) -> LoadAvg {
        match self.exec.execute(self.catalog.loadavg) {
            Ok(table) if !table.is_empty() => LoadAvg {
                min1: f64_at(&table, 0, 0),
                min5: f64_at(&table, 0, 1),
                min15: f64_at(&table, 0, 2),
            },
            _ => LoadAvg::default(),
        }
    }

    fn read_cpu(&mut self, n_cpus: usize) -> CpuReading {
        let mut reading = CpuReading {
            cpus: vec![CpuSnapshot::default(); n_cpus],
            ..Default::default()
        };
        let n_cols = self.catalog.cpu_columns;

        match self.exec.execute(self.catalog.cpu_total) {
            Ok(table) if !table.is_empty() => {
                // Label at column 0, ticks from column 1.
                let ticks = decode_ticks(&table, 0, 1, n_cols);
                reading.uptime = ticks.total_ticks();
                if !reading.cpus.is_empty() {
                    reading.cpus[0] = ticks;
                }
            }
            Ok(_) => return reading,
            Err(e) => {
                debug!("{}", e);
                return reading;
            }
        }

        if n_cpus > 1 {
            match self.exec.execute(self.catalog.cpu_part) {
                Ok(table) => {
                    for row in 0..table.len() {
                        let Some(proc_nb) =
                            table.get(row, 0).and_then(|v| v.parse::<usize>().ok())
                        else {
                            continue;
                        };
                        // Index at 0, label at 1, ticks from column 2.
                        let ticks = decode_ticks(&table, row, 2, n_cols);
                        if proc_nb == 0 && reading.cpu0_uptime.is_none() {
                            reading.cpu0_uptime = Some(ticks.uptime_ticks());
                        }
                        if proc_nb < n_cpus - 1 {
                            reading.cpus[proc_nb + 1] = ticks;
                        }
                    }
                }
                Err(e) => debug!("{}", e),
            }
        }

        reading
    }

    fn read_memory(&mut self) -> MemorySnapshot {
        let table = match self.exec.execute(self.catalog.meminfo) {
            Ok(table) if table.len() == parser::MEMINFO_KEYS.len() => table,
            Ok(_) | Err(_) => return MemorySnapshot::default(),
        };

        // The statement sorts by key name, fixing row positions. The key at
        // each position is still verified before assignment.
        for (row, key) in parser::MEMINFO_KEYS.iter().enumerate() {
            if table.get(row, 0) != Some(key) {
                warn!("unexpected meminfo row {} from companion schema", row);
                return MemorySnapshot::default();
            }
        }

        let mut mem = MemorySnapshot {
            buffers: u64_at(&table, 0, 1),
            cached: u64_at(&table, 1, 1),
            dirty: u64_at(&table, 2, 1),
            mem_free: u64_at(&table, 3, 1),
            mem_total: u64_at(&table, 4, 1),
            slab: u64_at(&table, 5, 1),
            swap_free: u64_at(&table, 6, 1),
            swap_total: u64_at(&table, 7, 1),
            writeback: u64_at(&table, 8, 1),
            ..Default::default()
        };
        mem.derive_used();
        mem
    }

    fn read_disks(&mut self, n: usize) -> Result<Vec<BlockDeviceSnapshot>, SourceError> {
        let table = self
            .exec
            .execute(self.catalog.diskstats)
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        if table.is_empty() {
            return Err(SourceError::Unavailable(
                "empty diskstats result".to_string(),
            ));
        }

        let mut disks = Vec::with_capacity(n);
        for row in 0..table.len().min(n) {
            disks.push(BlockDeviceSnapshot {
                major: u64_at(&table, row, 0) as u32,
                minor: u64_at(&table, row, 1) as u32,
                name: table.get(row, 2).unwrap_or_default().to_string(),
                r_completed: u64_at(&table, row, 3),
                r_merged: u64_at(&table, row, 4),
                r_sectors: u64_at(&table, row, 5),
                r_spent: u64_at(&table, row, 6),
                w_completed: u64_at(&table, row, 7),
                w_merged: u64_at(&table, row, 8),
                w_sectors: u64_at(&table, row, 9),
                w_spent: u64_at(&table, row, 10),
                io_in_progress: u64_at(&table, row, 11),
                t_spent: u64_at(&table, row, 12),
                t_weighted: u64_at(&table, row, 13),
            });
        }
        Ok(disks)
    }

    fn read_netdev(&mut self, n: usize) -> Result<Vec<InterfaceSnapshot>, SourceError> {
        let table = self
            .exec
            .execute(self.catalog.netdev)
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        if table.is_empty() {
            return Err(SourceError::Unavailable("empty netdev result".to_string()));
        }

        let mut ifaces = Vec::with_capacity(n);
        for row in 0..table.len().min(n) {
            ifaces.push(InterfaceSnapshot {
                name: table.get(row, 0).unwrap_or_default().to_string(),
                rbytes: u64_at(&table, row, 2),
                rpackets: u64_at(&table, row, 3),
                wbytes: u64_at(&table, row, 10),
                wpackets: u64_at(&table, row, 11),
                ierr: u64_at(&table, row, 4),
                oerr: u64_at(&table, row, 12),
                coll: u64_at(&table, row, 15),
                sat: u64_at(&table, row, 4)
                    + u64_at(&table, row, 5)
                    + u64_at(&table, row, 13)
                    + u64_at(&table, row, 14)
                    + u64_at(&table, row, 15)
                    + u64_at(&table, row, 16),
                ..Default::default()
            });
        }
        Ok(ifaces)
    }

    fn probe_link(&mut self, ifname: &str) -> Option<(i64, u8)> {
        // The name came from the kernel, but it travels into a statement.
        if ifname.is_empty() || ifname.contains('\'') {
            return None;
        }
        let sql = format!("{}('{}')", self.catalog.link_settings, ifname);
        let table = self.exec.execute(&sql).ok()?;
        if table.is_empty() {
            return None;
        }
        let speed_mbit: i64 = table.get(0, 1)?.parse().ok()?;
        let duplex: u8 = table.get(0, 2)?.parse().ok()?;
        Some((speed_mbit * 1_000_000, duplex))
    }
}
