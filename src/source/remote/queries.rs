//! Statement catalog for the companion schema.
//!
//! The remote server exposes kernel counters through views and functions in
//! the `pgsysmon` schema. Column positions in the decoded results are a
//! protocol contract with that schema, keyed to the server's release epoch:
//! the statement texts and their expected column layouts are fixed here,
//! resolved once at connection time and never re-inferred from hot-path
//! query failures.

/// Server release epochs with distinct companion-schema shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEpoch {
    /// Before 9.6: no clock-ticks helper, narrower 8-column CPU view
    /// (no guest/guest_nice).
    Pre96,
    /// 9.6.
    V96,
    /// 10 and later.
    V10Plus,
}

impl ServerEpoch {
    /// Resolves the epoch from `SHOW server_version_num`.
    pub fn from_version_num(version_num: i32) -> Self {
        if version_num < 90600 {
            ServerEpoch::Pre96
        } else if version_num < 100000 {
            ServerEpoch::V96
        } else {
            ServerEpoch::V10Plus
        }
    }

    /// Fixed statement set for this epoch.
    pub fn catalog(self) -> &'static StatementCatalog {
        match self {
            ServerEpoch::Pre96 => &CATALOG_PRE96,
            ServerEpoch::V96 => &CATALOG_V96,
            ServerEpoch::V10Plus => &CATALOG_V10PLUS,
        }
    }
}

/// Statement texts and expected column counts for one schema epoch.
#[derive(Debug)]
pub struct StatementCatalog {
    /// Clock-ticks helper; `None` on epochs whose schema lacks it.
    pub clock_ticks: Option<&'static str>,
    pub loadavg: &'static str,
    pub uptime: &'static str,
    /// Aggregate CPU row: label at column 0, ticks from column 1.
    pub cpu_total: &'static str,
    /// Per-CPU rows: index at column 0, label at 1, ticks from column 2.
    pub cpu_part: &'static str,
    /// Nine rows sorted by key name, fixed positions 0..8.
    pub meminfo: &'static str,
    pub disk_count: &'static str,
    /// Rows ordered by (major, minor), columns 0..13 positional.
    pub diskstats: &'static str,
    pub netdev_count: &'static str,
    /// Rows in interface-name order; trimmed name at column 0, counters
    /// from column 2.
    pub netdev: &'static str,
    /// Function call; the interface name is appended as its argument.
    pub link_settings: &'static str,
    /// Tick columns the CPU views expose; missing trailing ones decode as 0.
    pub cpu_columns: usize,
}

const LOADAVG: &str = "SELECT min1, min5, min15 FROM pgsysmon.sys_proc_loadavg";
const UPTIME: &str = "SELECT seconds_total FROM pgsysmon.sys_proc_uptime";
const CPU_TOTAL: &str = "SELECT * FROM pgsysmon.sys_proc_stat WHERE cpu = 'cpu'";
const CPU_PART: &str = "SELECT right(cpu,-3),* FROM pgsysmon.sys_proc_stat \
     WHERE cpu ~ 'cpu[0-9]+' ORDER BY right(cpu,-3)::int";
const MEMINFO: &str = "SELECT metric, metric_value FROM pgsysmon.sys_proc_meminfo \
     WHERE metric IN ('MemTotal:','MemFree:','SwapTotal:','SwapFree:',\
     'Cached:','Dirty:','Writeback:','Buffers:','Slab:') ORDER BY 1";
const DISK_COUNT: &str = "SELECT count(1) FROM pgsysmon.sys_proc_diskstats";
const DISKSTATS: &str = "SELECT * FROM pgsysmon.sys_proc_diskstats ORDER BY (maj,min)";
const NETDEV_COUNT: &str = "SELECT count(1) FROM pgsysmon.sys_proc_netdev";
const NETDEV: &str = "SELECT left(iface,-1),* FROM pgsysmon.sys_proc_netdev ORDER BY iface";
const CLOCK_TICKS: &str = "SELECT pgsysmon.get_sys_clk_ticks()";
const LINK_SETTINGS: &str = "SELECT * FROM pgsysmon.get_netdev_link_settings";

static CATALOG_PRE96: StatementCatalog = StatementCatalog {
    clock_ticks: None,
    loadavg: LOADAVG,
    uptime: UPTIME,
    cpu_total: CPU_TOTAL,
    cpu_part: CPU_PART,
    meminfo: MEMINFO,
    disk_count: DISK_COUNT,
    diskstats: DISKSTATS,
    netdev_count: NETDEV_COUNT,
    netdev: NETDEV,
    link_settings: LINK_SETTINGS,
    cpu_columns: 8,
};

static CATALOG_V96: StatementCatalog = StatementCatalog {
    clock_ticks: Some(CLOCK_TICKS),
    loadavg: LOADAVG,
    uptime: UPTIME,
    cpu_total: CPU_TOTAL,
    cpu_part: CPU_PART,
    meminfo: MEMINFO,
    disk_count: DISK_COUNT,
    diskstats: DISKSTATS,
    netdev_count: NETDEV_COUNT,
    netdev: NETDEV,
    link_settings: LINK_SETTINGS,
    cpu_columns: 10,
};

static CATALOG_V10PLUS: StatementCatalog = StatementCatalog {
    clock_ticks: Some(CLOCK_TICKS),
    loadavg: LOADAVG,
    uptime: UPTIME,
    cpu_total: CPU_TOTAL,
    cpu_part: CPU_PART,
    meminfo: MEMINFO,
    disk_count: DISK_COUNT,
    diskstats: DISKSTATS,
    netdev_count: NETDEV_COUNT,
    netdev: NETDEV,
    link_settings: LINK_SETTINGS,
    cpu_columns: 10,
};
