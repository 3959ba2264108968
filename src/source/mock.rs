//! In-memory test doubles for both sources.
//!
//! `MockFs` simulates the pseudo-files the local source reads, so tests run
//! without Linux and the binary stays usable on other platforms.
//! `ScriptedExecutor` answers remote statements from canned tables.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::source::fs::FileSystem;
use crate::source::remote::executor::{QueryError, QueryExecutor, Table};

/// In-memory filesystem for testing the local source.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    files: HashMap<PathBuf, String>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.files.insert(path.as_ref().to_path_buf(), content.into());
    }

    /// A small plausible system: two CPUs, one disk, loopback plus one NIC.
    pub fn typical_system() -> Self {
        let mut fs = Self::new();
        fs.add_file(
            "/proc/stat",
            "cpu  10000 200 3000 86000 500 100 150 50 0 0\n\
             cpu0 5000 100 1500 43000 250 50 75 25 0 0\n\
             cpu1 5000 100 1500 43000 250 50 75 25 0 0\n\
             intr 1234567\n\
             ctxt 7654321\n\
             btime 1700000000\n",
        );
        fs.add_file("/proc/uptime", "1000.00 1900.00\n");
        fs.add_file("/proc/loadavg", "0.42 0.35 0.30 2/512 12345\n");
        fs.add_file(
            "/proc/meminfo",
            "MemTotal:       16384000 kB\n\
             MemFree:         4096000 kB\n\
             Buffers:          512000 kB\n\
             Cached:          2048000 kB\n\
             Dirty:              1200 kB\n\
             Writeback:             0 kB\n\
             Slab:             256000 kB\n\
             SwapTotal:       8192000 kB\n\
             SwapFree:        8000000 kB\n",
        );
        fs.add_file(
            "/proc/diskstats",
            "   8       0 sda 61132 13352 1221632 30528 116426 158518 7798176 119056 0 70476 149256\n",
        );
        fs.add_file(
            "/proc/net/dev",
            "Inter-|   Receive                                                |  Transmit\n \
             face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n\
                lo: 1000000    5000    0    0    0     0          0         0  1000000    5000    0    0    0     0       0          0\n\
              eth0: 9000000   60000    1    2    0     0          0         0  4000000   30000    3    4    5     6       7          0\n",
        );
        fs
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

/// Query executor answering from canned responses, keyed by exact
/// statement text. Unscripted statements fail, exercising the degradation
/// paths.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecutor {
    responses: HashMap<String, Table>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a response for one statement.
    pub fn insert(&mut self, sql: impl Into<String>, table: Table) {
        self.responses.insert(sql.into(), table);
    }
}

impl QueryExecutor for ScriptedExecutor {
    fn execute(&mut self, sql: &str) -> Result<Table, QueryError> {
        self.responses
            .get(sql)
            .cloned()
            .ok_or_else(|| QueryError::Execution(format!("no scripted response for: {}", sql)))
    }
}
