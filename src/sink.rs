//! Report rendering.
//!
//! Consumers of [`CycleReport`] implement [`Sink`]. The built-in
//! [`TextSink`] renders one block per cycle in the iostat/nicstat style,
//! suitable for a terminal or a log file.

use std::io::{self, Write};

use chrono::{TimeZone, Utc};

use crate::poller::CycleReport;

/// Consumes one report per cycle.
pub trait Sink {
    fn emit(&mut self, report: &CycleReport) -> io::Result<()>;
}

/// Plain-text sink.
///
/// Device families acquired as `None` render an "unavailable" marker rather
/// than an empty table. Idle disks and interfaces that never saw a packet
/// are filtered out.
pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Sink for TextSink<W> {
    fn emit(&mut self, report: &CycleReport) -> io::Result<()> {
        let when = Utc
            .timestamp_opt(report.timestamp, 0)
            .single()
            .unwrap_or_default();
        writeln!(
            self.out,
            "{}  load average: {:.2}, {:.2}, {:.2}",
            when.format("%Y-%m-%d %H:%M:%S"),
            report.loadavg.min1,
            report.loadavg.min5,
            report.loadavg.min15
        )?;

        if let Some(cpu) = report.cpu.first() {
            writeln!(
                self.out,
                "%cpu: {:4.1} us, {:4.1} sy, {:4.1} ni, {:4.1} id, {:4.1} wa, {:4.1} hi, {:4.1} si, {:4.1} st",
                cpu.user, cpu.sys, cpu.nice, cpu.idle, cpu.iowait, cpu.hardirq, cpu.softirq, cpu.steal
            )?;
        }

        let mem = &report.memory;
        let mib = |kb: u64| kb as f64 / 1024.0;
        writeln!(
            self.out,
            "MiB mem: {:8.1} total, {:8.1} free, {:8.1} used, {:8.1} buf/cached",
            mib(mem.mem_total),
            mib(mem.mem_free),
            mib(mem.mem_used),
            mib(mem.buffers + mem.cached)
        )?;
        writeln!(
            self.out,
            "MiB swap: {:7.1} total, {:8.1} free, {:8.1} used, {:8.1} dirty",
            mib(mem.swap_total),
            mib(mem.swap_free),
            mib(mem.swap_used),
            mib(mem.dirty)
        )?;

        match &report.disks {
            None => writeln!(self.out, "disk stats unavailable")?,
            Some(disks) => {
                writeln!(
                    self.out,
                    "{:<12} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7} {:>6}",
                    "DEVICE", "rrqm/s", "wrqm/s", "r/s", "w/s", "rMB/s", "wMB/s", "arqsz",
                    "aqu-sz", "await", "r_await", "w_await", "%util"
                )?;
                for d in disks.iter().filter(|d| !d.idle) {
                    writeln!(
                        self.out,
                        "{:<12} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>6.2}",
                        d.name, d.rrqm_s, d.wrqm_s, d.r_s, d.w_s, d.rmb_s, d.wmb_s, d.arqsz,
                        d.aqu_sz, d.await_ms, d.r_await, d.w_await,
                        // util accumulates ms per tick; at hz=100 a fully
                        // busy device scores 1000, hence the /10.
                        d.util / 10.0
                    )?;
                }
            }
        }

        match &report.ifaces {
            None => writeln!(self.out, "network stats unavailable")?,
            Some(ifaces) => {
                writeln!(
                    self.out,
                    "{:<12} {:>8} {:>8} {:>8} {:>8} {:>7} {:>7} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6}",
                    "IFACE", "rMbps", "wMbps", "rPk/s", "wPk/s", "rAvs", "wAvs", "IErr",
                    "OErr", "Coll", "Sat", "%rUtil", "%wUtil", "%Util"
                )?;
                for i in ifaces.iter().filter(|i| i.active) {
                    writeln!(
                        self.out,
                        "{:<12} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>7.1} {:>7.1} {:>6.2} {:>6.2} {:>6.2} {:>6.2} {:>6.2} {:>6.2} {:>6.2}",
                        i.name,
                        // bytes/s to Mbit/s: *8 / 1024 / 1024.
                        i.rbps / 131_072.0,
                        i.wbps / 131_072.0,
                        i.rpps,
                        i.wpps,
                        i.ravs,
                        i.wavs,
                        i.ierr,
                        i.oerr,
                        i.coll,
                        i.sat,
                        i.rutil,
                        i.wutil,
                        i.util
                    )?;
                }
            }
        }

        writeln!(self.out)?;
        self.out.flush()
    }
}
