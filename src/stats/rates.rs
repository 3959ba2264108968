//! Stateless diff/rate engine.
//!
//! Pure functions from `(previous, current, interval)` triples to per-second
//! rates and derived metrics. The engine never fails: degenerate inputs
//! (counter regression, zero denominators, unknown link speed) degrade to 0.

use serde::{Deserialize, Serialize};

use crate::stats::model::{
    BlockDeviceSnapshot, CpuSnapshot, DUPLEX_FULL, DUPLEX_HALF, InterfaceSnapshot,
};

/// Elapsed ticks between two uptime samples, never zero.
///
/// On the first cycle `prev` is zero, so the result covers the whole time
/// since system startup.
pub fn compute_interval(prev_uptime: u64, curr_uptime: u64) -> u64 {
    let itv = curr_uptime.saturating_sub(prev_uptime);
    if itv == 0 { 1 } else { itv }
}

/// Regression-safe rate scaled to percent.
///
/// Returns 0 when the counter went backward, a recognized artifact of
/// dyn-tick kernels and server-side counter resets.
pub fn sp_value(prev: u64, curr: u64, itv: u64) -> f64 {
    if curr < prev {
        return 0.0;
    }
    (curr - prev) as f64 / itv as f64 * 100.0
}

/// Regression-safe rate scaled to per-second using the tick frequency.
pub fn s_value(prev: u64, curr: u64, itv: u64, hz: u32) -> f64 {
    if curr < prev {
        return 0.0;
    }
    (curr - prev) as f64 / itv as f64 * hz as f64
}

/// CPU bucket percentages over one interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuRates {
    pub user: f64,
    /// system + softirq + hardirq combined.
    pub sys: f64,
    pub nice: f64,
    pub idle: f64,
    pub iowait: f64,
    pub hardirq: f64,
    pub softirq: f64,
    pub steal: f64,
}

/// Computes CPU bucket percentages from two tick snapshots.
pub fn cpu_rates(prev: &CpuSnapshot, curr: &CpuSnapshot, itv: u64) -> CpuRates {
    // Idle is reported as 0 instead of a negative artifact when it appears
    // to have decreased.
    let idle = if curr.idle < prev.idle {
        0.0
    } else {
        sp_value(prev.idle, curr.idle, itv)
    };

    CpuRates {
        user: sp_value(prev.user, curr.user, itv),
        sys: sp_value(
            prev.system + prev.softirq + prev.hardirq,
            curr.system + curr.softirq + curr.hardirq,
            itv,
        ),
        nice: sp_value(prev.nice, curr.nice, itv),
        idle,
        iowait: sp_value(prev.iowait, curr.iowait, itv),
        hardirq: sp_value(prev.hardirq, curr.hardirq, itv),
        softirq: sp_value(prev.softirq, curr.softirq, itv),
        steal: sp_value(prev.steal, curr.steal, itv),
    }
}

/// Per-device I/O rates and derived latencies over one interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockDeviceRates {
    pub name: String,
    /// Merged reads per second.
    pub rrqm_s: f64,
    /// Merged writes per second.
    pub wrqm_s: f64,
    /// Reads completed per second.
    pub r_s: f64,
    /// Writes completed per second.
    pub w_s: f64,
    /// Megabytes read per second.
    pub rmb_s: f64,
    /// Megabytes written per second.
    pub wmb_s: f64,
    /// Average request size in sectors.
    pub arqsz: f64,
    /// Average queue length.
    pub aqu_sz: f64,
    /// Average I/O latency in ms.
    pub await_ms: f64,
    pub r_await: f64,
    pub w_await: f64,
    /// Raw utilization; divide by 10 for a percentage at hz=100.
    pub util: f64,
    /// No completions in either direction this interval. A rendering
    /// filter, not a data-loss condition.
    pub idle: bool,
}

/// Computes per-device rates from two diskstats snapshots.
pub fn disk_rates(
    prev: &BlockDeviceSnapshot,
    curr: &BlockDeviceSnapshot,
    itv: u64,
    hz: u32,
) -> BlockDeviceRates {
    let d_r_completed = curr.r_completed.saturating_sub(prev.r_completed);
    let d_w_completed = curr.w_completed.saturating_sub(prev.w_completed);
    let d_completed = d_r_completed + d_w_completed;

    let await_ms = if d_completed > 0 {
        (curr.r_spent.saturating_sub(prev.r_spent) + curr.w_spent.saturating_sub(prev.w_spent))
            as f64
            / d_completed as f64
    } else {
        0.0
    };
    let arqsz = if d_completed > 0 {
        (curr.r_sectors.saturating_sub(prev.r_sectors)
            + curr.w_sectors.saturating_sub(prev.w_sectors)) as f64
            / d_completed as f64
    } else {
        0.0
    };
    let r_await = if d_r_completed > 0 {
        curr.r_spent.saturating_sub(prev.r_spent) as f64 / d_r_completed as f64
    } else {
        0.0
    };
    let w_await = if d_w_completed > 0 {
        curr.w_spent.saturating_sub(prev.w_spent) as f64 / d_w_completed as f64
    } else {
        0.0
    };

    BlockDeviceRates {
        name: curr.name.clone(),
        rrqm_s: s_value(prev.r_merged, curr.r_merged, itv, hz),
        wrqm_s: s_value(prev.w_merged, curr.w_merged, itv, hz),
        r_s: s_value(prev.r_completed, curr.r_completed, itv, hz),
        w_s: s_value(prev.w_completed, curr.w_completed, itv, hz),
        // 2048 sectors of 512 bytes per megabyte.
        rmb_s: s_value(prev.r_sectors, curr.r_sectors, itv, hz) / 2048.0,
        wmb_s: s_value(prev.w_sectors, curr.w_sectors, itv, hz) / 2048.0,
        arqsz,
        aqu_sz: s_value(prev.t_weighted, curr.t_weighted, itv, hz) / 1000.0,
        await_ms,
        r_await,
        w_await,
        util: s_value(prev.t_spent, curr.t_spent, itv, hz),
        idle: d_completed == 0,
    }
}

/// Per-interface traffic rates and link utilization over one interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRates {
    pub name: String,
    /// Bytes received per second.
    pub rbps: f64,
    /// Bytes sent per second.
    pub wbps: f64,
    /// Packets received per second.
    pub rpps: f64,
    /// Packets sent per second.
    pub wpps: f64,
    /// Average received segment size in bytes.
    pub ravs: f64,
    /// Average sent segment size in bytes.
    pub wavs: f64,
    pub ierr: f64,
    pub oerr: f64,
    pub coll: f64,
    pub sat: f64,
    pub rutil: f64,
    pub wutil: f64,
    pub util: f64,
    /// Interface has never seen a packet. A rendering filter.
    pub active: bool,
}

/// Computes per-interface rates from two netdev snapshots.
///
/// Link settings are taken from `curr`; unknown speed zeroes all three
/// utilization values, unknown duplex zeroes the overall one.
pub fn net_rates(
    prev: &InterfaceSnapshot,
    curr: &InterfaceSnapshot,
    itv: u64,
    hz: u32,
) -> InterfaceRates {
    let rbps = s_value(prev.rbytes, curr.rbytes, itv, hz);
    let wbps = s_value(prev.wbytes, curr.wbytes, itv, hz);
    let rpps = s_value(prev.rpackets, curr.rpackets, itv, hz);
    let wpps = s_value(prev.wpackets, curr.wpackets, itv, hz);

    let ravs = if rpps > 0.0 { rbps / rpps } else { 0.0 };
    let wavs = if wpps > 0.0 { wbps / wpps } else { 0.0 };

    let (rutil, wutil, util) = if curr.speed > 0 {
        // 800 = 100 for the % conversion, 8 for bytes-to-bits.
        let speed = curr.speed as f64;
        let rutil = (rbps * 800.0 / speed).min(100.0);
        let wutil = (wbps * 800.0 / speed).min(100.0);
        let util = match curr.duplex {
            DUPLEX_FULL => rutil.max(wutil),
            DUPLEX_HALF => ((rbps + wbps) * 800.0 / speed).min(100.0),
            _ => 0.0,
        };
        (rutil, wutil, util)
    } else {
        (0.0, 0.0, 0.0)
    };

    InterfaceRates {
        name: curr.name.clone(),
        rbps,
        wbps,
        rpps,
        wpps,
        ravs,
        wavs,
        ierr: s_value(prev.ierr, curr.ierr, itv, hz),
        oerr: s_value(prev.oerr, curr.oerr, itv, hz),
        coll: s_value(prev.coll, curr.coll, itv, hz),
        sat: s_value(prev.sat, curr.sat, itv, hz),
        rutil,
        wutil,
        util,
        active: curr.rpackets != 0 || curr.wpackets != 0,
    }
}
