//! pgsysmon - OS statistics engine for local and remote PostgreSQL hosts.
//!
//! Samples CPU, memory, disk and network counters either from the local
//! `/proc` filesystem or from a remote server's companion SQL schema,
//! and turns consecutive snapshots into per-second rates:
//! - `source` - counter acquisition behind one trait, local and remote
//! - `stats` - snapshot model, two-generation store and the rate engine
//! - `poller` - per-cycle orchestration
//! - `sink` - report rendering

pub mod poller;
pub mod sink;
pub mod source;
pub mod stats;
