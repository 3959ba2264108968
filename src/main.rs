//! pgsysmon - OS statistics sampler for local and remote PostgreSQL hosts.
//!
//! Polls kernel counters from the local /proc filesystem, or from a remote
//! server through its pgsysmon companion schema, and prints per-second
//! rates every interval.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use pgsysmon::poller::Poller;
use pgsysmon::sink::{Sink, TextSink};
#[cfg(target_os = "linux")]
use pgsysmon::source::fs::RealFs;
use pgsysmon::source::local::LocalSource;
#[cfg(not(target_os = "linux"))]
use pgsysmon::source::mock::MockFs;
use pgsysmon::source::remote::executor::PgExecutor;
use pgsysmon::source::remote::RemoteSource;
use pgsysmon::source::StatsSource;

/// OS statistics sampler for PostgreSQL hosts.
#[derive(Parser)]
#[command(name = "pgsysmon", about = "OS statistics sampler for PostgreSQL hosts", version)]
struct Args {
    /// Polling interval in seconds.
    #[arg(short, long, default_value = "1")]
    interval: u64,

    /// Number of cycles to run before exiting. Runs until interrupted
    /// when omitted.
    #[arg(short, long)]
    cycles: Option<u64>,

    /// libpq-style conninfo string for a remote server
    /// (e.g. "host=db1 user=monitor dbname=postgres"). Samples the local
    /// /proc filesystem when omitted.
    #[arg(long)]
    conninfo: Option<String>,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Re-probe interface link settings every N cycles.
    #[arg(long, default_value = "30")]
    link_probe_cycles: u64,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("pgsysmon={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!("pgsysmon {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}s, source={}",
        args.interval,
        args.conninfo.as_deref().unwrap_or("local")
    );

    match args.conninfo {
        Some(ref conninfo) => {
            let executor = match PgExecutor::connect(conninfo) {
                Ok(executor) => executor,
                Err(e) => {
                    error!("{}", e);
                    print_pg_hint();
                    std::process::exit(1);
                }
            };
            let source = match RemoteSource::new(executor) {
                Ok(source) => source,
                Err(e) => {
                    error!("{}", e);
                    eprintln!("hint: install the pgsysmon companion schema on the server");
                    std::process::exit(1);
                }
            };
            run(source, &args);
        }
        None => {
            #[cfg(target_os = "linux")]
            let source = LocalSource::new(RealFs::new(), &args.proc_path);
            #[cfg(not(target_os = "linux"))]
            let source = LocalSource::new(MockFs::typical_system(), &args.proc_path);
            run(source, &args);
        }
    }
}

/// Polling loop shared by both sources.
fn run<S: StatsSource>(source: S, args: &Args) {
    let mut poller = Poller::new(source);
    let mut sink = TextSink::new(io::stdout().lock());

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let interval = Duration::from_secs(args.interval.max(1));
    let mut cycles: u64 = 0;

    while running.load(Ordering::SeqCst) {
        let report = poller.cycle();
        if let Err(e) = sink.emit(&report) {
            error!("write failed: {}", e);
            break;
        }

        cycles += 1;
        if let Some(limit) = args.cycles
            && cycles >= limit
        {
            break;
        }
        if args.link_probe_cycles > 0 && cycles.is_multiple_of(args.link_probe_cycles) {
            poller.reprobe_links();
        }

        // Sleep with periodic checks for the shutdown signal.
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    info!("Shutdown complete, {} cycles", cycles);
}

/// Prints a colored connection hint.
fn print_pg_hint() {
    const YELLOW: &str = "\x1b[33m";
    const RESET: &str = "\x1b[0m";

    eprintln!("{YELLOW}  Pass connection settings in the conninfo string:");
    eprintln!("    --conninfo \"host=db1 port=5432 user=monitor dbname=postgres\"{RESET}");
}
