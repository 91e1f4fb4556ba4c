use attendance_core::service::config::ServiceConfig;
use attendance_core::service::AttendanceService;
use attendance_core::{OsEntropySource, ServiceError, SystemClock};
use clap::Parser;
use std::sync::Arc;
use std::thread;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Attendance node: rotates window secrets and verifies submitted tickets.
#[derive(Parser, Debug)]
#[command(name = "attendance-node")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a JSON service config
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config)
    #[arg(long)]
    listen: Option<String>,

    /// JSON-lines audit file (overrides config)
    #[arg(long)]
    audit_log: Option<String>,

    /// Rotation period in seconds (overrides config)
    #[arg(long)]
    rotation_secs: Option<u64>,

    /// Log filter, e.g. `info` or `attendance_core=debug`
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(args) {
        error!(error = %e, "attendance node failed to start");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), ServiceError> {
    let mut cfg = match &args.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(listen) = args.listen {
        cfg.listen_addr = listen;
    }
    if let Some(path) = args.audit_log {
        cfg.audit_log_path = Some(path);
    }
    if let Some(secs) = args.rotation_secs {
        cfg.rotation_period_secs = secs;
    }

    let service = AttendanceService::start(
        &cfg,
        Arc::new(OsEntropySource),
        Arc::new(SystemClock),
    )?;
    info!(
        addr = %service.local_addr(),
        rotation_secs = cfg.rotation_period_secs,
        audit = cfg.audit_log_path.as_deref().unwrap_or("memory"),
        "attendance node running"
    );

    // Serve until the process is killed; rotation and HTTP run on their own threads.
    loop {
        thread::park();
    }
}
