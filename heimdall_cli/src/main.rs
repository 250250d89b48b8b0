//! `heimdall` binary: config loading, tracing setup, and subcommand dispatch.

mod cli;
mod count;
mod error_fmt;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use eyre::WrapErr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

fn main() {
    if let Err(err) = run() {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}

fn run() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let text = std::fs::read_to_string(&cli.config)
        .wrap_err_with(|| format!("failed to read config {}", cli.config.display()))?;
    let cfg = heimdall_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("invalid configuration: {e}"))?;
    cfg.validate().wrap_err("invalid configuration")?;

    init_tracing(&cli, &cfg.logging)?;

    // Ctrl-C flips the flag; the run loop drains and prints totals.
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::Relaxed);
    })
    .wrap_err("failed to install Ctrl-C handler")?;

    match cli.cmd {
        Commands::Count {
            cycles,
            raw_log,
            direct,
        } => count::run_count(&cfg, cycles, raw_log.as_deref(), direct, cli.json, shutdown),
        Commands::Histogram {
            cycles,
            shape,
            max_cm,
        } => count::run_histogram(&cfg, cycles, shape, max_cm, shutdown),
        Commands::SelfCheck => count::run_self_check(&cfg),
    }
}

fn init_tracing(cli: &Cli, logging: &heimdall_config::Logging) -> eyre::Result<()> {
    // RUST_LOG wins over the flag so verbosity can be raised without
    // touching service units.
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    });
    if let Some(path) = logging.file.as_deref() {
        layers.push(file_layer(path, logging)?);
    }
    tracing_subscriber::registry().with(layers).init();
    Ok(())
}

/// JSON-lines file sink per the `[logging]` table. `logging.level` governs
/// only this sink; the console follows `--log-level`.
fn file_layer(
    path: &str,
    logging: &heimdall_config::Logging,
) -> eyre::Result<Box<dyn Layer<Registry> + Send + Sync>> {
    let path = std::path::Path::new(path);
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => std::path::Path::new("."),
    };
    let name = path
        .file_name()
        .ok_or_else(|| eyre::eyre!("logging.file has no file name: {}", path.display()))?;
    let appender = match logging.rotation.as_deref() {
        Some("daily") => tracing_appender::rolling::daily(dir, name),
        Some("hourly") => tracing_appender::rolling::hourly(dir, name),
        // Unknown rotation values fall back to a single file.
        _ => tracing_appender::rolling::never(dir, name),
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);
    let filter = EnvFilter::new(logging.level.as_deref().unwrap_or("info"));
    Ok(fmt::layer()
        .json()
        .with_writer(writer)
        .with_filter(filter)
        .boxed())
}
