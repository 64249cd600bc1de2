#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `dimensioner`: drive the dimensioning core against the simulated station.

mod cli;
mod error_fmt;
mod report;
mod station;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, exit_code_for_status, format_error_json, humanize};
use crate::station::MeasureArgs;

fn load_config(path: &Path) -> eyre::Result<dim_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = dim_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("parse config {}: {e}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

fn rotation(policy: Option<&str>) -> tracing_appender::rolling::Rotation {
    use tracing_appender::rolling::Rotation;
    match policy.map(str::to_ascii_lowercase).as_deref() {
        Some("daily") => Rotation::DAILY,
        Some("hourly") => Rotation::HOURLY,
        _ => Rotation::NEVER,
    }
}

/// Console layer on stderr (pretty or JSON) plus an optional JSON file layer.
fn init_tracing(cli: &Cli, logging: Option<&dim_config::Logging>) {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let console = if cli.json {
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
    };

    let file = logging.and_then(|l| {
        let path = Path::new(l.file.as_deref()?);
        let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let name = path.file_name()?;
        let appender = tracing_appender::rolling::RollingFileAppender::new(
            rotation(l.rotation.as_deref()),
            dir,
            name,
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let level = l.level.as_deref().unwrap_or("info");
        Some(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(level)),
        )
    });

    let _ = tracing_subscriber::registry().with(console).with(file).try_init();
}

fn print_error(err: &eyre::Report) {
    if JSON_MODE.get().copied().unwrap_or(false) {
        println!("{}", format_error_json(err));
    } else {
        eprintln!("{}", humanize(err));
    }
}

fn run(cli: &Cli, cfg: &dim_config::Config) -> eyre::Result<ExitCode> {
    let json = cli.json;
    match &cli.cmd {
        Commands::Measure {
            barcode,
            units,
            comment,
            weight_gr,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            {
                let flag = Arc::clone(&shutdown);
                if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
                    tracing::warn!(error = %e, "could not install Ctrl-C handler");
                }
            }
            let args = MeasureArgs {
                barcode: barcode.clone(),
                units: *units,
                comment: comment.clone(),
                weight_gr: *weight_gr,
            };
            let data = station::run_measure(cfg, cli.samples.as_deref(), &args, &shutdown)?;
            tracing::info!(
                status = %data.status,
                index = ?data.calculation_index,
                elapsed_ms = data.elapsed_ms,
                "calculation finished"
            );
            if json {
                println!("{}", report::result_json(&data));
            } else {
                println!("{}", report::result_text(&data));
            }
            Ok(exit_status(exit_code_for_status(data.status)))
        }
        Commands::FloorDepth => {
            let floor = station::run_floor_depth(cfg)?;
            if json {
                println!("{}", serde_json::json!({ "floor_depth_mm": floor }));
            } else {
                println!("Floor depth: {floor} mm");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::SelfCheck => {
            let floor = station::run_self_check(cfg, cli.samples.as_deref())?;
            if json {
                println!("{}", serde_json::json!({ "self_check": "ok", "floor_depth_mm": floor }));
            } else {
                println!("self-check ok (floor depth {floor} mm)");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Health => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "ok",
                        "version": env!("CARGO_PKG_VERSION"),
                        "sample_count": cfg.algorithm.sample_count,
                        "auto_start": cfg.algorithm.enable_auto_timer,
                    })
                );
            } else {
                println!("ok");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_status(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn main() -> ExitCode {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let cfg = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            init_tracing(&cli, None);
            print_error(&e);
            return ExitCode::from(1);
        }
    };
    init_tracing(&cli, Some(&cfg.logging));
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match run(&cli, &cfg) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            print_error(&e);
            exit_status(exit_code_for_error(&e))
        }
    }
}
