#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod session;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        tracing::error!(error = %err, "gazelab failed");
        std::process::exit(exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = session::load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging);
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Run {
            participant,
            seed,
            out,
            fixation,
            conditions,
            realtime,
            glance_away,
        } => {
            let opts = session::RunOptions {
                participant,
                seed,
                out,
                fixation,
                conditions,
                realtime,
                glance_away: glance_away.unwrap_or_default(),
            };
            let summary = session::run_session(&cfg, &opts, cli.json)?;
            if cli.json {
                println!("{}", serde_json::to_string(&summary)?);
            } else {
                println!("{}", session::describe(&summary));
            }
        }
        Commands::CheckConfig => {
            let run = session::run_cfg(&cfg, &session::RunOptions::default());
            if cli.json {
                let conditions: Vec<&str> =
                    run.experiment.conditions.iter().map(|c| c.as_str()).collect();
                let v = serde_json::json!({
                    "ok": true,
                    "participant_id": run.experiment.participant_id,
                    "conditions": conditions,
                    "stimulus": run.experiment.stimulus.tag(),
                    "fixation_required": run.experiment.fixation_required,
                    "anchor": [run.fixation.anchor.x, run.fixation.anchor.y],
                    "max_passes": run.calibration.max_passes,
                    "output_file": run.experiment.output_file,
                });
                println!("{v}");
            } else {
                println!("config ok: {}", cli.config.display());
                println!("{run:#?}");
            }
        }
        Commands::Calibrate { passes } => {
            let summary = session::run_calibration(&cfg, passes, cli.json)?;
            if cli.json {
                let v = serde_json::json!({
                    "calibration_passes": summary.calibration_passes,
                    "tolerance_px": summary.tolerance_px,
                });
                println!("{v}");
            } else {
                println!(
                    "calibration finished after {} pass(es); tolerance {:.1} px",
                    summary.calibration_passes, summary.tolerance_px
                );
            }
        }
    }
    Ok(())
}

/// Console layer on stderr (pretty or JSON lines) plus an optional JSON file sink.
fn init_tracing(json: bool, level: &str, logging: &gazelab_config::Logging) {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = logging.file.as_deref().map(|path| {
        let path = std::path::Path::new(path);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(std::path::Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "gazelab.log".into(), |n| n.to_string_lossy().into_owned());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, &name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, &name),
            _ => tracing_appender::rolling::never(dir, &name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_filter = EnvFilter::new(logging.level.as_deref().unwrap_or("info"));
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(file_filter)
    });

    let (pretty, jsonl) = if json {
        (
            None,
            Some(fmt::layer().json().with_writer(std::io::stderr).with_filter(console_filter)),
        )
    } else {
        (
            Some(fmt::layer().with_writer(std::io::stderr).with_filter(console_filter)),
            None,
        )
    };

    let _ = tracing_subscriber::registry()
        .with(pretty)
        .with(jsonl)
        .with(file_layer)
        .try_init();
}
