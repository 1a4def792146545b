mod cli;
mod decode;
mod error_fmt;
mod run;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn init_tracing(json: bool, level: &str, logging: Option<&crane_config::Logging>) {
    // RUST_LOG wins over --log-level when set.
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console = if json {
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
        let path = std::path::Path::new(l.file.as_deref()?);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let name = path.file_name()?;
        let appender = match l.rotation.as_deref().unwrap_or("never") {
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let filter = EnvFilter::new(l.level.as_deref().unwrap_or("info"));
        Some(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter)
                .boxed(),
        )
    });

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init();
}

fn report_error(e: &eyre::Report) -> i32 {
    tracing::error!(error = %format!("{e:#}"), "command failed");
    if JSON_MODE.get().copied().unwrap_or(false) {
        println!("{}", format_error_json(e));
    } else {
        eprintln!("{}", humanize(e));
    }
    exit_code_for_error(e)
}

fn print_summary(s: &crane_core::RunSummary, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "cycles": s.cycles,
                "sent": s.sent,
                "send_errors": s.send_errors,
                "skipped": s.skipped,
                "final_state": s.final_state.name(),
                "circle_count": s.circle_count,
                "telemetry": {
                    "decoded": s.receiver.decoded,
                    "ignored": s.receiver.ignored,
                    "transport_errors": s.receiver.transport_errors,
                },
            })
        );
    } else {
        println!(
            "run complete: {} cycles, {} commands sent, state {} (cycle {})",
            s.cycles, s.sent, s.final_state, s.circle_count
        );
    }
}

fn dispatch(cli: Cli, shutdown: Arc<AtomicBool>) -> eyre::Result<()> {
    match cli.cmd {
        Commands::Decode { hex } => {
            let bytes = cli::parse_hex_payload(&hex)?;
            let v = decode::view(&bytes);
            if cli.json {
                println!("{}", v.to_json());
            } else {
                v.print_text();
            }
            Ok(())
        }
        Commands::SelfCheck => {
            let cfg = crane_config::load_file(&cli.config)?;
            let s = run::self_check(&cfg)?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "self_check": "ok", "cycles": s.cycles, "sent": s.sent })
                );
            } else {
                println!("self-check ok ({} cycles, {} commands)", s.cycles, s.sent);
            }
            Ok(())
        }
        Commands::Run {
            cycles,
            sim,
            weight_at,
            stats,
        } => {
            let cfg = crane_config::load_file(&cli.config)?;
            let opts = run::RunOpts {
                cycles,
                sim,
                weight_at,
            };
            let summary = run::run_crane(&cfg, &opts, shutdown).wrap_err("control loop")?;
            print_summary(&summary, cli.json);
            if stats {
                run::print_stats(&summary);
            }
            Ok(())
        }
    }
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    // File logging comes from the config when it parses; errors are reported after init.
    let logging = crane_config::load_file(&cli.config)
        .ok()
        .map(|c| c.logging);
    init_tracing(cli.json, &cli.log_level, logging.as_ref());

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    if let Err(e) = dispatch(cli, shutdown) {
        std::process::exit(report_error(&e));
    }
}
