//! Feedscout command line: run one crawl and stream records as NDJSON.

mod args;

use anyhow::{bail, Context, Result};
use args::{Command, USAGE};
use feedscout_browser::ChromiumLauncher;
use feedscout_core::{AppConfig, ExtractionRecord};
use feedscout_scanner::{CancellationToken, FeedScanner, ScanProgress};
use serde::Serialize;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

/// One line of output.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Event<'a> {
    Update {
        data: &'a ExtractionRecord,
        progress: f64,
    },
    #[serde(rename_all = "camelCase")]
    Complete { total_results: usize },
}

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,feedscout=debug"));

    // stdout carries the record stream
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn emit(event: &Event<'_>) {
    let line = match serde_json::to_string(event) {
        Ok(line) => line,
        Err(e) => {
            warn!("Failed to serialize output: {}", e);
            return;
        }
    };
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{line}").and_then(|()| stdout.flush()) {
        warn!("Failed to write output: {}", e);
    }
}

/// Resolve on the next Ctrl-C or SIGTERM.
async fn stop_requested() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// Cancel `token` on the first stop request. The returned token fires on a
/// second one.
fn cancel_on_signal(token: CancellationToken) -> CancellationToken {
    let hard_stop = CancellationToken::new();
    let hard = hard_stop.clone();
    tokio::spawn(async move {
        stop_requested().await;
        info!("Stop requested, letting in-flight items finish");
        token.cancel();

        stop_requested().await;
        warn!("Second stop request, tearing down workers");
        hard.cancel();
    });
    hard_stop
}

/// Drive `scan` to completion unless `hard_stop` fires first, in which case
/// the scan is dropped along with its browsers and worker pool.
async fn run_until_hard_stop<F: Future>(
    scan: F,
    hard_stop: &CancellationToken,
) -> Option<F::Output> {
    tokio::select! {
        output = scan => Some(output),
        () = hard_stop.cancelled() => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let request = match args::parse(std::env::args().skip(1)) {
        Ok(Command::Scan(request)) => request,
        Ok(Command::InitConfig) => {
            let path = AppConfig::config_path()?;
            AppConfig::default().save()?;
            println!("Wrote default configuration to {}", path.display());
            return Ok(());
        }
        Ok(Command::Help) => {
            println!("{USAGE}");
            return Ok(());
        }
        Err(e) => {
            eprintln!("error: {e:#}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    init_tracing();
    info!("Starting Feedscout v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_with_env().context("Failed to load configuration")?;
    let launcher = Arc::new(ChromiumLauncher::new(config.browser.clone()));
    let scanner = FeedScanner::new(launcher, config)?;

    let cancel = CancellationToken::new();
    let hard_stop = cancel_on_signal(cancel.clone());

    let scan = scanner.scan(
        request,
        |record: &ExtractionRecord, progress: ScanProgress| {
            emit(&Event::Update {
                data: record,
                progress: progress.percent(),
            });
        },
        cancel,
    );
    let Some(outcome) = run_until_hard_stop(scan, &hard_stop).await else {
        bail!("scan abandoned before in-flight items finished");
    };
    let records = outcome?;

    emit(&Event::Complete {
        total_results: records.len(),
    });
    info!("Scan complete with {} records", records.len());
    Ok(())
}
