//! `vigil run`: live engine with a periodic tick, printing the event log
//! as it grows.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use vigil_core::{Monitor, SystemClock, TracingTransport};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load_config(global)?;
    let engine = cfg.build_engine()?;
    let monitor = Monitor::start(
        engine,
        &cfg.monitor_config(),
        Arc::new(SystemClock),
        Arc::new(TracingTransport),
    );

    let mut events = monitor.events();
    let format = global.output.clone();
    let color = output::should_color(&global.color);
    let quiet = global.quiet;
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(record) => match output::render_record(&format, &record, color) {
                    Ok(line) => output::print_output(&line, quiet),
                    Err(e) => warn!(error = %e, "could not render log record"),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result = if args.stdin {
        feed_stdin(&monitor).await
    } else {
        info!("monitor running, press Ctrl-C to stop");
        tokio::signal::ctrl_c().await.map_err(CliError::from)
    };

    monitor.shutdown().await;
    drop(monitor);
    if let Err(e) = printer.await {
        warn!(error = %e, "event printer failed");
    }
    result
}

/// Submit every stdin line as an external command. Rejections are already
/// in the event log, so they do not stop the feed.
async fn feed_stdin(monitor: &Monitor) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match monitor.command(line).await {
            Ok(outcome) => debug!(?outcome, "command applied"),
            Err(e) => warn!(error = %e, "command rejected"),
        }
    }
    Ok(())
}
