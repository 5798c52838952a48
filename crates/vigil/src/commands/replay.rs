//! `vigil replay`: drive a fresh engine from a file of command lines.
//!
//! Each line's bracketed timestamp becomes the engine clock (never moving
//! backwards); the engine ticks before applying it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;
use tracing::{debug, warn};

use vigil_core::{Downtime, LogRecord, Notification};

use crate::cli::{GlobalOpts, ReplayArgs};
use crate::error::CliError;
use crate::output;

// ── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ReplayReport {
    log: Vec<LogRecord>,
    downtimes: Vec<Downtime>,
    notifications: Vec<Notification>,
    rejected: usize,
}

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl From<&LogRecord> for LogRow {
    fn from(r: &LogRecord) -> Self {
        Self {
            time: timestamp(r.time),
            level: r.level.to_string(),
            message: r.message.clone(),
        }
    }
}

#[derive(Tabled)]
struct DowntimeRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Item")]
    item: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
    #[tabled(rename = "Active")]
    active: String,
}

impl From<&Downtime> for DowntimeRow {
    fn from(d: &Downtime) -> Self {
        Self {
            id: d.id.to_string(),
            item: d.item.to_string(),
            kind: if d.fixed { "fixed" } else { "flexible" }.into(),
            start: timestamp(d.start_time),
            end: timestamp(d.end_time),
            active: if d.is_in_effect { "yes" } else { "no" }.into(),
        }
    }
}

#[derive(Tabled)]
struct NotificationRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Item")]
    item: String,
    #[tabled(rename = "Contact")]
    contact: String,
    #[tabled(rename = "#")]
    number: u32,
    #[tabled(rename = "Command")]
    command: String,
}

impl From<&Notification> for NotificationRow {
    fn from(n: &Notification) -> Self {
        Self {
            time: timestamp(n.created_at),
            kind: n.notification_type.to_string(),
            item: n.item.to_string(),
            contact: n.contact().unwrap_or_default().to_owned(),
            number: n.number,
            command: n.command_line().unwrap_or_default().to_owned(),
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn detail(report: &ReplayReport) -> String {
    let log: Vec<LogRow> = report.log.iter().map(LogRow::from).collect();
    let mut sections = vec![output::render_table(&log)];
    if !report.notifications.is_empty() {
        let rows: Vec<NotificationRow> =
            report.notifications.iter().map(NotificationRow::from).collect();
        sections.push(format!("Notifications\n{}", output::render_table(&rows)));
    }
    if !report.downtimes.is_empty() {
        let rows: Vec<DowntimeRow> = report.downtimes.iter().map(DowntimeRow::from).collect();
        sections.push(format!("Downtimes\n{}", output::render_table(&rows)));
    }
    sections.join("\n\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ReplayArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load_config(global)?;
    let mut engine = cfg.build_engine()?;
    let text = std::fs::read_to_string(&args.file)?;

    let mut now = DateTime::UNIX_EPOCH;
    let mut notifications = Vec::new();
    let mut rejected = 0usize;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match engine.process_stamped_command(line, &mut now) {
            Ok(outcome) => debug!(line = idx + 1, ?outcome, "command applied"),
            Err(e) => {
                rejected += 1;
                warn!(line = idx + 1, error = %e, "command rejected");
            }
        }
        notifications.extend(engine.take_dispatches());
    }

    if let Some(until) = args.until {
        let at = DateTime::from_timestamp(until, 0).ok_or_else(|| CliError::Validation {
            field: "until".into(),
            reason: format!("{until} is out of range"),
        })?;
        engine.tick(now.max(at));
        notifications.extend(engine.take_dispatches());
    }

    let report = ReplayReport {
        log: engine.log().records().to_vec(),
        downtimes: engine.downtimes().into_iter().cloned().collect(),
        notifications,
        rejected,
    };
    let out = output::render_single(&global.output, &report, detail, |r| {
        r.log
            .iter()
            .map(|rec| rec.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    })?;
    output::print_output(&out, global.quiet);

    if args.strict && rejected > 0 {
        return Err(CliError::InvalidCommand {
            reason: format!("{rejected} command line(s) rejected during replay"),
        });
    }
    Ok(())
}
