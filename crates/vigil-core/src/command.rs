// ── External command processor ──
//
// Parses `[<ts>] DIRECTIVE;field;...` lines submitted by operators and
// tools. Parsing is pure: resolving targets and applying the command is
// the engine's job.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CoreError;
use crate::model::{DowntimeId, DowntimeRequest, ItemKind, ItemRef, State};

/// A decoded external command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCommand {
    /// Timestamp in the leading brackets.
    pub submitted_at: DateTime<Utc>,
    pub command: ExternalCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "directive", rename_all = "snake_case")]
pub enum ExternalCommand {
    /// `SCHEDULE_HOST_DOWNTIME` / `SCHEDULE_SVC_DOWNTIME`
    ScheduleDowntime(DowntimeRequest),
    /// `DEL_HOST_DOWNTIME` / `DEL_SVC_DOWNTIME`
    DeleteDowntime { kind: ItemKind, id: DowntimeId },
    /// `PROCESS_HOST_CHECK_RESULT` / `PROCESS_SERVICE_CHECK_RESULT`
    ProcessCheckResult {
        item: ItemRef,
        state: State,
        output: String,
    },
}

impl ExternalCommand {
    /// Directive name as written on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ScheduleDowntime(req) => match req.item.kind() {
                ItemKind::Host => "SCHEDULE_HOST_DOWNTIME",
                ItemKind::Service => "SCHEDULE_SVC_DOWNTIME",
            },
            Self::DeleteDowntime { kind, .. } => match kind {
                ItemKind::Host => "DEL_HOST_DOWNTIME",
                ItemKind::Service => "DEL_SVC_DOWNTIME",
            },
            Self::ProcessCheckResult { item, .. } => match item.kind() {
                ItemKind::Host => "PROCESS_HOST_CHECK_RESULT",
                ItemKind::Service => "PROCESS_SERVICE_CHECK_RESULT",
            },
        }
    }
}

/// Parse one external command line.
///
/// The final field (comment or plugin output) is taken verbatim and may
/// contain `;`. A trigger id of `0` or empty means "no trigger".
pub fn parse(line: &str) -> Result<ParsedCommand, CoreError> {
    let line = line.trim();
    let rest = line
        .strip_prefix('[')
        .ok_or_else(|| CoreError::malformed("missing [timestamp] prefix"))?;
    let (ts, body) = rest
        .split_once(']')
        .ok_or_else(|| CoreError::malformed("unterminated [timestamp] prefix"))?;
    let submitted_at = timestamp(ts, "timestamp")?;

    let body = body.trim_start();
    let (name, args) = body.split_once(';').unwrap_or((body, ""));

    let command = match name {
        "SCHEDULE_HOST_DOWNTIME" => {
            let f = fields(name, args, 8)?;
            schedule(ItemRef::host(name_field(f[0], "host")?), &f[1..])?
        }
        "SCHEDULE_SVC_DOWNTIME" => {
            let f = fields(name, args, 9)?;
            let item = ItemRef::service(name_field(f[0], "host")?, name_field(f[1], "service")?);
            schedule(item, &f[2..])?
        }
        "DEL_HOST_DOWNTIME" | "DEL_SVC_DOWNTIME" => {
            let f = fields(name, args, 1)?;
            let kind = if name == "DEL_HOST_DOWNTIME" {
                ItemKind::Host
            } else {
                ItemKind::Service
            };
            let id = f[0]
                .parse::<DowntimeId>()
                .map_err(|e| CoreError::malformed(format!("invalid downtime id '{}': {e}", f[0])))?;
            ExternalCommand::DeleteDowntime { kind, id }
        }
        "PROCESS_HOST_CHECK_RESULT" => {
            let f = fields(name, args, 3)?;
            check_result(ItemRef::host(name_field(f[0], "host")?), f[1], f[2])?
        }
        "PROCESS_SERVICE_CHECK_RESULT" => {
            let f = fields(name, args, 4)?;
            let item = ItemRef::service(name_field(f[0], "host")?, name_field(f[1], "service")?);
            check_result(item, f[2], f[3])?
        }
        "" => return Err(CoreError::malformed("missing command name")),
        other => return Err(CoreError::malformed(format!("unknown command '{other}'"))),
    };

    Ok(ParsedCommand {
        submitted_at,
        command,
    })
}

// ── Field helpers ───────────────────────────────────────────────────

/// Split `args` into exactly `count` fields; the last keeps any `;`.
fn fields<'a>(name: &str, args: &'a str, count: usize) -> Result<Vec<&'a str>, CoreError> {
    let parts: Vec<&str> = args.splitn(count, ';').collect();
    if parts.len() != count {
        return Err(CoreError::malformed(format!(
            "{name} expects {count} fields, got {}",
            parts.len()
        )));
    }
    Ok(parts)
}

fn name_field<'a>(value: &'a str, field: &str) -> Result<&'a str, CoreError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::malformed(format!("empty {field} name")));
    }
    Ok(value)
}

fn timestamp(value: &str, field: &str) -> Result<DateTime<Utc>, CoreError> {
    let secs = value
        .trim()
        .parse::<i64>()
        .map_err(|_| CoreError::malformed(format!("{field} '{value}' is not a unix timestamp")))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| CoreError::malformed(format!("{field} {secs} out of range")))
}

/// `start;end;fixed;trigger_id;duration;author;comment`
fn schedule(item: ItemRef, f: &[&str]) -> Result<ExternalCommand, CoreError> {
    let start_time = timestamp(f[0], "start_time")?;
    let end_time = timestamp(f[1], "end_time")?;
    let fixed = match f[2].trim() {
        "1" => true,
        "0" => false,
        other => {
            return Err(CoreError::malformed(format!(
                "fixed flag must be 0 or 1, got '{other}'"
            )));
        }
    };
    let trigger_id = match f[3].trim() {
        "" | "0" => None,
        id => Some(id.parse::<DowntimeId>().map_err(|e| {
            CoreError::malformed(format!("invalid trigger id '{id}': {e}"))
        })?),
    };
    let duration_secs = f[4]
        .trim()
        .parse::<i64>()
        .map_err(|_| CoreError::malformed(format!("duration '{}' is not an integer", f[4])))?;

    Ok(ExternalCommand::ScheduleDowntime(DowntimeRequest {
        item,
        start_time,
        end_time,
        fixed,
        trigger_id,
        duration_secs,
        author: f[5].trim().to_owned(),
        comment: f[6].to_owned(),
    }))
}

fn check_result(item: ItemRef, code: &str, output: &str) -> Result<ExternalCommand, CoreError> {
    let state = code
        .trim()
        .parse::<u8>()
        .ok()
        .and_then(|c| State::from_code(item.kind(), c))
        .ok_or_else(|| {
            CoreError::malformed(format!("invalid {} state code '{code}'", item.kind()))
        })?;
    Ok(ExternalCommand::ProcessCheckResult {
        item,
        state,
        output: output.to_owned(),
    })
}
