//! `vigil parse`: validate one external command line.

use std::fmt::Write;

use vigil_core::command::{self, ExternalCommand, ParsedCommand};

use crate::cli::{GlobalOpts, ParseArgs};
use crate::error::CliError;
use crate::output;

fn detail(parsed: &ParsedCommand) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Directive:  {}", parsed.command.name());
    let _ = writeln!(out, "Submitted:  {}", parsed.submitted_at.to_rfc3339());
    match &parsed.command {
        ExternalCommand::ScheduleDowntime(req) => {
            let _ = writeln!(out, "Target:     {}", req.item);
            let _ = writeln!(
                out,
                "Window:     {} - {}",
                req.start_time.to_rfc3339(),
                req.end_time.to_rfc3339()
            );
            let _ = writeln!(
                out,
                "Type:       {}",
                if req.fixed { "fixed" } else { "flexible" }
            );
            let _ = writeln!(out, "Duration:   {}s", req.duration_secs);
            if let Some(trigger) = req.trigger_id {
                let _ = writeln!(out, "Trigger:    {trigger}");
            }
            let _ = writeln!(out, "Author:     {}", req.author);
            let _ = write!(out, "Comment:    {}", req.comment);
        }
        ExternalCommand::DeleteDowntime { kind, id } => {
            let _ = writeln!(out, "Kind:       {kind}");
            let _ = write!(out, "Downtime:   {id}");
        }
        ExternalCommand::ProcessCheckResult {
            item,
            state,
            output,
        } => {
            let _ = writeln!(out, "Target:     {item}");
            let _ = writeln!(out, "State:      {state}");
            let _ = write!(out, "Output:     {output}");
        }
    }
    out
}

pub fn handle(args: &ParseArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let parsed = command::parse(&args.line)?;
    let out = output::render_single(&global.output, &parsed, detail, |p| {
        p.command.name().to_owned()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
