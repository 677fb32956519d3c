//! `passage submit` stores a request from a JSON form and builds its checklist.

use std::io::{self, Read as _, Write};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Args;
use passage_core::model::{NewRequest, Request};
use serde::Serialize;

use super::{ChecklistSummary, Env, NotifySummary};
use crate::output::{item_pretty, item_row, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// JSON file with the request form, or `-` for stdin.
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct SubmitOutput {
    pub request: Request,
    pub checklist: ChecklistSummary,
    pub notifications: NotifySummary,
}

fn read_form(path: &Path) -> anyhow::Result<NewRequest> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request form from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request form {}", path.display()))?
    };
    serde_json::from_str(&text).context("Request form is not a valid submission")
}

pub fn run_submit(args: &SubmitArgs, env: &Env) -> anyhow::Result<()> {
    let new = read_form(&args.file)?;
    let submission = env.with_service(|service| service.submit(new))?;
    let out = SubmitOutput {
        request: submission.request,
        checklist: ChecklistSummary::from(&submission.checklist),
        notifications: NotifySummary::from(&submission.notifications),
    };
    render_mode(env.output, &out, write_text, write_pretty)
}

fn write_text(out: &SubmitOutput, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "request\t{}", out.request.id)?;
    for item in &out.checklist.created {
        item_row(w, item)?;
    }
    for failed in &out.checklist.failed {
        writeln!(w, "failed\t{}\t{}", failed.template, failed.error)?;
    }
    Ok(())
}

fn write_pretty(out: &SubmitOutput, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(
        w,
        &format!("Submitted request #{} for {}", out.request.id, out.request.employee_name),
    )?;
    pretty_kv(w, "Type", out.request.request_type.as_str())?;
    pretty_kv(w, "Employment", out.request.employment_type.as_str())?;
    pretty_kv(w, "Supervisor", &out.request.supervisor.email)?;
    writeln!(w)?;
    for item in &out.checklist.created {
        item_pretty(w, item)?;
    }
    writeln!(w)?;
    out.checklist.write_human(w)?;
    out.notifications.write_human(w)
}
