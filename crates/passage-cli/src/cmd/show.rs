//! `passage show` prints one request and its checklist.

use std::io::{self, Write};

use clap::Args;
use passage_core::model::{ChecklistItem, Request, RequestId};
use serde::Serialize;

use super::Env;
use crate::output::{item_pretty, item_row, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Request id.
    pub id: i64,

    /// Only list items that are active and not yet completed.
    #[arg(long)]
    pub outstanding: bool,
}

#[derive(Debug, Serialize)]
pub struct ShowOutput {
    pub request: Request,
    pub checklist: Vec<ChecklistItem>,
}

pub fn run_show(args: &ShowArgs, env: &Env) -> anyhow::Result<()> {
    let id = RequestId(args.id);
    let (request, mut checklist) =
        env.with_service(|service| Ok((service.request(id)?, service.checklist(id)?)))?;
    if args.outstanding {
        checklist.retain(ChecklistItem::is_outstanding);
    }
    render_mode(
        env.output,
        &ShowOutput { request, checklist },
        write_text,
        write_pretty,
    )
}

fn write_text(out: &ShowOutput, w: &mut dyn Write) -> io::Result<()> {
    let r = &out.request;
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}",
        r.id, r.request_type, r.status, r.employment_type, r.employee_name
    )?;
    for item in &out.checklist {
        item_row(w, item)?;
    }
    Ok(())
}

fn write_pretty(out: &ShowOutput, w: &mut dyn Write) -> io::Result<()> {
    let r = &out.request;
    pretty_section(w, &format!("Request #{}: {}", r.id, r.employee_name))?;
    pretty_kv(w, "Type", r.request_type.as_str())?;
    pretty_kv(w, "Status", r.status.as_str())?;
    pretty_kv(w, "Employment", r.employment_type.as_str())?;
    pretty_kv(
        w,
        "Supervisor",
        format!("{} <{}>", r.supervisor.name, r.supervisor.email),
    )?;
    if !r.office_symbol.is_empty() {
        pretty_kv(w, "Office", &r.office_symbol)?;
    }
    if let Some(reason) = r.exit_reason {
        pretty_kv(w, "Exit reason", reason.label())?;
    }
    if let Some(reason) = &r.cancel_reason {
        pretty_kv(w, "Cancelled", reason)?;
    }
    pretty_kv(w, "Created", r.created_at.format("%Y-%m-%d %H:%M").to_string())?;

    let done = out.checklist.iter().filter(|i| i.is_completed()).count();
    writeln!(w)?;
    writeln!(w, "Checklist ({done}/{} complete)", out.checklist.len())?;
    for item in &out.checklist {
        item_pretty(w, item)?;
    }
    Ok(())
}
