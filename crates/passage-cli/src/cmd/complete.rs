//! `passage complete` marks a checklist item done and runs the cascade.

use std::io::{self, Write};

use clap::Args;
use passage_core::model::{ChecklistItem, ItemId, Person, Request};
use serde::Serialize;

use super::{Env, NotifySummary};
use crate::output::{item_pretty, item_row, render_mode};

#[derive(Args, Debug)]
pub struct CompleteArgs {
    /// Checklist item id.
    pub id: i64,

    /// Address of the person completing the item.
    #[arg(long)]
    pub email: String,

    /// Display name of the person completing the item. Defaults to the email.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CascadeFailure {
    pub template: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct CompleteOutput {
    pub item: ChecklistItem,
    pub activated: Vec<ChecklistItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cascade_failures: Vec<CascadeFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed: Option<Request>,
    pub notifications: NotifySummary,
}

pub fn run_complete(args: &CompleteArgs, env: &Env) -> anyhow::Result<()> {
    let by = Person::new(
        args.name.clone().unwrap_or_else(|| args.email.clone()),
        args.email.clone(),
    );
    let result = env.with_service(|service| service.complete_item(ItemId(args.id), &by))?;
    let completion = result.completion;
    let out = CompleteOutput {
        item: completion.item,
        activated: completion.activated.into_values().flatten().collect(),
        cascade_failures: completion
            .cascade_failures
            .iter()
            .map(|(template, err)| CascadeFailure {
                template: template.to_string(),
                error: err.to_string(),
            })
            .collect(),
        closed: result.closed,
        notifications: NotifySummary::from(&result.notifications),
    };
    render_mode(env.output, &out, write_text, write_pretty)
}

fn write_text(out: &CompleteOutput, w: &mut dyn Write) -> io::Result<()> {
    item_row(w, &out.item)?;
    for item in &out.activated {
        item_row(w, item)?;
    }
    Ok(())
}

fn write_pretty(out: &CompleteOutput, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "Completed #{}: {}", out.item.id, out.item.title)?;
    if !out.activated.is_empty() {
        writeln!(w, "\nNow actionable:")?;
        for item in &out.activated {
            item_pretty(w, item)?;
        }
    }
    for failed in &out.cascade_failures {
        writeln!(w, "  could not activate {} ({})", failed.template, failed.error)?;
    }
    if !out.cascade_failures.is_empty() {
        writeln!(w, "  run `passage retry {}` to activate them", out.item.request_id)?;
    }
    if let Some(request) = &out.closed {
        writeln!(w, "\nChecklist complete; request #{} closed.", request.id)?;
    }
    out.notifications.write_human(w)
}
