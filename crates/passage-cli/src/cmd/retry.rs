//! `passage retry` creates checklist items missing from a stored request and
//! activates items whose trigger already finished.

use std::io::{self, Write};

use clap::Args;
use passage_core::model::{ChecklistItem, RequestId};
use serde::Serialize;

use super::{ChecklistSummary, Env, NotifySummary};
use crate::output::{item_pretty, item_row, render_mode};

#[derive(Args, Debug)]
pub struct RetryArgs {
    /// Request id.
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct RetryOutput {
    pub request: RequestId,
    pub checklist: ChecklistSummary,
    pub activated: Vec<ChecklistItem>,
    pub notifications: NotifySummary,
}

pub fn run_retry(args: &RetryArgs, env: &Env) -> anyhow::Result<()> {
    let submission = env.with_service(|service| service.retry_checklist(RequestId(args.id)))?;
    for (template, err) in &submission.reapplied.failures {
        tracing::warn!(%template, error = %err, "still could not activate");
    }
    let out = RetryOutput {
        request: submission.request.id,
        checklist: ChecklistSummary::from(&submission.checklist),
        activated: submission
            .reapplied
            .activated
            .into_values()
            .flatten()
            .collect(),
        notifications: NotifySummary::from(&submission.notifications),
    };
    render_mode(env.output, &out, write_text, write_pretty)
}

fn write_text(out: &RetryOutput, w: &mut dyn Write) -> io::Result<()> {
    for item in out.checklist.created.iter().chain(&out.activated) {
        item_row(w, item)?;
    }
    Ok(())
}

fn write_pretty(out: &RetryOutput, w: &mut dyn Write) -> io::Result<()> {
    if out.checklist.created.is_empty()
        && out.checklist.failed.is_empty()
        && out.activated.is_empty()
    {
        return writeln!(w, "Request #{} already has its full checklist.", out.request);
    }
    for item in &out.checklist.created {
        item_pretty(w, item)?;
    }
    out.checklist.write_human(w)?;
    if !out.activated.is_empty() {
        writeln!(w, "\nActivated (trigger already complete):")?;
        for item in &out.activated {
            item_pretty(w, item)?;
        }
    }
    out.notifications.write_human(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::testutil;

    #[test]
    fn retry_on_complete_checklist_creates_nothing() {
        let (_dir, env) = testutil::env();
        let id = testutil::submitted(&env);
        let before = env.with_service(|service| service.checklist(id)).unwrap();

        run_retry(&RetryArgs { id: id.0 }, &env).unwrap();

        let after = env.with_service(|service| service.checklist(id)).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn retry_refuses_cancelled_request() {
        let (_dir, env) = testutil::env();
        let id = testutil::submitted(&env);
        env.with_service(|service| service.cancel(id, Some("no show")))
            .unwrap();
        assert!(run_retry(&RetryArgs { id: id.0 }, &env).is_err());
    }
}
