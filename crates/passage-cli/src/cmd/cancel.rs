//! `passage cancel` withdraws an active request and tells everyone involved.

use std::io::{self, Write};

use clap::Args;
use passage_core::model::{Request, RequestId};
use serde::Serialize;

use super::{Env, NotifySummary};
use crate::output::render_mode;

#[derive(Args, Debug)]
pub struct CancelArgs {
    /// Request id.
    pub id: i64,

    /// Why the request was cancelled. Included in the notice.
    #[arg(long)]
    pub reason: Option<String>,
}

/// Shared output of `cancel` and `close`.
#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub request: Request,
    pub notifications: NotifySummary,
}

pub(crate) fn write_status_text(out: &StatusOutput, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}\t{}", out.request.id, out.request.status)
}

pub(crate) fn write_status_pretty(out: &StatusOutput, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "Request #{} for {} is now {}.",
        out.request.id, out.request.employee_name, out.request.status
    )?;
    out.notifications.write_human(w)
}

pub fn run_cancel(args: &CancelArgs, env: &Env) -> anyhow::Result<()> {
    let change =
        env.with_service(|service| service.cancel(RequestId(args.id), args.reason.as_deref()))?;
    let out = StatusOutput {
        request: change.request,
        notifications: NotifySummary::from(&change.notifications),
    };
    render_mode(env.output, &out, write_status_text, write_status_pretty)
}
