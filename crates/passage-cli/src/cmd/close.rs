//! `passage close` marks an active request finished.

use clap::Args;
use passage_core::model::RequestId;

use super::cancel::{StatusOutput, write_status_pretty, write_status_text};
use super::{Env, NotifySummary};
use crate::output::render_mode;

#[derive(Args, Debug)]
pub struct CloseArgs {
    /// Request id.
    pub id: i64,
}

pub fn run_close(args: &CloseArgs, env: &Env) -> anyhow::Result<()> {
    let change = env.with_service(|service| service.close(RequestId(args.id)))?;
    let out = StatusOutput {
        request: change.request,
        notifications: NotifySummary::from(&change.notifications),
    };
    render_mode(env.output, &out, write_status_text, write_status_pretty)
}
