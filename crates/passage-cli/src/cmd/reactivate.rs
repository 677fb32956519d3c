//! `passage reactivate` reopens a completed item. Nothing cascades.

use std::io::{self, Write};

use clap::Args;
use passage_core::model::{ChecklistItem, ItemId};

use super::Env;
use crate::output::{item_row, render_mode};

#[derive(Args, Debug)]
pub struct ReactivateArgs {
    /// Checklist item id.
    pub id: i64,
}

pub fn run_reactivate(args: &ReactivateArgs, env: &Env) -> anyhow::Result<()> {
    let item = env.with_service(|service| service.reactivate_item(ItemId(args.id)))?;
    render_mode(env.output, &item, |item, w| item_row(w, item), write_pretty)
}

fn write_pretty(item: &ChecklistItem, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "Reopened #{}: {}", item.id, item.title)
}
