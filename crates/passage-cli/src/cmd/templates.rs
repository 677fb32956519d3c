//! `passage templates` lists the built-in task catalog.

use std::io::{self, Write};

use clap::Args;
use passage_core::model::{RequestType, Role};
use passage_core::templates::{Registry, Template};

use super::Env;
use crate::output::{pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct TemplatesArgs {
    /// Only templates for this request type (in, out).
    #[arg(long = "type", value_name = "TYPE")]
    pub request_type: Option<RequestType>,

    /// Only templates led by this role.
    #[arg(long)]
    pub lead: Option<Role>,
}

fn selected(args: &TemplatesArgs, registry: &Registry) -> Vec<Template> {
    registry
        .all()
        .iter()
        .filter(|t| args.request_type.is_none_or(|rt| t.request_type == rt))
        .filter(|t| args.lead.is_none_or(|lead| t.lead == lead))
        .cloned()
        .collect()
}

pub fn run_templates(args: &TemplatesArgs, env: &Env) -> anyhow::Result<()> {
    let templates = selected(args, Registry::builtin());
    render_mode(env.output, &templates, write_text, write_pretty)
}

fn prerequisites(template: &Template) -> String {
    template
        .prerequisites
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn write_text(templates: &Vec<Template>, w: &mut dyn Write) -> io::Result<()> {
    for t in templates {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            t.id,
            t.request_type,
            t.lead,
            prerequisites(t),
            t.title
        )?;
    }
    Ok(())
}

fn write_pretty(templates: &Vec<Template>, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Templates ({})", templates.len()))?;
    for t in templates {
        writeln!(w, "{:<4} {:<11} {}", t.request_type.as_str(), t.lead.display_name(), t.title)?;
        writeln!(w, "     id: {}", t.id)?;
        if !t.prerequisites.is_empty() {
            writeln!(w, "     after: {}", prerequisites(t))?;
        }
    }
    Ok(())
}
