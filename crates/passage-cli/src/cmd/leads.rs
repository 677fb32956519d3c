//! `passage leads` manages who staffs each lead role.

use std::io::{self, Write};

use clap::{Args, Subcommand};
use passage_core::leads::StoreLeads;
use passage_core::model::{Person, Role};
use passage_core::store::LeadAssignment;
use serde::Serialize;

use super::Env;
use crate::output::{CliError, fail, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct LeadsArgs {
    #[command(subcommand)]
    pub command: LeadsCommand,
}

#[derive(Subcommand, Debug)]
pub enum LeadsCommand {
    /// Assign a person to a role.
    Add {
        role: Role,
        email: String,
        /// Display name. Defaults to the email.
        #[arg(long)]
        name: Option<String>,
    },
    /// Remove a person from a role.
    #[command(alias = "remove")]
    Rm { role: Role, email: String },
    /// List assignments.
    #[command(alias = "ls")]
    List {
        /// Only this role.
        #[arg(long)]
        role: Option<Role>,
    },
}

#[derive(Debug, Serialize)]
struct Removed {
    role: Role,
    email: String,
    removed: bool,
}

pub fn run_leads(args: &LeadsArgs, env: &Env) -> anyhow::Result<()> {
    let store = env.open_store()?;
    let leads = StoreLeads::new(&store);
    let output = env.output;

    match &args.command {
        LeadsCommand::Add { role, email, name } => {
            let person = Person::new(name.clone().unwrap_or_else(|| email.clone()), email.clone());
            let assignment = LeadAssignment {
                role: *role,
                person: person.clone(),
            };
            leads
                .assign(*role, person)
                .map_err(|err| fail(output, CliError::from(&err)))?;
            render_mode(output, &assignment, write_assignment, write_assignment)
        }
        LeadsCommand::Rm { role, email } => {
            let removed = leads
                .remove(*role, email)
                .map_err(|err| fail(output, CliError::from(&err)))?;
            if !removed {
                return Err(fail(
                    output,
                    CliError::new(format!("{email} is not assigned to the {role} role")),
                ));
            }
            let out = Removed {
                role: *role,
                email: email.clone(),
                removed,
            };
            render_mode(
                output,
                &out,
                |out, w| writeln!(w, "{}\t{}", out.role, out.email),
                |out, w| writeln!(w, "Removed {} from {}", out.email, out.role.display_name()),
            )
        }
        LeadsCommand::List { role } => {
            let assignments = leads
                .list(*role)
                .map_err(|err| fail(output, CliError::from(&err)))?;
            render_mode(output, &assignments, write_list_text, write_list_pretty)
        }
    }
}

fn write_assignment(a: &LeadAssignment, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}\t{}\t{}", a.role, a.person.email, a.person.name)
}

fn write_list_text(assignments: &Vec<LeadAssignment>, w: &mut dyn Write) -> io::Result<()> {
    for a in assignments {
        write_assignment(a, w)?;
    }
    Ok(())
}

fn write_list_pretty(assignments: &Vec<LeadAssignment>, w: &mut dyn Write) -> io::Result<()> {
    if assignments.is_empty() {
        return writeln!(w, "No leads assigned.");
    }
    pretty_section(w, "Lead assignments")?;
    for a in assignments {
        writeln!(
            w,
            "{:<18} {} <{}>",
            a.role.display_name(),
            a.person.name,
            a.person.email
        )?;
    }
    Ok(())
}
