//! `passage update` edits descriptive fields of an active request.
//!
//! Eligibility answers cannot change after submission; the checklist stays
//! as generated.

use std::io::{self, Write};

use clap::Args;
use passage_core::model::{Person, Request, RequestId, RequestPatch, WorkLocation};

use super::Env;
use crate::output::{pretty_kv, render_mode};

#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    /// Request id.
    pub id: i64,

    #[arg(long)]
    pub employee_name: Option<String>,

    /// Employee email; pairs with --employee-name or the current name.
    #[arg(long)]
    pub employee_email: Option<String>,

    #[arg(long)]
    pub supervisor_name: Option<String>,

    #[arg(long)]
    pub supervisor_email: Option<String>,

    #[arg(long)]
    pub office_symbol: Option<String>,

    #[arg(long)]
    pub position: Option<String>,

    #[arg(long)]
    pub grade_rank: Option<String>,

    /// local or remote.
    #[arg(long)]
    pub work_location: Option<WorkLocation>,

    /// Expected arrival, YYYY-MM-DD.
    #[arg(long)]
    pub eta: Option<chrono::NaiveDate>,

    /// Departure date, YYYY-MM-DD.
    #[arg(long)]
    pub exit_date: Option<chrono::NaiveDate>,
}

fn person(name: Option<&str>, email: Option<&str>, current: Option<&Person>) -> Option<Person> {
    if name.is_none() && email.is_none() {
        return None;
    }
    let name = name.or_else(|| current.map(|p| p.name.as_str()));
    let email = email.or_else(|| current.map(|p| p.email.as_str()));
    Some(Person::new(name.unwrap_or_default(), email.unwrap_or_default()))
}

impl UpdateArgs {
    fn patch(&self, current: &Request) -> RequestPatch {
        RequestPatch {
            employee_name: self.employee_name.clone(),
            employee: self.employee_email.as_deref().and_then(|email| {
                person(
                    Some(
                        self.employee_name
                            .as_deref()
                            .unwrap_or(&current.employee_name),
                    ),
                    Some(email),
                    current.employee.as_ref(),
                )
            }),
            supervisor: person(
                self.supervisor_name.as_deref(),
                self.supervisor_email.as_deref(),
                Some(&current.supervisor),
            ),
            office_symbol: self.office_symbol.clone(),
            position: self.position.clone(),
            grade_rank: self.grade_rank.clone(),
            work_location: self.work_location,
            eta: self.eta,
            exit_date: self.exit_date,
            ..RequestPatch::default()
        }
    }
}

pub fn run_update(args: &UpdateArgs, env: &Env) -> anyhow::Result<()> {
    let id = RequestId(args.id);
    let request = env.with_service(|service| {
        let current = service.request(id)?;
        service.update_request(id, args.patch(&current))
    })?;
    render_mode(env.output, &request, write_text, write_pretty)
}

fn write_text(request: &Request, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}\t{}\t{}", request.id, request.status, request.employee_name)
}

fn write_pretty(request: &Request, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "Updated request #{}", request.id)?;
    pretty_kv(w, "Employee", &request.employee_name)?;
    pretty_kv(
        w,
        "Supervisor",
        format!("{} <{}>", request.supervisor.name, request.supervisor.email),
    )?;
    if !request.office_symbol.is_empty() {
        pretty_kv(w, "Office", &request.office_symbol)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::testutil;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: UpdateArgs,
    }

    #[test]
    fn update_args_parse_dates_and_location() {
        let w = Wrapper::parse_from([
            "test",
            "2",
            "--eta",
            "2026-11-02",
            "--work-location",
            "Remote",
        ]);
        assert_eq!(w.args.id, 2);
        assert_eq!(
            w.args.eta,
            chrono::NaiveDate::from_ymd_opt(2026, 11, 2)
        );
        assert_eq!(w.args.work_location, Some(WorkLocation::Remote));
        assert!(Wrapper::try_parse_from(["test", "2", "--eta", "soon"]).is_err());
    }

    #[test]
    fn update_changes_supervisor_email_only() {
        let (_dir, env) = testutil::env();
        let id = testutil::submitted(&env);
        let args = UpdateArgs {
            id: id.0,
            supervisor_email: Some("new.lead@example.mil".to_string()),
            ..UpdateArgs::default()
        };
        run_update(&args, &env).unwrap();

        let request = env.with_service(|service| service.request(id)).unwrap();
        assert_eq!(request.supervisor.name, "Sam Lead");
        assert_eq!(request.supervisor.email, "new.lead@example.mil");
    }

    #[test]
    fn update_rejects_blank_name() {
        let (_dir, env) = testutil::env();
        let id = testutil::submitted(&env);
        let args = UpdateArgs {
            id: id.0,
            employee_name: Some("  ".to_string()),
            ..UpdateArgs::default()
        };
        assert!(run_update(&args, &env).is_err());
    }
}
