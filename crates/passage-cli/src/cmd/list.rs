//! `passage list` shows requests, newest first.

use std::io::{self, Write};

use clap::Args;
use passage_core::model::{Request, RequestStatus, RequestType};
use passage_core::store::RequestFilter;

use super::Env;
use crate::output::{pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Filter by status (active, cancelled, closed).
    #[arg(long)]
    pub status: Option<RequestStatus>,

    /// Filter by request type (in, out).
    #[arg(long = "type", value_name = "TYPE")]
    pub request_type: Option<RequestType>,

    /// Only requests supervised by this address.
    #[arg(long)]
    pub supervisor: Option<String>,

    /// Maximum number of requests to show.
    #[arg(long)]
    pub limit: Option<u32>,
}

impl ListArgs {
    fn filter(&self) -> RequestFilter {
        RequestFilter {
            status: self.status,
            request_type: self.request_type,
            supervisor_email: self.supervisor.clone(),
            limit: self.limit,
        }
    }
}

pub fn run_list(args: &ListArgs, env: &Env) -> anyhow::Result<()> {
    let filter = args.filter();
    let requests = env.with_service(|service| service.requests(&filter))?;
    render_mode(env.output, &requests, write_text, write_pretty)
}

fn write_text(requests: &Vec<Request>, w: &mut dyn Write) -> io::Result<()> {
    for r in requests {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            r.id, r.request_type, r.status, r.employment_type, r.employee_name
        )?;
    }
    Ok(())
}

fn write_pretty(requests: &Vec<Request>, w: &mut dyn Write) -> io::Result<()> {
    if requests.is_empty() {
        return writeln!(w, "No requests found.");
    }
    pretty_section(w, &format!("Requests ({})", requests.len()))?;
    for r in requests {
        writeln!(
            w,
            "#{:<5} {:<4} {:<10} {:<11} {}",
            r.id,
            r.request_type.as_str(),
            r.status.as_str(),
            r.employment_type.as_str(),
            r.employee_name
        )?;
    }
    Ok(())
}
