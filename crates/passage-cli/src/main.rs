#![forbid(unsafe_code)]

mod cmd;
mod output;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use passage_core::config::load_config;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cmd::Env;
use output::{report, resolve_output_mode};

#[derive(Parser, Debug)]
#[command(
    name = "passage",
    author,
    version,
    about = "passage: employee in/out-processing checklists",
    long_about = None
)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Config file. Defaults to ./passage.toml, then the user config dir.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Requests",
        about = "Submit a request and generate its checklist",
        after_help = "EXAMPLES:\n    # Submit from a file\n    passage submit form.json\n\n    # Submit from stdin\n    cat form.json | passage submit -"
    )]
    Submit(cmd::submit::SubmitArgs),

    #[command(next_help_heading = "Requests", about = "Show a request and its checklist")]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Requests",
        about = "List requests",
        after_help = "EXAMPLES:\n    # Active outbound requests\n    passage list --status active --type out"
    )]
    List(cmd::list::ListArgs),

    #[command(next_help_heading = "Requests", about = "Edit descriptive request fields")]
    Update(cmd::update::UpdateArgs),

    #[command(next_help_heading = "Requests", about = "Cancel an active request")]
    Cancel(cmd::cancel::CancelArgs),

    #[command(next_help_heading = "Requests", about = "Close an active request")]
    Close(cmd::close::CloseArgs),

    #[command(
        next_help_heading = "Requests",
        about = "Create checklist items missing from a request"
    )]
    Retry(cmd::retry::RetryArgs),

    #[command(
        next_help_heading = "Checklist",
        about = "Complete a checklist item",
        after_help = "EXAMPLES:\n    # Complete item 12\n    passage complete 12 --email ira.tech@example.mil --name \"Ira Tech\""
    )]
    Complete(cmd::complete::CompleteArgs),

    #[command(next_help_heading = "Checklist", about = "Reopen a completed item")]
    Reactivate(cmd::reactivate::ReactivateArgs),

    #[command(next_help_heading = "Catalog", about = "List task templates")]
    Templates(cmd::templates::TemplatesArgs),

    #[command(
        next_help_heading = "Catalog",
        about = "Manage lead role assignments",
        after_help = "EXAMPLES:\n    # Staff the IT role\n    passage leads add it ira.tech@example.mil --name \"Ira Tech\"\n\n    # Show everyone\n    passage leads list"
    )]
    Leads(cmd::leads::LeadsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("PASSAGE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "passage=debug,passage_core=debug,info"
        } else {
            "passage=info,passage_core=info,warn"
        })
    });

    let format = env::var("PASSAGE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output; logs go to stderr.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(command: &Commands, env: &Env) -> anyhow::Result<()> {
    match command {
        Commands::Submit(args) => cmd::submit::run_submit(args, env),
        Commands::Show(args) => cmd::show::run_show(args, env),
        Commands::List(args) => cmd::list::run_list(args, env),
        Commands::Update(args) => cmd::update::run_update(args, env),
        Commands::Cancel(args) => cmd::cancel::run_cancel(args, env),
        Commands::Close(args) => cmd::close::run_close(args, env),
        Commands::Retry(args) => cmd::retry::run_retry(args, env),
        Commands::Complete(args) => cmd::complete::run_complete(args, env),
        Commands::Reactivate(args) => cmd::reactivate::run_reactivate(args, env),
        Commands::Templates(args) => cmd::templates::run_templates(args, env),
        Commands::Leads(args) => cmd::leads::run_leads(args, env),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loaded = match load_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            let output = resolve_output_mode(cli.json, None);
            report(output, &err);
            return ExitCode::FAILURE;
        }
    };
    let output = resolve_output_mode(cli.json, loaded.config.output.as_deref());
    let env = Env {
        config: loaded.config,
        output,
    };

    match run(&cli.command, &env) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(output, &err);
            ExitCode::FAILURE
        }
    }
}
