//! Shared output layer for pretty/text/JSON parity across CLI commands.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--json` flag
//! 2. `FORMAT` env var (`pretty` | `text` | `json`)
//! 3. `output` in the config file
//! 4. [`OutputMode::Pretty`] if stdout is a TTY, [`OutputMode::Text`] if piped

use passage_core::error::{ErrorCode, ProcessingError};
use passage_core::leads::LeadError;
use passage_core::model::ChecklistItem;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-optimized output (sections, framing).
    Pretty,
    /// Tab-separated rows for scripts and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

fn parse_mode(raw: &str) -> Option<OutputMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Some(OutputMode::Json),
        "text" => Some(OutputMode::Text),
        "pretty" => Some(OutputMode::Pretty),
        _ => None,
    }
}

fn resolve_output_mode_inner(
    json_flag: bool,
    format_env: Option<&str>,
    config_output: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }
    if let Some(mode) = format_env.and_then(parse_mode) {
        return mode;
    }
    if let Some(mode) = config_output.and_then(parse_mode) {
        return mode;
    }
    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

pub fn resolve_output_mode(json_flag: bool, config_output: Option<&str>) -> OutputMode {
    let env_val = std::env::var("FORMAT").ok();
    let is_tty = io::stdout().is_terminal();
    resolve_output_mode_inner(json_flag, env_val.as_deref(), config_output, is_tty)
}

/// Render a serializable value with explicit text and pretty renderers.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// One checklist row: `id  state  lead  template  title`.
pub fn item_row(w: &mut dyn Write, item: &ChecklistItem) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}",
        item.id,
        item.state(),
        item.lead,
        item.template,
        item.title
    )
}

pub fn item_pretty(w: &mut dyn Write, item: &ChecklistItem) -> io::Result<()> {
    let mark = match item.state() {
        passage_core::model::ItemState::Completed => "[x]",
        passage_core::model::ItemState::Active => "[ ]",
        passage_core::model::ItemState::Inactive => "[-]",
    };
    writeln!(
        w,
        "{mark} #{:<5} {:<11} {}",
        item.id,
        item.lead.display_name(),
        item.title
    )
}

/// A structured error with optional hint and code.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
        }
    }

    fn coded(message: String, code: ErrorCode) -> Self {
        Self {
            message,
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }
}

impl From<&ProcessingError> for CliError {
    fn from(err: &ProcessingError) -> Self {
        Self::coded(err.to_string(), err.code())
    }
}

impl From<&LeadError> for CliError {
    fn from(err: &LeadError) -> Self {
        Self::coded(err.to_string(), err.code())
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({ "error": error });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(suggestion) = &error.suggestion {
                writeln!(out, "  hint: {suggestion}")?;
            }
        }
    }
    Ok(())
}

/// Marks a failure that has already been written to stderr.
#[derive(Debug)]
pub struct Reported(pub String);

impl std::fmt::Display for Reported {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Reported {}

/// Render `error` and turn it into the command's failure.
pub fn fail(mode: OutputMode, error: CliError) -> anyhow::Error {
    if let Err(render_err) = render_error(mode, &error) {
        return render_err;
    }
    anyhow::Error::new(Reported(error.message))
}

/// Render a failure that has not been shown yet. Returns `false` if nothing
/// needed rendering.
pub fn report(mode: OutputMode, err: &anyhow::Error) -> bool {
    if err.downcast_ref::<Reported>().is_some() {
        return false;
    }
    render_error(mode, &CliError::new(format!("{err:#}"))).is_ok()
}
