pub mod cancel;
pub mod close;
pub mod complete;
pub mod leads;
pub mod list;
pub mod reactivate;
pub mod retry;
pub mod show;
pub mod submit;
pub mod templates;
pub mod update;

use std::io::{self, Write};

use anyhow::Context as _;
use passage_core::config::Config;
use passage_core::error::ProcessingError;
use passage_core::leads::StoreLeads;
use passage_core::materialize::MaterializeReport;
use passage_core::notify::{Notifier, NotifyReport, OutboxMailer};
use passage_core::service::ProcessingService;
use passage_core::store::SqliteStore;
use passage_core::templates::Registry;
use serde::Serialize;

use crate::output::{CliError, OutputMode, fail};

/// Loaded config plus the resolved output mode, shared by every command.
pub struct Env {
    pub config: Config,
    pub output: OutputMode,
}

impl Env {
    pub fn open_store(&self) -> anyhow::Result<SqliteStore> {
        let path = &self.config.store.path;
        tracing::debug!(path = %path.display(), "opening store");
        SqliteStore::open(path).with_context(|| format!("Failed to open store {}", path.display()))
    }

    /// Build the processing service over the configured store and outbox,
    /// run `f`, and render any library error before returning it.
    pub fn with_service<T>(
        &self,
        f: impl FnOnce(&ProcessingService<'_>) -> Result<T, ProcessingError>,
    ) -> anyhow::Result<T> {
        let store = self.open_store()?;
        let leads = StoreLeads::new(&store);
        let mailer = OutboxMailer::new(&self.config.notify.outbox, self.config.notify.from.clone());
        let notifier = Notifier::new(&mailer, &leads, self.config.notify.clone());
        let service = ProcessingService::new(
            &store,
            Registry::builtin(),
            notifier,
            self.config.workflow.clone(),
        );
        f(&service).map_err(|err| fail(self.output, CliError::from(&err)))
    }
}

#[derive(Debug, Serialize)]
pub struct FailedNotice {
    pub subject: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct NotifySummary {
    pub sent: usize,
    pub failed: Vec<FailedNotice>,
}

impl From<&NotifyReport> for NotifySummary {
    fn from(report: &NotifyReport) -> Self {
        Self {
            sent: report.sent.len(),
            failed: report
                .failures
                .iter()
                .map(|failure| FailedNotice {
                    subject: failure.subject.clone(),
                    error: failure.error.to_string(),
                })
                .collect(),
        }
    }
}

impl NotifySummary {
    pub fn write_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "notifications: {} sent", self.sent)?;
        for failed in &self.failed {
            writeln!(w, "  not delivered: {} ({})", failed.subject, failed.error)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct FailedItem {
    pub template: String,
    pub error: String,
}

/// Serializable view of a materialization.
#[derive(Debug, Serialize)]
pub struct ChecklistSummary {
    pub created: Vec<passage_core::model::ChecklistItem>,
    pub failed: Vec<FailedItem>,
}

impl From<&MaterializeReport> for ChecklistSummary {
    fn from(report: &MaterializeReport) -> Self {
        Self {
            created: report.created().cloned().collect(),
            failed: report
                .failures()
                .map(|(template, error)| FailedItem {
                    template: template.to_string(),
                    error: error.to_string(),
                })
                .collect(),
        }
    }
}

impl ChecklistSummary {
    pub fn write_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "checklist: {} items created", self.created.len())?;
        for failed in &self.failed {
            writeln!(w, "  failed: {} ({})", failed.template, failed.error)?;
        }
        if !self.failed.is_empty() {
            writeln!(w, "  run `passage retry <request-id>` to create the missing items")?;
        }
        Ok(())
    }
}
