//! Mail transports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use super::Email;
use crate::leads::LeadError;

/// Acknowledgement from a transport that it accepted a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: String,
    pub accepted_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("no recipients resolved for '{subject}'")]
    NoRecipients { subject: String },

    #[error("could not resolve recipients: {0}")]
    Recipients(#[source] LeadError),

    #[error("transport rejected message: {0}")]
    Rejected(String),

    #[error("outbox write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outbound mail transport.
pub trait Mailer {
    /// Hand one message to the transport. No retries.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if the transport did not accept the message.
    fn send(&self, email: &Email) -> Result<DeliveryReceipt, DeliveryError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    sent: Vec<Email>,
    failing: bool,
    reject_address: Option<String>,
}

/// Records messages in memory. Used by tests and the dev store setup.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    state: Mutex<MemoryState>,
}

impl MemoryMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every message while set.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Reject messages addressed (to or cc) to `address`.
    pub fn reject_address(&self, address: &str) {
        self.lock().reject_address = Some(address.trim().to_ascii_lowercase());
    }

    /// Messages accepted so far, in send order.
    #[must_use]
    pub fn sent(&self) -> Vec<Email> {
        self.lock().sent.clone()
    }

    /// Drain accepted messages.
    pub fn take(&self) -> Vec<Email> {
        std::mem::take(&mut self.lock().sent)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, email: &Email) -> Result<DeliveryReceipt, DeliveryError> {
        let mut state = self.lock();
        if state.failing {
            return Err(DeliveryError::Rejected("mailer offline".to_string()));
        }
        if let Some(blocked) = &state.reject_address
            && email
                .recipients()
                .any(|address| address.eq_ignore_ascii_case(blocked))
        {
            return Err(DeliveryError::Rejected(format!("mailbox {blocked} unavailable")));
        }
        state.sent.push(email.clone());
        Ok(DeliveryReceipt {
            message_id: format!("memory-{}", state.sent.len()),
            accepted_at: Utc::now(),
        })
    }
}

/// One line of the outbox file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub message_id: String,
    pub from: String,
    pub queued_at: DateTime<Utc>,
    #[serde(flatten)]
    pub email: Email,
}

/// Appends each message as a JSON line to a file for a real relay to pick up.
#[derive(Debug)]
pub struct OutboxMailer {
    path: PathBuf,
    from: String,
    seq: AtomicU64,
}

impl OutboxMailer {
    pub fn new(path: impl Into<PathBuf>, from: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            from: from.into(),
            seq: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse every entry currently in the outbox. A missing file is empty.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Io`] if the file cannot be read, or
    /// [`DeliveryError::Encode`] if a line is not a valid entry.
    pub fn read_entries(path: &Path) -> Result<Vec<OutboxEntry>, DeliveryError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(DeliveryError::from))
            .collect()
    }
}

impl Mailer for OutboxMailer {
    fn send(&self, email: &Email) -> Result<DeliveryReceipt, DeliveryError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let queued_at = Utc::now();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let entry = OutboxEntry {
            message_id: format!("{}-{seq}", queued_at.timestamp_micros()),
            from: self.from.clone(),
            queued_at,
            email: email.clone(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        Ok(DeliveryReceipt {
            message_id: entry.message_id,
            accepted_at: queued_at,
        })
    }
}
