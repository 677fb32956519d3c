//! passage-core library.
//!
//! Checklist generation and task activation for employee in-processing and
//! out-processing. A submitted [`model::Request`] is run through the
//! eligibility [`rules`], the selected [`templates`] are turned into
//! checklist items by the [`materialize`] step, and completing an item
//! drives the [`activation`] cascade. [`notify`] tells leads when their work
//! becomes actionable. [`service::ProcessingService`] ties these together.
//!
//! Collaborators are injected: a [`store::RecordStore`], a
//! [`notify::Mailer`] and a [`leads::LeadDirectory`].
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums in the library; `anyhow::Result` only
//!   for config loading.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod activation;
pub mod config;
pub mod error;
pub mod leads;
pub mod materialize;
pub mod model;
pub mod notify;
pub mod rules;
pub mod service;
pub mod store;
pub mod templates;
