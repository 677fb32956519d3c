//! Notification composer: who gets told what, and when.
//!
//! The composer decides recipients and renders content; delivery is the
//! [`Mailer`]'s job. Delivery failures never undo the state change that
//! triggered them. They are logged and returned in a [`NotifyReport`].

pub mod mailer;
pub mod render;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::config::NotifyConfig;
use crate::leads::LeadDirectory;
use crate::model::{ChecklistItem, Request, Role};

pub use mailer::{DeliveryError, DeliveryReceipt, Mailer, MemoryMailer, OutboxEntry, OutboxMailer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    pub subject: String,
    pub body_html: String,
}

impl Email {
    /// Every address on the message, `to` first.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to.iter().chain(&self.cc).map(String::as_str)
    }
}

#[derive(Debug)]
pub struct SentEmail {
    pub email: Email,
    pub receipt: DeliveryReceipt,
}

#[derive(Debug)]
pub struct NotifyFailure {
    pub subject: String,
    pub error: DeliveryError,
}

/// What a notification call did. Never an error.
#[derive(Debug, Default)]
pub struct NotifyReport {
    pub sent: Vec<SentEmail>,
    pub failures: Vec<NotifyFailure>,
}

impl NotifyReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: Self) {
        self.sent.extend(other.sent);
        self.failures.extend(other.failures);
    }
}

/// Trim addresses and drop blanks and case-insensitive repeats, keeping the
/// first spelling of each.
#[must_use]
pub fn dedupe_addresses<I, S>(addresses: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    addresses
        .into_iter()
        .filter_map(|address| {
            let trimmed = address.as_ref().trim();
            (!trimmed.is_empty() && seen.insert(trimmed.to_ascii_lowercase()))
                .then(|| trimmed.to_string())
        })
        .collect()
}

pub struct Notifier<'a> {
    mailer: &'a dyn Mailer,
    directory: &'a dyn LeadDirectory,
    config: NotifyConfig,
}

impl<'a> Notifier<'a> {
    #[must_use]
    pub const fn new(
        mailer: &'a dyn Mailer,
        directory: &'a dyn LeadDirectory,
        config: NotifyConfig,
    ) -> Self {
        Self {
            mailer,
            directory,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &NotifyConfig {
        &self.config
    }

    /// Addresses for `role` on `request`.
    ///
    /// Employee falls back to the supervisor when the employee has no
    /// address yet. Other lead roles come from the directory.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Recipients`] if the directory lookup fails.
    pub fn recipients(&self, request: &Request, role: Role) -> Result<Vec<String>, DeliveryError> {
        let addresses = match role {
            Role::Employee => vec![
                request
                    .employee
                    .as_ref()
                    .filter(|employee| !employee.email.trim().is_empty())
                    .unwrap_or(&request.supervisor)
                    .email
                    .clone(),
            ],
            Role::Supervisor => vec![request.supervisor.email.clone()],
            _ => self
                .directory
                .leads_for(role)
                .map_err(DeliveryError::Recipients)?
                .into_iter()
                .map(|person| person.email)
                .collect(),
        };
        Ok(dedupe_addresses(addresses))
    }

    /// One email per role that gained active items, listing them along with
    /// the role's other outstanding items.
    pub fn activation(
        &self,
        request: &Request,
        activated: &BTreeMap<Role, Vec<ChecklistItem>>,
        checklist: &[ChecklistItem],
    ) -> NotifyReport {
        let mut report = NotifyReport::default();
        if !self.config.enabled {
            return report;
        }

        for (role, ready) in activated {
            if ready.is_empty() {
                continue;
            }
            let ready_ids: HashSet<_> = ready.iter().map(|item| item.id).collect();
            let outstanding: Vec<&ChecklistItem> = checklist
                .iter()
                .filter(|item| {
                    item.lead == *role && item.is_outstanding() && !ready_ids.contains(&item.id)
                })
                .collect();

            let subject = render::activation_subject(request, *role, ready.len());
            let body = render::activation(request, *role, ready, &outstanding, &self.config.site_url);
            self.deliver(&mut report, request, *role, Vec::new(), subject, body);
        }
        report
    }

    /// One email per lead role with active items among `created`, copying
    /// the supervisor when configured.
    pub fn submission(&self, request: &Request, created: &[ChecklistItem]) -> NotifyReport {
        let mut report = NotifyReport::default();
        if !self.config.enabled {
            return report;
        }

        let mut by_role: BTreeMap<Role, Vec<&ChecklistItem>> = BTreeMap::new();
        for item in created.iter().filter(|item| item.is_outstanding()) {
            by_role.entry(item.lead).or_default().push(item);
        }

        let cc = if self.config.cc_supervisor {
            vec![request.supervisor.email.clone()]
        } else {
            Vec::new()
        };
        for (role, items) in by_role {
            let subject = render::submission_subject(request);
            let body = render::submission(request, role, &items, &self.config.site_url);
            self.deliver(&mut report, request, role, cc.clone(), subject, body);
        }
        report
    }

    /// A single email to every lead with an item on the request, plus the
    /// employee and supervisor.
    pub fn cancellation(
        &self,
        request: &Request,
        items: &[ChecklistItem],
        reason: Option<&str>,
    ) -> NotifyReport {
        let mut report = NotifyReport::default();
        if !self.config.enabled {
            return report;
        }

        let subject = render::cancellation_subject(request);
        let roles: BTreeSet<Role> = items
            .iter()
            .map(|item| item.lead)
            .chain([Role::Employee, Role::Supervisor])
            .collect();

        let mut to = Vec::new();
        for role in roles {
            match self.recipients(request, role) {
                Ok(addresses) => to.extend(addresses),
                Err(error) => record_failure(&mut report, request, subject.clone(), error),
            }
        }

        let body = render::cancellation(request, reason, &self.config.site_url);
        self.send(&mut report, request, dedupe_addresses(to), Vec::new(), subject, body);
        report
    }

    /// Tell the employee (or the supervisor, if the employee is unknown)
    /// that every task is done, copying the supervisor.
    pub fn completion(&self, request: &Request) -> NotifyReport {
        let mut report = NotifyReport::default();
        if !self.config.enabled {
            return report;
        }

        let subject = render::completion_subject(request);
        let body = render::completion(request, &self.config.site_url);
        self.deliver(
            &mut report,
            request,
            Role::Employee,
            vec![request.supervisor.email.clone()],
            subject,
            body,
        );
        report
    }

    fn deliver(
        &self,
        report: &mut NotifyReport,
        request: &Request,
        role: Role,
        cc: Vec<String>,
        subject: String,
        body_html: String,
    ) {
        match self.recipients(request, role) {
            Ok(to) => self.send(report, request, to, cc, subject, body_html),
            Err(error) => record_failure(report, request, subject, error),
        }
    }

    fn send(
        &self,
        report: &mut NotifyReport,
        request: &Request,
        to: Vec<String>,
        cc: Vec<String>,
        subject: String,
        body_html: String,
    ) {
        if to.is_empty() {
            let error = DeliveryError::NoRecipients {
                subject: subject.clone(),
            };
            record_failure(report, request, subject, error);
            return;
        }

        let to_keys: HashSet<String> = to.iter().map(|a| a.to_ascii_lowercase()).collect();
        let cc = dedupe_addresses(cc)
            .into_iter()
            .filter(|address| !to_keys.contains(&address.to_ascii_lowercase()))
            .collect();
        let email = Email {
            to,
            cc,
            subject,
            body_html,
        };

        match self.mailer.send(&email) {
            Ok(receipt) => {
                tracing::debug!(
                    request_id = %request.id,
                    message_id = %receipt.message_id,
                    recipients = email.to.len() + email.cc.len(),
                    "notification sent"
                );
                report.sent.push(SentEmail { email, receipt });
            }
            Err(error) => record_failure(report, request, email.subject, error),
        }
    }
}

fn record_failure(report: &mut NotifyReport, request: &Request, subject: String, error: DeliveryError) {
    tracing::warn!(
        request_id = %request.id,
        subject = %subject,
        error = %error,
        "notification not delivered"
    );
    report.failures.push(NotifyFailure { subject, error });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::LeadRoster;
    use crate::model::{EmploymentType, ItemId, Person, RequestId, RequestType};
    use crate::rules::test_support;
    use crate::templates::TemplateId;

    fn item(id: i64, template: TemplateId, lead: Role, active: bool) -> ChecklistItem {
        ChecklistItem {
            id: ItemId(id),
            request_id: RequestId(1),
            template,
            title: template.to_string(),
            description: String::new(),
            lead,
            active,
            completed_at: None,
            completed_by: None,
            version: 1,
        }
    }

    fn roster() -> LeadRoster {
        LeadRoster::new()
            .with(Role::It, Person::new("Ira", "ira@example.mil"))
            .unwrap()
            .with(Role::It, Person::new("Ivy", "ivy@example.mil"))
            .unwrap()
            .with(Role::Security, Person::new("Sol", "sol@example.mil"))
            .unwrap()
            .with(Role::Security, Person::new("Sam again", "SAM.LEAD@example.mil"))
            .unwrap()
    }

    fn request() -> Request {
        test_support::request(RequestType::In, EmploymentType::Civilian)
    }

    #[test]
    fn dedupe_is_case_insensitive_and_ordered() {
        let out = dedupe_addresses([" A@x.mil", "b@x.mil", "a@X.mil", "", "c@x.mil", "B@x.mil"]);
        assert_eq!(out, vec!["A@x.mil", "b@x.mil", "c@x.mil"]);
    }

    #[test]
    fn employee_falls_back_to_supervisor() {
        let mailer = MemoryMailer::new();
        let roster = roster();
        let notifier = Notifier::new(&mailer, &roster, NotifyConfig::default());
        let mut request = request();
        assert_eq!(
            notifier.recipients(&request, Role::Employee).unwrap(),
            vec!["sam.lead@example.mil"]
        );
        request.employee = Some(Person::new("Pat Doe", "pat.doe@example.mil"));
        assert_eq!(
            notifier.recipients(&request, Role::Employee).unwrap(),
            vec!["pat.doe@example.mil"]
        );
    }

    #[test]
    fn activation_lists_ready_and_outstanding_per_role() {
        let mailer = MemoryMailer::new();
        let roster = roster();
        let notifier = Notifier::new(&mailer, &roster, NotifyConfig::default());

        let ready = item(2, TemplateId::ProvisionNetworkAccount, Role::It, true);
        let checklist = vec![
            item(1, TemplateId::CyberAwarenessTraining, Role::Employee, true),
            ready.clone(),
            item(3, TemplateId::PhoneSetup, Role::It, true),
            item(4, TemplateId::EquipmentIssue, Role::It, false),
        ];
        let activated = BTreeMap::from([(Role::It, vec![ready])]);

        let report = notifier.activation(&request(), &activated, &checklist);
        assert!(report.is_clean());
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["ira@example.mil", "ivy@example.mil"]);
        assert!(sent[0].body_html.contains("phone_setup"));
        assert!(!sent[0].body_html.contains("equipment_issue"));
    }

    #[test]
    fn submission_groups_active_items_and_ccs_supervisor() {
        let mailer = MemoryMailer::new();
        let roster = roster();
        let notifier = Notifier::new(&mailer, &roster, NotifyConfig::default());
        let created = vec![
            item(1, TemplateId::WelcomePackage, Role::Supervisor, true),
            item(2, TemplateId::BuildingAccess, Role::Security, true),
            item(3, TemplateId::EquipmentIssue, Role::It, false),
        ];

        let report = notifier.submission(&request(), &created);
        assert_eq!(report.sent.len(), 2);
        let sent = mailer.sent();
        assert_eq!(sent[0].to, vec!["sam.lead@example.mil"]);
        assert!(sent[0].cc.is_empty(), "supervisor already in to");
        assert_eq!(sent[1].to, vec!["sol@example.mil", "SAM.LEAD@example.mil"]);
        assert!(sent[1].cc.is_empty());
    }

    #[test]
    fn cancellation_is_one_email_to_everyone() {
        let mailer = MemoryMailer::new();
        let roster = roster();
        let notifier = Notifier::new(&mailer, &roster, NotifyConfig::default());
        let items = vec![
            item(1, TemplateId::PhoneSetup, Role::It, true),
            item(2, TemplateId::BuildingAccess, Role::Security, false),
        ];
        let report = notifier.cancellation(&request(), &items, Some("Offer withdrawn"));
        assert_eq!(report.sent.len(), 1);
        let email = &mailer.sent()[0];
        assert_eq!(
            email.to,
            vec![
                "sam.lead@example.mil",
                "ira@example.mil",
                "ivy@example.mil",
                "sol@example.mil"
            ]
        );
        assert!(email.body_html.contains("Offer withdrawn"));
    }

    #[test]
    fn completion_goes_to_employee_with_supervisor_cc() {
        let mailer = MemoryMailer::new();
        let roster = LeadRoster::new();
        let notifier = Notifier::new(&mailer, &roster, NotifyConfig::default());
        let mut request = request();
        request.employee = Some(Person::new("Pat Doe", "pat.doe@example.mil"));
        notifier.completion(&request);
        let email = &mailer.sent()[0];
        assert_eq!(email.to, vec!["pat.doe@example.mil"]);
        assert_eq!(email.cc, vec!["sam.lead@example.mil"]);
    }

    #[test]
    fn failures_are_reported_not_raised() {
        let mailer = MemoryMailer::new();
        let roster = LeadRoster::new();
        let notifier = Notifier::new(&mailer, &roster, NotifyConfig::default());
        let activated = BTreeMap::from([(
            Role::Dts,
            vec![item(9, TemplateId::DtsProfile, Role::Dts, true)],
        )]);
        let report = notifier.activation(&request(), &activated, &[]);
        assert!(report.sent.is_empty());
        assert!(matches!(
            report.failures[0].error,
            DeliveryError::NoRecipients { .. }
        ));

        mailer.set_failing(true);
        let report = notifier.completion(&request());
        assert!(matches!(report.failures[0].error, DeliveryError::Rejected(_)));
    }

    #[test]
    fn disabled_sends_nothing() {
        let mailer = MemoryMailer::new();
        let roster = roster();
        let config = NotifyConfig {
            enabled: false,
            ..NotifyConfig::default()
        };
        let notifier = Notifier::new(&mailer, &roster, config);
        let report = notifier.completion(&request());
        assert!(report.sent.is_empty() && report.failures.is_empty());
        assert!(mailer.sent().is_empty());
    }
}
