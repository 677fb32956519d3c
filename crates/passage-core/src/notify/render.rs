//! HTML bodies and subject lines.
//!
//! Every piece of user-provided text (names, office symbols, cancel reasons,
//! item titles) goes through [`escape`] before it lands in markup.

use crate::model::{ChecklistItem, Request, RequestType, Role};

/// Escape text for inclusion in HTML element content or attribute values.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const fn process_label(request_type: RequestType) -> &'static str {
    match request_type {
        RequestType::In => "in-processing",
        RequestType::Out => "out-processing",
    }
}

#[must_use]
pub fn request_url(site_url: &str, request: &Request) -> String {
    format!("{}/requests/{}", site_url.trim_end_matches('/'), request.id)
}

#[must_use]
pub fn activation_subject(request: &Request, role: Role, ready: usize) -> String {
    let noun = if ready == 1 { "task" } else { "tasks" };
    format!(
        "{}: {ready} {noun} ready for {} ({})",
        request.employee_name,
        role.display_name(),
        process_label(request.request_type)
    )
}

#[must_use]
pub fn submission_subject(request: &Request) -> String {
    format!(
        "New {} request for {}",
        process_label(request.request_type),
        request.employee_name
    )
}

#[must_use]
pub fn cancellation_subject(request: &Request) -> String {
    format!(
        "Cancelled: {} for {}",
        process_label(request.request_type),
        request.employee_name
    )
}

#[must_use]
pub fn completion_subject(request: &Request) -> String {
    format!(
        "Complete: {} for {}",
        process_label(request.request_type),
        request.employee_name
    )
}

struct Body {
    html: String,
}

impl Body {
    fn new() -> Self {
        Self {
            html: String::from("<html><body>\n"),
        }
    }

    fn paragraph(&mut self, escaped: &str) -> &mut Self {
        self.html.push_str("<p>");
        self.html.push_str(escaped);
        self.html.push_str("</p>\n");
        self
    }

    fn heading(&mut self, text: &str) -> &mut Self {
        self.html.push_str("<h3>");
        self.html.push_str(&escape(text));
        self.html.push_str("</h3>\n");
        self
    }

    fn items<'i>(&mut self, items: impl IntoIterator<Item = &'i ChecklistItem>) -> &mut Self {
        self.html.push_str("<ul>\n");
        for item in items {
            self.html.push_str(&format!(
                "<li><strong>{}</strong>: {}</li>\n",
                escape(&item.title),
                escape(&item.description)
            ));
        }
        self.html.push_str("</ul>\n");
        self
    }

    fn details(&mut self, request: &Request) -> &mut Self {
        self.html.push_str(&format!(
            "<table>\n<tr><th>Employee</th><td>{}</td></tr>\n<tr><th>Type</th><td>{}</td></tr>\n<tr><th>Office</th><td>{}</td></tr>\n<tr><th>Supervisor</th><td>{}</td></tr>\n</table>\n",
            escape(&request.employee_name),
            request.employment_type,
            escape(&request.office_symbol),
            escape(&request.supervisor.name),
        ));
        self
    }

    fn link(&mut self, url: &str) -> &mut Self {
        let url = escape(url);
        self.html
            .push_str(&format!("<p><a href=\"{url}\">Open the request</a></p>\n"));
        self
    }

    fn finish(&mut self) -> String {
        self.html.push_str("</body></html>\n");
        std::mem::take(&mut self.html)
    }
}

/// Items newly ready for `role`, followed by that role's other outstanding
/// items on the same request.
#[must_use]
pub fn activation(
    request: &Request,
    role: Role,
    ready: &[ChecklistItem],
    outstanding: &[&ChecklistItem],
    site_url: &str,
) -> String {
    let mut body = Body::new();
    body.paragraph(&format!(
        "The following {} tasks for {} are now ready for {}.",
        process_label(request.request_type),
        escape(&request.employee_name),
        escape(role.display_name()),
    ))
    .items(ready);
    if !outstanding.is_empty() {
        body.heading("Still outstanding").items(outstanding.iter().copied());
    }
    body.details(request)
        .link(&request_url(site_url, request))
        .finish()
}

#[must_use]
pub fn submission(request: &Request, role: Role, items: &[&ChecklistItem], site_url: &str) -> String {
    let mut body = Body::new();
    body.paragraph(&format!(
        "A new {} request was submitted for {}. These {} tasks can be started now:",
        process_label(request.request_type),
        escape(&request.employee_name),
        escape(role.display_name()),
    ))
    .items(items.iter().copied())
    .details(request)
    .link(&request_url(site_url, request))
    .finish()
}

#[must_use]
pub fn cancellation(request: &Request, reason: Option<&str>, site_url: &str) -> String {
    let mut body = Body::new();
    body.paragraph(&format!(
        "The {} request for {} was cancelled. No further action is needed.",
        process_label(request.request_type),
        escape(&request.employee_name),
    ));
    if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
        body.paragraph(&format!("Reason: {}", escape(reason)));
    }
    body.details(request)
        .link(&request_url(site_url, request))
        .finish()
}

#[must_use]
pub fn completion(request: &Request, site_url: &str) -> String {
    let mut body = Body::new();
    body.paragraph(&format!(
        "Every {} task for {} is complete.",
        process_label(request.request_type),
        escape(&request.employee_name),
    ))
    .details(request)
    .link(&request_url(site_url, request))
    .finish()
}
