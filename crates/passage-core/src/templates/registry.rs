//! Parsing, validation and lookup of the template catalog.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;

use super::validate::find_prerequisite_cycle;
use super::{Template, TemplateId};
use crate::model::RequestType;

/// Catalog text embedded at build time.
pub const BUILTIN_CATALOG: &str = include_str!("catalog.toml");

static BUILTIN: LazyLock<Registry> = LazyLock::new(|| match Registry::from_toml(BUILTIN_CATALOG) {
    Ok(registry) => registry,
    Err(err) => panic!("embedded template catalog is invalid: {err}"),
});

/// Reasons a catalog is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog parse error: {0}")]
    Parse(String),

    #[error("template '{0}' is defined more than once")]
    Duplicate(TemplateId),

    #[error("catalog has no definition for: {}", join_keys(.0))]
    Missing(Vec<TemplateId>),

    #[error("template '{template}' lists itself as a prerequisite")]
    SelfPrerequisite { template: TemplateId },

    #[error(
        "template '{template}' ({template_type}) depends on '{prerequisite}' from the other request type"
    )]
    CrossTypePrerequisite {
        template: TemplateId,
        template_type: RequestType,
        prerequisite: TemplateId,
    },

    #[error("prerequisite cycle: {}", join_keys(.0))]
    Cycle(Vec<TemplateId>),
}

fn join_keys(ids: &[TemplateId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    template: Vec<Template>,
}

/// Read-only template lookup, built once and shared.
#[derive(Debug, Clone)]
pub struct Registry {
    templates: Vec<Template>,
    index: HashMap<TemplateId, usize>,
}

impl Registry {
    /// The embedded catalog, parsed and validated on first use.
    ///
    /// # Panics
    ///
    /// Panics if the embedded catalog fails validation. The catalog is build
    /// time data covered by tests, so this indicates a broken build.
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Parse and validate catalog text.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the TOML is malformed, a template id is
    /// duplicated or missing, a prerequisite crosses request types, or the
    /// prerequisite graph contains a cycle.
    pub fn from_toml(text: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            toml::from_str(text).map_err(|err| CatalogError::Parse(err.to_string()))?;
        Self::from_templates(file.template)
    }

    /// Validate an already-deserialized template list.
    ///
    /// # Errors
    ///
    /// See [`Registry::from_toml`].
    pub fn from_templates(templates: Vec<Template>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(templates.len());
        for (position, template) in templates.iter().enumerate() {
            if index.insert(template.id, position).is_some() {
                return Err(CatalogError::Duplicate(template.id));
            }
        }

        let missing: Vec<TemplateId> = TemplateId::ALL
            .iter()
            .copied()
            .filter(|id| !index.contains_key(id))
            .collect();
        if !missing.is_empty() {
            return Err(CatalogError::Missing(missing));
        }

        for template in &templates {
            for prerequisite in &template.prerequisites {
                if *prerequisite == template.id {
                    return Err(CatalogError::SelfPrerequisite {
                        template: template.id,
                    });
                }
                let other = &templates[index[prerequisite]];
                if other.request_type != template.request_type {
                    return Err(CatalogError::CrossTypePrerequisite {
                        template: template.id,
                        template_type: template.request_type,
                        prerequisite: *prerequisite,
                    });
                }
            }
        }

        if let Some(cycle) = find_prerequisite_cycle(&templates) {
            return Err(CatalogError::Cycle(cycle));
        }

        tracing::debug!(templates = templates.len(), "template catalog validated");
        Ok(Self { templates, index })
    }

    #[must_use]
    pub fn lookup(&self, id: TemplateId) -> Option<&Template> {
        self.index.get(&id).map(|&position| &self.templates[position])
    }

    /// Lookup that treats a miss as a programming error.
    ///
    /// # Panics
    ///
    /// Panics if `id` is absent. Validation guarantees every [`TemplateId`]
    /// is present, so this cannot happen for a registry built through
    /// [`Registry::from_toml`] or [`Registry::from_templates`].
    #[must_use]
    pub fn get(&self, id: TemplateId) -> &Template {
        match self.lookup(id) {
            Some(template) => template,
            None => panic!("template '{id}' missing from a validated registry"),
        }
    }

    /// Templates for one request type, in catalog order.
    pub fn templates_for(&self, request_type: RequestType) -> impl Iterator<Item = &Template> {
        self.templates
            .iter()
            .filter(move |template| template.request_type == request_type)
    }

    /// All templates in catalog order.
    #[must_use]
    pub fn all(&self) -> &[Template] {
        &self.templates
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Templates that list `id` as a prerequisite.
    #[must_use]
    pub fn dependents_of(&self, id: TemplateId) -> Vec<TemplateId> {
        self.templates
            .iter()
            .filter(|template| template.prerequisites.contains(&id))
            .map(|template| template.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use std::collections::BTreeSet;

    fn template(id: TemplateId, request_type: RequestType, prereqs: &[TemplateId]) -> Template {
        Template {
            id,
            request_type,
            title: id.as_str().to_string(),
            lead: Role::Employee,
            description: String::new(),
            prerequisites: prereqs.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    fn builtin_templates() -> Vec<Template> {
        Registry::builtin().all().to_vec()
    }

    #[test]
    fn builtin_catalog_is_valid_and_complete() {
        let registry = Registry::from_toml(BUILTIN_CATALOG).expect("catalog must validate");
        assert_eq!(registry.len(), TemplateId::ALL.len());
        for id in TemplateId::ALL {
            assert_eq!(registry.get(*id).id, *id);
        }
    }

    #[test]
    fn builtin_catalog_has_about_fifty_templates() {
        let inbound = Registry::builtin().templates_for(RequestType::In).count();
        let outbound = Registry::builtin().templates_for(RequestType::Out).count();
        assert_eq!(inbound, 39);
        assert_eq!(outbound, 12);
    }

    #[test]
    fn government_credential_is_gated_by_installation_in_processing() {
        let template = Registry::builtin().get(TemplateId::ObtainGovernmentCredential);
        assert_eq!(
            template.prerequisites.iter().copied().collect::<Vec<_>>(),
            vec![TemplateId::InstallationInProcessing]
        );
        assert!(!template.starts_active());
        assert_eq!(template.lead, Role::Employee);
    }

    #[test]
    fn duplicate_definition_is_rejected() {
        let mut templates = builtin_templates();
        templates.push(template(TemplateId::Bookmarks, RequestType::In, &[]));
        assert_eq!(
            Registry::from_templates(templates).unwrap_err(),
            CatalogError::Duplicate(TemplateId::Bookmarks)
        );
    }

    #[test]
    fn missing_definition_is_rejected() {
        let templates: Vec<Template> = builtin_templates()
            .into_iter()
            .filter(|t| t.id != TemplateId::DtsDetach)
            .collect();
        assert_eq!(
            Registry::from_templates(templates).unwrap_err(),
            CatalogError::Missing(vec![TemplateId::DtsDetach])
        );
    }

    #[test]
    fn self_and_cross_type_prerequisites_are_rejected() {
        let mut templates = builtin_templates();
        for t in &mut templates {
            if t.id == TemplateId::PhoneSetup {
                t.prerequisites.insert(TemplateId::PhoneSetup);
            }
        }
        assert_eq!(
            Registry::from_templates(templates).unwrap_err(),
            CatalogError::SelfPrerequisite {
                template: TemplateId::PhoneSetup
            }
        );

        let mut templates = builtin_templates();
        for t in &mut templates {
            if t.id == TemplateId::CloseAtaaps {
                t.prerequisites.insert(TemplateId::AtaapsAccount);
            }
        }
        assert!(matches!(
            Registry::from_templates(templates).unwrap_err(),
            CatalogError::CrossTypePrerequisite {
                template: TemplateId::CloseAtaaps,
                prerequisite: TemplateId::AtaapsAccount,
                ..
            }
        ));
    }

    #[test]
    fn prerequisite_cycle_is_rejected() {
        let mut templates = builtin_templates();
        for t in &mut templates {
            if t.id == TemplateId::TravelCoordination {
                t.prerequisites.insert(TemplateId::DtsProfile);
            }
        }
        let err = Registry::from_templates(templates).unwrap_err();
        let CatalogError::Cycle(members) = &err else {
            panic!("expected cycle, got {err}");
        };
        assert_eq!(
            members,
            &vec![
                TemplateId::TravelCoordination,
                TemplateId::GtcApplication,
                TemplateId::DtsProfile,
            ]
        );
        assert!(err.to_string().starts_with("prerequisite cycle: "));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Registry::from_toml("[[template]]\nid = 12").unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }

    #[test]
    fn dependents_follow_prerequisite_metadata() {
        let dependents = Registry::builtin().dependents_of(TemplateId::ProvisionNetworkAccount);
        assert_eq!(
            dependents,
            vec![TemplateId::EquipmentIssue, TemplateId::AddSecurityGroups]
        );
    }
}
