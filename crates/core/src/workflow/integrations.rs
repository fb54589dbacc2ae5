//! Integration catalog with immutable connect/disconnect transitions.

use serde::{Deserialize, Serialize};

use super::model::{NodeType, Workflow};
use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub is_connected: bool,
}

impl Integration {
    pub fn new(id: &str, name: &str, category: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            is_connected: false,
        }
    }
}

/// Set of available integrations.
///
/// Transitions return a new catalog; the receiver is never modified, so a
/// catalog shared between views cannot change underneath them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationCatalog {
    integrations: Vec<Integration>,
}

impl IntegrationCatalog {
    pub fn new(integrations: Vec<Integration>) -> Self {
        Self { integrations }
    }

    /// The integrations integration nodes can target, all disconnected.
    pub fn standard() -> Self {
        Self::new(vec![
            Integration::new("salesforce", "Salesforce", "CRM"),
            Integration::new("hubspot", "HubSpot", "CRM"),
            Integration::new("slack", "Slack", "Communication"),
            Integration::new("mailchimp", "Mailchimp", "Marketing"),
            Integration::new("zapier", "Zapier", "Automation"),
            Integration::new("google-sheets", "Google Sheets", "Productivity"),
        ])
    }

    pub fn all(&self) -> &[Integration] {
        &self.integrations
    }

    pub fn get(&self, id: &str) -> Option<&Integration> {
        self.integrations.iter().find(|i| i.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Integration> {
        self.integrations.iter().find(|i| i.name == name)
    }

    pub fn connected(&self) -> impl Iterator<Item = &Integration> {
        self.integrations.iter().filter(|i| i.is_connected)
    }

    pub fn by_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Integration> {
        self.integrations
            .iter()
            .filter(move |i| i.category == category)
    }

    pub fn connect(&self, id: &str) -> Result<Self, CoreError> {
        self.with_connection(id, true)
    }

    pub fn disconnect(&self, id: &str) -> Result<Self, CoreError> {
        self.with_connection(id, false)
    }

    fn with_connection(&self, id: &str, connected: bool) -> Result<Self, CoreError> {
        if self.get(id).is_none() {
            return Err(CoreError::NotFound {
                entity: "integration",
                id: id.to_string(),
            });
        }
        let integrations = self
            .integrations
            .iter()
            .map(|i| Integration {
                is_connected: if i.id == id { connected } else { i.is_connected },
                ..i.clone()
            })
            .collect();
        Ok(Self { integrations })
    }
}

/// Errors for integration nodes that reference integrations the catalog
/// does not know or that are not connected.
pub fn validate_integrations(workflow: &Workflow, catalog: &IntegrationCatalog) -> Vec<String> {
    workflow
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Integration)
        .filter_map(|node| {
            let name = node.config_str("integration")?;
            match catalog.find_by_name(name) {
                None => Some(format!(
                    "Node '{}': integration '{name}' is not available",
                    node.name
                )),
                Some(i) if !i.is_connected => Some(format!(
                    "Node '{}': integration '{name}' is not connected",
                    node.name
                )),
                Some(_) => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Record;
    use crate::workflow::model::NodePatch;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn connect_returns_new_catalog_and_leaves_original() {
        let catalog = IntegrationCatalog::standard();
        let connected = catalog.connect("slack").unwrap();
        assert!(!catalog.get("slack").unwrap().is_connected);
        assert!(connected.get("slack").unwrap().is_connected);
        assert_eq!(connected.connected().count(), 1);

        let back = connected.disconnect("slack").unwrap();
        assert_eq!(back, catalog);
    }

    #[test]
    fn unknown_integration_is_not_found() {
        assert_matches!(
            IntegrationCatalog::standard().connect("myspace"),
            Err(CoreError::NotFound { entity: "integration", .. })
        );
    }

    #[test]
    fn categories_group_integrations() {
        let catalog = IntegrationCatalog::standard();
        assert_eq!(catalog.by_category("CRM").count(), 2);
    }

    #[test]
    fn workflow_nodes_must_use_connected_integrations() {
        let mut wf = Workflow::new("Sync");
        let a = wf.add_node(NodeType::Integration).unwrap();
        let b = wf.add_node(NodeType::Integration).unwrap();
        let mut ac = Record::new();
        ac.insert("integration".into(), json!("Slack"));
        wf.update_node(&a, NodePatch::config(ac)).unwrap();
        let mut bc = Record::new();
        bc.insert("integration".into(), json!("Pipedrive"));
        wf.update_node(&b, NodePatch::config(bc)).unwrap();

        let catalog = IntegrationCatalog::standard();
        let errors = validate_integrations(&wf, &catalog);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("not connected"));
        assert!(errors[1].contains("not available"));

        let connected = catalog.connect("slack").unwrap();
        assert_eq!(validate_integrations(&wf, &connected).len(), 1);
    }
}
