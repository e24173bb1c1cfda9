use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::meta::{Keyed, ObjectKey};
use crate::quantity::{self, Quantity};
use crate::quota::ResourceRequest;

// --- Resources ---

/// Per-instance resources a template asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateResources {
    #[serde(with = "quantity::cpu")]
    pub cpu: Quantity,
    #[serde(with = "quantity::memory")]
    pub memory: Quantity,
    #[serde(default, with = "quantity::disk_opt", skip_serializing_if = "Option::is_none")]
    pub disk: Option<Quantity>,
}

impl From<&TemplateResources> for ResourceRequest {
    fn from(r: &TemplateResources) -> Self {
        ResourceRequest {
            cpu: r.cpu,
            memory: r.memory,
            disk: r.disk,
        }
    }
}

// --- Environment ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EnvironmentType {
    #[default]
    VirtualMachine,
    Container,
    CloudVm,
    Standalone,
}

impl std::fmt::Display for EnvironmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvironmentType::VirtualMachine => write!(f, "VirtualMachine"),
            EnvironmentType::Container => write!(f, "Container"),
            EnvironmentType::CloudVm => write!(f, "CloudVM"),
            EnvironmentType::Standalone => write!(f, "Standalone"),
        }
    }
}

// --- Template ---

/// Blueprint from which instances are created inside a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub pretty_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub environment_type: EnvironmentType,
    pub resources: TemplateResources,
    /// Persistent instances keep their disk while stopped.
    #[serde(default)]
    pub persistent: bool,
    #[serde(default)]
    pub gui: bool,
    /// Empty map means "let the user pick a node label".
    #[serde(default)]
    pub node_selector: Option<BTreeMap<String, String>>,
}

impl Template {
    pub fn display_name(&self) -> &str {
        self.pretty_name.as_deref().unwrap_or(&self.name)
    }
}

impl Keyed for Template {
    fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }
}
