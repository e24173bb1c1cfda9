use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meta::{Keyed, ObjectKey};

// --- Instance phase ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum InstancePhase {
    Importing,
    Starting,
    Running,
    Ready,
    Stopping,
    Off,
    Failed,
    ResourceQuotaExceeded,
    #[default]
    Unknown,
}

impl InstancePhase {
    /// Phases in which the control plane no longer holds capacity for the
    /// instance.
    pub fn is_released(self) -> bool {
        matches!(
            self,
            InstancePhase::Off | InstancePhase::Failed | InstancePhase::ResourceQuotaExceeded
        )
    }
}

impl std::fmt::Display for InstancePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstancePhase::Importing => write!(f, "Importing"),
            InstancePhase::Starting => write!(f, "Starting"),
            InstancePhase::Running => write!(f, "Running"),
            InstancePhase::Ready => write!(f, "Ready"),
            InstancePhase::Stopping => write!(f, "Stopping"),
            InstancePhase::Off => write!(f, "Off"),
            InstancePhase::Failed => write!(f, "Failed"),
            InstancePhase::ResourceQuotaExceeded => write!(f, "ResourceQuotaExceeded"),
            InstancePhase::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceStatus {
    #[serde(default)]
    pub phase: InstancePhase,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

// --- Instance ---

/// A tenant's running (or stopped) copy of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub pretty_name: Option<String>,
    /// Template this instance was created from.
    pub template: ObjectKey,
    /// Desired power state requested by the tenant.
    #[serde(default = "default_running")]
    pub running: bool,
    #[serde(default)]
    pub status: InstanceStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_running() -> bool {
    true
}

impl Instance {
    /// Whether the instance currently holds quota: it is meant to run and
    /// the control plane has not released it.
    pub fn consumes_capacity(&self) -> bool {
        self.running && !self.status.phase.is_released()
    }
}

impl Keyed for Instance {
    fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }
}
