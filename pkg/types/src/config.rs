use serde::{Deserialize, Serialize};

use crate::quota::ResourceQuota;

/// Engine configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// api: http://127.0.0.1:8080
/// token: my-secret-token
/// tenant-namespace: tenant-alice
/// workspace-namespace: workspace-os
/// warning-ratio: 0.8
/// quota:
///   cpu: "8"
///   memory: 16Gi
///   instances: 10
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfigFile {
    #[serde(default)]
    pub api: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, alias = "tenant-namespace")]
    pub tenant_namespace: Option<String>,
    #[serde(default, alias = "workspace-namespace")]
    pub workspace_namespace: Option<String>,
    #[serde(default, alias = "warning-ratio")]
    pub warning_ratio: Option<f64>,
    #[serde(default)]
    pub quota: Option<ResourceQuota>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(anyhow::anyhow!("failed to read config {}: {}", path, e)),
    };
    let config: T = serde_yaml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config {}: {}", path, e))?;
    Ok(config)
}
