use anyhow::Context;
use pkg_catalog::{Catalog, SyncMessage};
use pkg_types::event::{UpdateEvent, WatchEvent};
use pkg_types::instance::Instance;
use pkg_types::meta::Keyed;
use pkg_types::template::Template;
use pkg_types::validate::validate_key;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Recorded session: the two snapshots followed by the events seen after
/// them, in delivery order.
///
/// ```yaml
/// templates:
///   - { name: jupyter, namespace: workspace-os, resources: { cpu: 2, memory: 4Gi } }
/// instances:
///   - { name: nb-1, namespace: tenant-alice, template: { namespace: workspace-os, name: jupyter } }
/// events:
///   - collection: instances
///     kind: DELETED
///     key: { namespace: tenant-alice, name: nb-1 }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub events: Vec<FixtureEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "collection", rename_all = "lowercase")]
pub enum FixtureEvent {
    Templates(WatchEvent<Template>),
    Instances(WatchEvent<Instance>),
}

impl Fixture {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        let fixture: Fixture = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse fixture {}", path.display()))?;
        info!(
            "Loaded fixture {} ({} templates, {} instances, {} events)",
            path.display(),
            fixture.templates.len(),
            fixture.instances.len(),
            fixture.events.len()
        );
        Ok(fixture)
    }

    /// Feed the fixture through `catalog` the way a live source would.
    /// Entries with invalid keys or malformed events are skipped.
    pub fn replay(self, catalog: &mut Catalog) {
        catalog.handle(SyncMessage::TemplatesSnapshot(valid_only(self.templates)));
        catalog.handle(SyncMessage::InstancesSnapshot(valid_only(self.instances)));

        for event in self.events {
            let message = match event {
                FixtureEvent::Templates(wire) => convert(wire).map(SyncMessage::TemplateEvent),
                FixtureEvent::Instances(wire) => convert(wire).map(SyncMessage::InstanceEvent),
            };
            if let Some(message) = message {
                catalog.handle(message);
            }
        }
    }
}

fn valid_only<T: Keyed>(items: Vec<T>) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| {
            let key = item.key();
            match validate_key(&key) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Skipping {}: {}", key, e);
                    false
                }
            }
        })
        .collect()
}

fn convert<T: Keyed>(wire: WatchEvent<T>) -> Option<UpdateEvent<T>> {
    if let Err(e) = validate_key(&wire.key) {
        warn!("Skipping {} event for {}: {}", wire.kind, wire.key, e);
        return None;
    }
    match UpdateEvent::try_from(wire) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Skipping malformed event: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION: &str = r#"
templates:
  - name: jupyter
    namespace: workspace-os
    resources: { cpu: "2", memory: 4Gi }
  - name: Bad_Name
    namespace: workspace-os
    resources: { cpu: 1, memory: 1Gi }
instances:
  - name: nb-1
    namespace: tenant-alice
    template: { namespace: workspace-os, name: jupyter }
    status: { phase: Ready }
events:
  - collection: instances
    kind: ADDED
    key: { namespace: tenant-alice, name: nb-2 }
    payload:
      name: nb-2
      namespace: tenant-alice
      template: { namespace: workspace-os, name: jupyter }
      status: { phase: Running }
  - collection: instances
    kind: MODIFIED
    key: { namespace: tenant-alice, name: nb-3 }
  - collection: templates
    kind: DELETED
    key: { namespace: workspace-os, name: never-existed }
"#;

    #[test]
    fn replays_a_recorded_session() {
        let fixture: Fixture = serde_yaml::from_str(SESSION).unwrap();
        assert_eq!(fixture.events.len(), 3);

        let mut catalog = Catalog::default();
        fixture.replay(&mut catalog);

        // The badly named template is dropped, the payload-less MODIFIED is
        // skipped and the unknown DELETED is tolerated.
        assert_eq!(catalog.templates().len(), 1);
        assert_eq!(catalog.instances().len(), 2);
        let usage = catalog.usage();
        assert_eq!(usage.instances, 2);
        assert_eq!(usage.cpu.amount(), 4.0);
        assert_eq!(catalog.stats().0.anomalies, 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = Fixture::load(Path::new("/nonexistent/session.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read fixture"));
    }

    #[test]
    fn demo_session_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/session.yaml");
        let mut catalog = Catalog::default();
        Fixture::load(&path).unwrap().replay(&mut catalog);

        let usage = catalog.usage();
        assert_eq!(usage.instances, 2);
        assert_eq!(usage.cpu.amount(), 6.0);
        assert_eq!(usage.disk.format(), "20.0Gi");
        assert_eq!(catalog.joined().len(), 3);
    }
}
