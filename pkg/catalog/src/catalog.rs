use pkg_quota::{QuotaValidator, compute_usage};
use pkg_state::collection::{SyncState, SyncStats, SyncedCollection};
use pkg_types::event::UpdateEvent;
use pkg_types::instance::Instance;
use pkg_types::meta::{Keyed, ObjectKey};
use pkg_types::quota::{ResourceQuota, ResourceRequest, ResourceUsage, ValidationResult};
use pkg_types::template::Template;
use serde::Serialize;
use tracing::debug;

use crate::join::{JoinedTemplate, joined_view};

/// Everything that can change the catalog, delivered one at a time to its
/// single writer.
#[derive(Debug, Clone)]
pub enum SyncMessage {
    TemplatesSnapshot(Vec<Template>),
    TemplateEvent(UpdateEvent<Template>),
    InstancesSnapshot(Vec<Instance>),
    InstanceEvent(UpdateEvent<Instance>),
}

/// What the user may do with one template right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Affordance {
    pub template: ObjectKey,
    /// Badge count.
    pub instance_count: usize,
    pub can_create: bool,
    /// Why `can_create` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// A template can only be removed once nothing runs from it.
    pub can_delete: bool,
    pub validation: ValidationResult,
}

/// Everything display code needs, computed at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogView {
    /// Both collections have loaded their first snapshot.
    pub ready: bool,
    pub revision: u64,
    pub templates: Vec<JoinedTemplate>,
    pub affordances: Vec<Affordance>,
    pub usage: ResourceUsage,
    pub quota: ResourceQuota,
}

/// Local mirror of one tenant's templates and instances plus the quota they
/// are accounted against.
#[derive(Debug)]
pub struct Catalog {
    templates: SyncedCollection<Template>,
    instances: SyncedCollection<Instance>,
    quota: ResourceQuota,
    validator: QuotaValidator,
}

impl Catalog {
    pub fn new(quota: ResourceQuota, validator: QuotaValidator) -> Self {
        Self {
            templates: SyncedCollection::new("templates"),
            instances: SyncedCollection::new("instances"),
            quota,
            validator,
        }
    }

    pub fn templates(&self) -> &SyncedCollection<Template> {
        &self.templates
    }

    pub fn instances(&self) -> &SyncedCollection<Instance> {
        &self.instances
    }

    pub fn quota(&self) -> &ResourceQuota {
        &self.quota
    }

    pub fn set_quota(&mut self, quota: ResourceQuota) {
        self.quota = quota;
    }

    /// Apply one message. Returns whether anything visible changed.
    pub fn handle(&mut self, message: SyncMessage) -> bool {
        let before = self.revision();
        match message {
            SyncMessage::TemplatesSnapshot(items) => self.templates.replace_all(items),
            SyncMessage::InstancesSnapshot(items) => self.instances.replace_all(items),
            SyncMessage::TemplateEvent(event) => {
                let outcome = self.templates.apply(event);
                debug!("templates: {:?}", outcome);
            }
            SyncMessage::InstanceEvent(event) => {
                let outcome = self.instances.apply(event);
                debug!("instances: {:?}", outcome);
            }
        }
        self.revision() != before
    }

    /// Sum of both collections' revisions; moves whenever either changes.
    pub fn revision(&self) -> u64 {
        self.templates.revision() + self.instances.revision()
    }

    pub fn is_ready(&self) -> bool {
        self.templates.state() == SyncState::SnapshotLoaded
            && self.instances.state() == SyncState::SnapshotLoaded
    }

    /// (templates, instances)
    pub fn stats(&self) -> (SyncStats, SyncStats) {
        (self.templates.stats(), self.instances.stats())
    }

    pub fn usage(&self) -> ResourceUsage {
        let instances = self.instances.view();
        compute_usage(instances.values(), &self.templates)
    }

    pub fn joined(&self) -> Vec<JoinedTemplate> {
        let templates = self.templates.view();
        let instances = self.instances.view();
        joined_view(templates.values(), instances.values())
    }

    /// Would one more instance of `template` fit?
    pub fn validate_create(&self, template: &Template) -> ValidationResult {
        self.validate_with_usage(template, &self.usage())
    }

    fn validate_with_usage(&self, template: &Template, usage: &ResourceUsage) -> ValidationResult {
        let request = ResourceRequest::from(&template.resources);
        self.validator.validate(&request, &self.quota, usage)
    }

    /// Create/delete affordances for every known template.
    pub fn affordances(&self) -> Vec<Affordance> {
        let joined = self.joined();
        let usage = self.usage();
        self.affordances_for(&joined, &usage)
    }

    fn affordances_for(&self, joined: &[JoinedTemplate], usage: &ResourceUsage) -> Vec<Affordance> {
        // Stopped instances still occupy a slot against the instance limit.
        let total = self.instances.len();
        let limit = self.quota.instances as usize;

        joined
            .iter()
            .map(|j| {
                let validation = self.validate_with_usage(&j.template, usage);
                let reason = if !validation.valid {
                    validation.errors.first().cloned()
                } else if total >= limit {
                    Some(format!("Instance limit reached ({}/{})", total, limit))
                } else {
                    None
                };
                Affordance {
                    template: j.template.key(),
                    instance_count: j.instance_count,
                    can_create: reason.is_none(),
                    reason,
                    can_delete: j.instance_count == 0,
                    validation,
                }
            })
            .collect()
    }

    /// Compute the full view model.
    pub fn view(&self) -> CatalogView {
        let templates = self.joined();
        let usage = self.usage();
        let affordances = self.affordances_for(&templates, &usage);
        CatalogView {
            ready: self.is_ready(),
            revision: self.revision(),
            templates,
            affordances,
            usage,
            quota: self.quota.clone(),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(ResourceQuota::default(), QuotaValidator::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{TENANT, WORKSPACE, instance, sized_template, template};
    use pkg_constants::quota::GIB;
    use pkg_types::instance::InstancePhase;
    use pkg_types::quantity::Quantity;

    fn quota(cpu: f64, memory_gi: f64, instances: u32) -> ResourceQuota {
        ResourceQuota {
            cpu: Quantity::cpu(cpu),
            memory: Quantity::memory(memory_gi * GIB),
            disk: None,
            instances,
        }
    }

    fn loaded(quota: ResourceQuota) -> Catalog {
        let mut catalog = Catalog::new(quota, QuotaValidator::default());
        catalog.handle(SyncMessage::TemplatesSnapshot(vec![
            sized_template("jupyter", 2.0, 4.0),
            sized_template("matlab", 4.0, 8.0),
        ]));
        catalog.handle(SyncMessage::InstancesSnapshot(vec![instance("nb-1", "jupyter")]));
        catalog
    }

    #[test]
    fn becomes_ready_after_both_snapshots() {
        let mut catalog = Catalog::default();
        assert!(!catalog.is_ready());
        catalog.handle(SyncMessage::TemplatesSnapshot(vec![template("jupyter")]));
        assert!(!catalog.is_ready());
        catalog.handle(SyncMessage::InstancesSnapshot(vec![]));
        assert!(catalog.is_ready());
    }

    #[test]
    fn usage_follows_instance_events() {
        let mut catalog = loaded(quota(8.0, 16.0, 5));
        assert_eq!(catalog.usage().cpu.amount(), 2.0);

        assert!(catalog.handle(SyncMessage::InstanceEvent(UpdateEvent::added(instance(
            "ml-1", "matlab"
        )))));
        let usage = catalog.usage();
        assert_eq!(usage.cpu.amount(), 6.0);
        assert_eq!(usage.memory.amount(), 12.0 * GIB);
        assert_eq!(usage.instances, 2);

        let mut stopped = instance("ml-1", "matlab");
        stopped.status.phase = InstancePhase::Off;
        catalog.handle(SyncMessage::InstanceEvent(UpdateEvent::modified(stopped)));
        assert_eq!(catalog.usage().instances, 1);
    }

    #[test]
    fn unknown_delete_changes_nothing() {
        let mut catalog = loaded(quota(8.0, 16.0, 5));
        let before = catalog.view();
        let changed = catalog.handle(SyncMessage::InstanceEvent(UpdateEvent::deleted(
            ObjectKey::new(TENANT, "never-existed"),
        )));
        assert!(!changed);
        assert_eq!(catalog.view(), before);
        assert_eq!(catalog.stats().1.anomalies, 1);
    }

    #[test]
    fn create_blocked_when_template_does_not_fit() {
        let catalog = loaded(quota(4.0, 16.0, 5));
        let affordances = catalog.affordances();

        let jupyter = &affordances[0];
        assert_eq!(jupyter.template, ObjectKey::new(WORKSPACE, "jupyter"));
        assert!(jupyter.can_create);
        assert!(!jupyter.can_delete);
        assert_eq!(jupyter.instance_count, 1);

        // 4 cores requested, 2 left.
        let matlab = &affordances[1];
        assert!(!matlab.can_create);
        assert!(matlab.can_delete);
        assert!(matlab.reason.as_deref().unwrap_or_default().starts_with("CPU quota exceeded"));
    }

    #[test]
    fn stopped_instances_still_hold_a_slot() {
        let mut catalog = loaded(quota(64.0, 64.0, 2));
        let mut stopped = instance("nb-2", "jupyter");
        stopped.running = false;
        catalog.handle(SyncMessage::InstanceEvent(UpdateEvent::added(stopped)));

        // Only one instance counts toward usage, so the validator passes...
        assert!(catalog.validate_create(&template("jupyter")).valid);
        // ...but two exist, which is the limit.
        let affordances = catalog.affordances();
        assert!(affordances.iter().all(|a| !a.can_create));
        assert_eq!(
            affordances[0].reason.as_deref(),
            Some("Instance limit reached (2/2)")
        );
    }

    #[test]
    fn template_removal_drops_its_row() {
        let mut catalog = loaded(quota(8.0, 16.0, 5));
        catalog.handle(SyncMessage::TemplateEvent(UpdateEvent::deleted(ObjectKey::new(
            WORKSPACE, "jupyter",
        ))));
        let view = catalog.view();
        assert_eq!(view.templates.len(), 1);
        assert_eq!(view.templates[0].template.name, "matlab");
        // The orphaned instance still counts, with no resources.
        assert_eq!(view.usage.instances, 1);
        assert_eq!(view.usage.cpu.amount(), 0.0);
    }

    #[test]
    fn view_serializes() {
        let catalog = loaded(quota(8.0, 16.0, 5));
        let json = serde_json::to_value(catalog.view()).unwrap();
        assert_eq!(json["ready"], true);
        assert_eq!(json["templates"][0]["instance_count"], 1);
        assert_eq!(json["affordances"][1]["can_delete"], true);
    }
}
