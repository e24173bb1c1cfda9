use pkg_state::collection::{CollectionView, SyncedCollection};
use pkg_types::instance::Instance;
use pkg_types::meta::Keyed;
use pkg_types::quota::ResourceUsage;
use pkg_types::template::{Template, TemplateResources};
use tracing::debug;

/// What one counted instance consumes, as resolved from its template.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    pub resources: TemplateResources,
    /// Persistent instances hold their disk; others do not count toward
    /// disk usage.
    pub persistent: bool,
}

impl From<&Template> for Footprint {
    fn from(t: &Template) -> Self {
        Footprint {
            resources: t.resources.clone(),
            persistent: t.persistent,
        }
    }
}

/// Looks up the footprint behind an instance's template reference.
pub trait TemplateResolver {
    fn resolve(&self, instance: &Instance) -> Option<Footprint>;
}

impl<F> TemplateResolver for F
where
    F: Fn(&Instance) -> Option<Footprint>,
{
    fn resolve(&self, instance: &Instance) -> Option<Footprint> {
        self(instance)
    }
}

impl TemplateResolver for CollectionView<Template> {
    fn resolve(&self, instance: &Instance) -> Option<Footprint> {
        self.get(&instance.template).map(Footprint::from)
    }
}

impl TemplateResolver for SyncedCollection<Template> {
    fn resolve(&self, instance: &Instance) -> Option<Footprint> {
        self.get(&instance.template).map(Footprint::from)
    }
}

/// Derive current usage from scratch.
///
/// Only instances that hold capacity are counted. An instance whose template
/// cannot be resolved still counts toward the instance total but adds no
/// cpu, memory or disk.
pub fn compute_usage<'a, I, R>(instances: I, resolver: &R) -> ResourceUsage
where
    I: IntoIterator<Item = &'a Instance>,
    R: TemplateResolver + ?Sized,
{
    let mut usage = ResourceUsage::default();
    for instance in instances {
        if !instance.consumes_capacity() {
            continue;
        }
        usage.instances += 1;

        let Some(footprint) = resolver.resolve(instance) else {
            debug!(
                "Instance {} references unknown template {}, counting it without resources",
                instance.key(),
                instance.template
            );
            continue;
        };
        usage.cpu = usage.cpu.plus(footprint.resources.cpu);
        usage.memory = usage.memory.plus(footprint.resources.memory);
        if footprint.persistent
            && let Some(disk) = footprint.resources.disk
        {
            usage.disk = usage.disk.plus(disk);
        }
    }
    usage
}
