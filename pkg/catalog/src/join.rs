use pkg_types::instance::Instance;
use pkg_types::meta::{Keyed, ObjectKey};
use pkg_types::template::Template;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// A template together with the instances created from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedTemplate {
    pub template: Template,
    /// Oldest first; instances without a creation time lead.
    pub instances: Vec<Instance>,
    pub instance_count: usize,
}

/// Group `instances` under the templates they reference.
///
/// Every template appears exactly once, in iteration order, even with no
/// instances. Instances whose template is not among `templates` are left
/// out and logged.
pub fn joined_view<'a, T, I>(templates: T, instances: I) -> Vec<JoinedTemplate>
where
    T: IntoIterator<Item = &'a Template>,
    I: IntoIterator<Item = &'a Instance>,
{
    let mut by_template: BTreeMap<&ObjectKey, Vec<&Instance>> = BTreeMap::new();
    for instance in instances {
        by_template
            .entry(&instance.template)
            .or_default()
            .push(instance);
    }

    let joined: Vec<JoinedTemplate> = templates
        .into_iter()
        .map(|template| {
            let mut members = by_template.remove(&template.key()).unwrap_or_default();
            members.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.key().cmp(&b.key()))
            });
            let instances: Vec<Instance> = members.into_iter().cloned().collect();
            JoinedTemplate {
                template: template.clone(),
                instance_count: instances.len(),
                instances,
            }
        })
        .collect();

    for (key, orphans) in by_template {
        for orphan in orphans {
            warn!(
                "Instance {} references template {} which is not known, leaving it out",
                orphan.key(),
                key
            );
        }
    }
    joined
}
