use pkg_constants::quota::GIB;
use pkg_types::instance::{Instance, InstancePhase, InstanceStatus};
use pkg_types::meta::ObjectKey;
use pkg_types::quantity::Quantity;
use pkg_types::template::{EnvironmentType, Template, TemplateResources};

pub const WORKSPACE: &str = "workspace-os";
pub const TENANT: &str = "tenant-bob";

/// One core, 1Gi, no disk.
pub fn template(name: &str) -> Template {
    sized_template(name, 1.0, 1.0)
}

pub fn sized_template(name: &str, cpu: f64, memory_gi: f64) -> Template {
    Template {
        name: name.to_string(),
        namespace: WORKSPACE.to_string(),
        pretty_name: None,
        description: None,
        environment_type: EnvironmentType::Container,
        resources: TemplateResources {
            cpu: Quantity::cpu(cpu),
            memory: Quantity::memory(memory_gi * GIB),
            disk: None,
        },
        persistent: false,
        gui: false,
        node_selector: None,
    }
}

/// A running, ready instance of `template`.
pub fn instance(name: &str, template: &str) -> Instance {
    Instance {
        name: name.to_string(),
        namespace: TENANT.to_string(),
        pretty_name: None,
        template: ObjectKey::new(WORKSPACE, template),
        running: true,
        status: InstanceStatus {
            phase: InstancePhase::Ready,
            ..Default::default()
        },
        created_at: None,
    }
}
