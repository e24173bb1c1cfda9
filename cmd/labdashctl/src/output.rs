use pkg_catalog::CatalogView;
use pkg_types::quantity::{Dimension, format_amount};
use pkg_types::quota::{ResourceDetail, ResourceQuota, ResourceUsage, ValidationResult};

pub fn print_validation(result: &ValidationResult) {
    println!("{}", if result.valid { "OK" } else { "REJECTED" });
    println!(
        "{:<10} {:>10} {:>10} {:>10} {:>10}",
        "RESOURCE", "REQUESTED", "USED", "AVAILABLE", "LIMIT"
    );
    let d = &result.details;
    print_detail_row("cpu", &d.cpu, Dimension::Cpu);
    print_detail_row("memory", &d.memory, Dimension::Memory);
    if let Some(disk) = &d.disk {
        print_detail_row("disk", disk, Dimension::Disk);
    }
    println!(
        "{:<10} {:>10} {:>10} {:>10} {:>10}",
        "instances",
        d.instances.requested,
        d.instances.used,
        d.instances.available,
        d.instances.limit
    );
    for error in &result.errors {
        println!("error:   {}", error);
    }
    for warning in &result.warnings {
        println!("warning: {}", warning);
    }
}

fn print_detail_row(label: &str, detail: &ResourceDetail<f64>, dimension: Dimension) {
    println!(
        "{:<10} {:>10} {:>10} {:>10} {:>10}",
        label,
        format_amount(detail.requested, dimension),
        format_amount(detail.used, dimension),
        format_amount(detail.available, dimension),
        format_amount(detail.limit, dimension)
    );
}

/// Quota overview: used / limit and percentage per dimension.
pub fn print_usage(usage: &ResourceUsage, quota: &ResourceQuota) {
    println!("{:<10} {:>10} {:>10} {:>6}", "RESOURCE", "USED", "LIMIT", "%");
    let rows = [
        ("cpu", usage.cpu.amount(), quota.cpu.amount(), Dimension::Cpu),
        ("memory", usage.memory.amount(), quota.memory.amount(), Dimension::Memory),
    ];
    for (label, used, limit, dimension) in rows {
        print_usage_row(label, used, limit, dimension);
    }
    if let Some(disk) = quota.disk {
        print_usage_row("disk", usage.disk.amount(), disk.amount(), Dimension::Disk);
    }
    let instances = ResourceDetail {
        used: i64::from(usage.instances),
        requested: 0,
        available: i64::from(quota.instances) - i64::from(usage.instances),
        limit: i64::from(quota.instances),
    };
    println!(
        "{:<10} {:>10} {:>10} {:>5}%",
        "instances",
        instances.used,
        instances.limit,
        instances.percent_used()
    );
}

fn print_usage_row(label: &str, used: f64, limit: f64, dimension: Dimension) {
    let detail = ResourceDetail {
        used,
        requested: 0.0,
        available: limit - used,
        limit,
    };
    println!(
        "{:<10} {:>10} {:>10} {:>5}%",
        label,
        format_amount(used, dimension),
        format_amount(limit, dimension),
        detail.percent_used()
    );
}

pub fn print_view(view: &CatalogView) {
    println!(
        "{:<32} {:<16} {:>8} {:>9} {:>6}  {}",
        "TEMPLATE", "TYPE", "CPU", "MEMORY", "COUNT", "CREATE"
    );
    for (joined, affordance) in view.templates.iter().zip(&view.affordances) {
        let t = &joined.template;
        let create = if affordance.can_create {
            "yes".to_string()
        } else {
            format!("no: {}", affordance.reason.as_deref().unwrap_or("blocked"))
        };
        println!(
            "{:<32} {:<16} {:>8} {:>9} {:>6}  {}",
            t.display_name(),
            t.environment_type.to_string(),
            t.resources.cpu.to_string(),
            t.resources.memory.to_string(),
            joined.instance_count,
            create
        );
        for instance in &joined.instances {
            println!("  - {:<28} {}", instance.name, instance.status.phase);
        }
    }
    if view.templates.is_empty() {
        println!("(no templates)");
    }
    println!();
    print_usage(&view.usage, &view.quota);
}
