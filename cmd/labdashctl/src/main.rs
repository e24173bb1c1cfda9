mod fixture;
mod output;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use pkg_catalog::{Catalog, CatalogView, spawn_engine};
use pkg_constants::network::{DEFAULT_API_ADDR, INSTANCES_COLLECTION, TEMPLATES_COLLECTION};
use pkg_constants::paths::DEFAULT_CONFIG;
use pkg_constants::quota::DEFAULT_WARNING_RATIO;
use pkg_quota::{QuotaValidator, RequestForm};
use pkg_state::client::HttpSource;
use pkg_types::config::{EngineConfigFile, load_config_file};
use pkg_types::instance::Instance;
use pkg_types::quantity::{Dimension, Quantity};
use pkg_types::quota::{ResourceQuota, ResourceUsage};
use pkg_types::template::Template;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::fixture::Fixture;

#[derive(Parser)]
#[command(name = "labdashctl", about = "Quota accounting and catalog sync for lab workspaces")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_CONFIG)]
    config: String,

    /// Control-plane API endpoint
    #[arg(long)]
    api: Option<String>,

    /// Bearer token for the control plane
    #[arg(long)]
    token: Option<String>,

    /// Warn when a request takes more than this share of what is left
    #[arg(long)]
    warning_ratio: Option<f64>,

    /// Override the quota's CPU limit, e.g. "8" or "8000m"
    #[arg(long)]
    quota_cpu: Option<String>,

    /// Override the quota's memory limit, e.g. "16Gi"
    #[arg(long)]
    quota_memory: Option<String>,

    /// Override the quota's disk limit
    #[arg(long)]
    quota_disk: Option<String>,

    /// Override the quota's instance limit
    #[arg(long)]
    quota_instances: Option<u32>,

    #[arg(long, short, value_enum, default_value_t = Output::Table)]
    output: Output,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Output {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether one more instance of the given size fits the quota
    Validate {
        #[arg(long)]
        cpu: String,
        #[arg(long)]
        memory: String,
        #[arg(long)]
        disk: Option<String>,
        /// Take current usage from a recorded session instead of the flags below
        #[arg(long)]
        fixture: Option<PathBuf>,
        #[arg(long, default_value = "0")]
        used_cpu: String,
        #[arg(long, default_value = "0")]
        used_memory: String,
        #[arg(long, default_value = "0")]
        used_disk: String,
        #[arg(long, default_value_t = 0)]
        used_instances: u32,
    },
    /// Show current usage against the quota for a recorded session
    Usage { fixture: PathBuf },
    /// Show templates with their instances and create affordances for a
    /// recorded session
    View { fixture: PathBuf },
    /// Follow a live control plane and print the view on every change
    Watch {
        /// Namespace holding the tenant's instances
        #[arg(long)]
        tenant_namespace: Option<String>,
        /// Namespace holding the workspace's templates
        #[arg(long)]
        workspace_namespace: Option<String>,
        /// Seconds to wait before reconnecting a dropped stream
        #[arg(long, default_value_t = 5)]
        retry_secs: u64,
        /// Print the first complete view and exit
        #[arg(long, default_value_t = false)]
        once: bool,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

/// Merge: CLI args > config file > defaults
fn resolve_quota(cli: &Cli, file_cfg: &EngineConfigFile) -> anyhow::Result<ResourceQuota> {
    let mut quota = file_cfg.quota.clone().unwrap_or_default();
    if let Some(cpu) = &cli.quota_cpu {
        quota.cpu = Quantity::parse(cpu, Dimension::Cpu).context("--quota-cpu")?;
    }
    if let Some(memory) = &cli.quota_memory {
        quota.memory = Quantity::parse(memory, Dimension::Memory).context("--quota-memory")?;
    }
    if let Some(disk) = &cli.quota_disk {
        quota.disk = Some(Quantity::parse(disk, Dimension::Disk).context("--quota-disk")?);
    }
    if let Some(instances) = cli.quota_instances {
        quota.instances = instances;
    }
    Ok(quota)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_catalog(
    path: &Path,
    quota: ResourceQuota,
    validator: QuotaValidator,
) -> anyhow::Result<Catalog> {
    let mut catalog = Catalog::new(quota, validator);
    Fixture::load(path)?.replay(&mut catalog);
    Ok(catalog)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    // Load config file (returns defaults if file not found)
    let file_cfg: EngineConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);

    let quota = resolve_quota(&cli, &file_cfg)?;
    let warning_ratio = cli
        .warning_ratio
        .or(file_cfg.warning_ratio)
        .unwrap_or(DEFAULT_WARNING_RATIO);
    let validator = QuotaValidator::new(warning_ratio);

    match &cli.command {
        Commands::Validate {
            cpu,
            memory,
            disk,
            fixture,
            used_cpu,
            used_memory,
            used_disk,
            used_instances,
        } => {
            let usage = match fixture {
                Some(path) => load_catalog(path, quota.clone(), validator)?.usage(),
                None => ResourceUsage {
                    cpu: Quantity::parse(used_cpu, Dimension::Cpu).context("--used-cpu")?,
                    memory: Quantity::parse(used_memory, Dimension::Memory)
                        .context("--used-memory")?,
                    disk: Quantity::parse(used_disk, Dimension::Disk).context("--used-disk")?,
                    instances: *used_instances,
                },
            };
            let form = RequestForm {
                cpu: cpu.clone(),
                memory: memory.clone(),
                disk: disk.clone(),
            };
            let result = validator.validate_form(&form, &quota, &usage);
            match cli.output {
                Output::Json => print_json(&result)?,
                Output::Table => output::print_validation(&result),
            }
            if !result.valid {
                std::process::exit(1);
            }
        }
        Commands::Usage { fixture } => {
            let catalog = load_catalog(fixture, quota, validator)?;
            let usage = catalog.usage();
            match cli.output {
                Output::Json => print_json(&usage)?,
                Output::Table => output::print_usage(&usage, catalog.quota()),
            }
        }
        Commands::View { fixture } => {
            let view = load_catalog(fixture, quota, validator)?.view();
            show(&view, cli.output)?;
        }
        Commands::Watch {
            tenant_namespace,
            workspace_namespace,
            retry_secs,
            once,
        } => {
            let api = cli
                .api
                .clone()
                .or(file_cfg.api.clone())
                .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
            let token = cli.token.clone().or(file_cfg.token.clone());
            let Some(tenant) = tenant_namespace
                .clone()
                .or(file_cfg.tenant_namespace.clone())
            else {
                anyhow::bail!("no tenant namespace: pass --tenant-namespace or set tenant-namespace in the config file");
            };
            let Some(workspace) = workspace_namespace
                .clone()
                .or(file_cfg.workspace_namespace.clone())
            else {
                anyhow::bail!("no workspace namespace: pass --workspace-namespace or set workspace-namespace in the config file");
            };

            info!("Watching {} (templates in {}, instances in {})", api, workspace, tenant);
            let templates: HttpSource<Template> =
                HttpSource::new(&api, token.clone(), workspace, TEMPLATES_COLLECTION)?;
            let instances: HttpSource<Instance> =
                HttpSource::new(&api, token, tenant, INSTANCES_COLLECTION)?;
            let mut engine = spawn_engine(
                Catalog::new(quota, validator),
                templates,
                instances,
                Duration::from_secs(*retry_secs),
            );

            let view = engine.wait_for(|v| v.ready).await?;
            show(&view, cli.output)?;
            if *once {
                return Ok(());
            }

            let mut views = engine.subscribe();
            views.mark_unchanged();
            loop {
                tokio::select! {
                    changed = views.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let view = views.borrow_and_update().clone();
                        show(&view, cli.output)?;
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Interrupted, shutting down");
                        break;
                    }
                }
            }
            engine.shutdown();
        }
    }

    Ok(())
}

fn show(view: &CatalogView, format: Output) -> anyhow::Result<()> {
    match format {
        Output::Json => print_json(view),
        Output::Table => {
            output::print_view(view);
            println!();
            Ok(())
        }
    }
}
