use pkg_constants::quota::{
    DEFAULT_QUOTA_CPU_CORES, DEFAULT_QUOTA_INSTANCES, DEFAULT_QUOTA_MEMORY_BYTES,
};
use serde::{Deserialize, Serialize};

use crate::quantity::{self, Dimension, Quantity};

/// Upper bound on what a workspace may consume. Without `disk` no disk
/// check is performed at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceQuota {
    #[serde(with = "quantity::cpu")]
    pub cpu: Quantity,
    #[serde(with = "quantity::memory")]
    pub memory: Quantity,
    #[serde(default, with = "quantity::disk_opt", skip_serializing_if = "Option::is_none")]
    pub disk: Option<Quantity>,
    pub instances: u32,
}

impl Default for ResourceQuota {
    /// Personal workspace defaults: 2 cores, 4Gi memory, 2 instances.
    fn default() -> Self {
        Self {
            cpu: Quantity::cpu(DEFAULT_QUOTA_CPU_CORES),
            memory: Quantity::memory(DEFAULT_QUOTA_MEMORY_BYTES),
            disk: None,
            instances: DEFAULT_QUOTA_INSTANCES,
        }
    }
}

/// Resources currently consumed, derived from running instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    #[serde(with = "quantity::cpu")]
    pub cpu: Quantity,
    #[serde(with = "quantity::memory")]
    pub memory: Quantity,
    #[serde(default = "zero_disk", with = "quantity::disk")]
    pub disk: Quantity,
    pub instances: u32,
}

fn zero_disk() -> Quantity {
    Quantity::zero(Dimension::Disk)
}

impl Default for ResourceUsage {
    fn default() -> Self {
        Self {
            cpu: Quantity::zero(Dimension::Cpu),
            memory: Quantity::zero(Dimension::Memory),
            disk: zero_disk(),
            instances: 0,
        }
    }
}

/// Footprint of one prospective instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    #[serde(with = "quantity::cpu")]
    pub cpu: Quantity,
    #[serde(with = "quantity::memory")]
    pub memory: Quantity,
    #[serde(default, with = "quantity::disk_opt", skip_serializing_if = "Option::is_none")]
    pub disk: Option<Quantity>,
}

/// One line of a quota breakdown, in canonical units. `available` is
/// `limit - used` and goes negative once a workspace is over quota.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceDetail<T> {
    pub used: T,
    pub requested: T,
    pub available: T,
    pub limit: T,
}

impl ResourceDetail<f64> {
    /// Rounded share of the limit already in use; 0 for a zero limit.
    pub fn percent_used(&self) -> u32 {
        percent(self.used, self.limit)
    }
}

impl ResourceDetail<i64> {
    pub fn percent_used(&self) -> u32 {
        percent(self.used as f64, self.limit as f64)
    }
}

fn percent(used: f64, limit: f64) -> u32 {
    if limit <= 0.0 {
        return 0;
    }
    (used / limit * 100.0).round().max(0.0) as u32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaDetails {
    pub cpu: ResourceDetail<f64>,
    pub memory: ResourceDetail<f64>,
    pub instances: ResourceDetail<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<ResourceDetail<f64>>,
}

/// Outcome of checking a request against a quota. `valid` holds exactly
/// when `errors` is empty; warnings never block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub details: QuotaDetails,
}
