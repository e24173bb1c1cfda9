use pkg_constants::quota::{DEFAULT_WARNING_RATIO, REQUESTED_INSTANCES};
use pkg_types::quantity::{Dimension, Quantity, format_amount};
use pkg_types::quota::{
    QuotaDetails, ResourceDetail, ResourceQuota, ResourceRequest, ResourceUsage, ValidationResult,
};
use tracing::warn;

use crate::form::RequestForm;

/// Checks a single-instance request against a quota and current usage.
///
/// A dimension fails when the request exceeds what is left of the quota and
/// warns when it takes more than `warning_ratio` of what is left. Instances
/// have no warning tier.
#[derive(Debug, Clone, Copy)]
pub struct QuotaValidator {
    warning_ratio: f64,
}

impl Default for QuotaValidator {
    fn default() -> Self {
        Self {
            warning_ratio: DEFAULT_WARNING_RATIO,
        }
    }
}

impl QuotaValidator {
    /// Ratios outside `(0, 1]` fall back to the default.
    pub fn new(warning_ratio: f64) -> Self {
        if warning_ratio.is_finite() && warning_ratio > 0.0 && warning_ratio <= 1.0 {
            Self { warning_ratio }
        } else {
            warn!(
                "Ignoring warning ratio {}, using {}",
                warning_ratio, DEFAULT_WARNING_RATIO
            );
            Self::default()
        }
    }

    pub fn warning_ratio(&self) -> f64 {
        self.warning_ratio
    }

    pub fn validate(
        &self,
        requested: &ResourceRequest,
        quota: &ResourceQuota,
        usage: &ResourceUsage,
    ) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let cpu = self.check(requested.cpu, quota.cpu, usage.cpu, &mut errors, &mut warnings);
        let memory = self.check(
            requested.memory,
            quota.memory,
            usage.memory,
            &mut errors,
            &mut warnings,
        );
        // Disk only counts when both sides carry it.
        let disk = match (quota.disk, requested.disk) {
            (Some(limit), Some(req)) => {
                Some(self.check(req, limit, usage.disk, &mut errors, &mut warnings))
            }
            _ => None,
        };

        let limit = i64::from(quota.instances);
        let used = i64::from(usage.instances);
        let requested_instances = i64::from(REQUESTED_INSTANCES);
        let available = limit - used;
        if requested_instances > available {
            errors.push(format!(
                "Instance quota exceeded: Requested {}, Available {}/{}",
                requested_instances, available, limit
            ));
        }

        ValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
            details: QuotaDetails {
                cpu,
                memory,
                instances: ResourceDetail {
                    used,
                    requested: requested_instances,
                    available,
                    limit,
                },
                disk,
            },
        }
    }

    /// Validate a request typed in as text. Fields that fail to parse count
    /// as zero and their parse errors lead the error list.
    pub fn validate_form(
        &self,
        form: &RequestForm,
        quota: &ResourceQuota,
        usage: &ResourceUsage,
    ) -> ValidationResult {
        let (request, mut parse_errors) = form.resolve();
        let mut result = self.validate(&request, quota, usage);
        if !parse_errors.is_empty() {
            parse_errors.append(&mut result.errors);
            result.errors = parse_errors;
            result.valid = false;
        }
        result
    }

    fn check(
        &self,
        requested: Quantity,
        limit: Quantity,
        used: Quantity,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> ResourceDetail<f64> {
        let dimension = requested.dimension();
        let detail = ResourceDetail {
            used: used.amount(),
            requested: requested.amount(),
            available: limit.amount() - used.amount(),
            limit: limit.amount(),
        };

        let summary = || {
            format!(
                "Requested {}, Available {}/{}",
                format_amount(detail.requested, dimension),
                format_amount(detail.available, dimension),
                format_amount(detail.limit, dimension)
            )
        };
        if detail.requested > detail.available {
            errors.push(format!("{} quota exceeded: {}", dimension.label(), summary()));
        } else if detail.requested > detail.available * self.warning_ratio {
            let name = match dimension {
                Dimension::Cpu => dimension.label().to_string(),
                _ => dimension.to_string(),
            };
            warnings.push(format!("High {} usage: {}", name, summary()));
        }
        detail
    }
}

/// Validate with the default 80% warning threshold.
pub fn validate_request(
    requested: &ResourceRequest,
    quota: &ResourceQuota,
    usage: &ResourceUsage,
) -> ValidationResult {
    QuotaValidator::default().validate(requested, quota, usage)
}
