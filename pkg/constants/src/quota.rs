//! Quota accounting constants.

/// Requests above this share of the available capacity raise a warning.
pub const DEFAULT_WARNING_RATIO: f64 = 0.8;

/// Instances a single request asks for.
pub const REQUESTED_INSTANCES: u32 = 1;

// ─── Personal workspace defaults ──────────────────────────────────────────

/// Default CPU quota of a personal workspace, in cores.
pub const DEFAULT_QUOTA_CPU_CORES: f64 = 2.0;

/// Default memory quota of a personal workspace, in bytes (4Gi).
pub const DEFAULT_QUOTA_MEMORY_BYTES: f64 = 4.0 * GIB;

/// Default instance quota of a personal workspace.
pub const DEFAULT_QUOTA_INSTANCES: u32 = 2;

// ─── Units ────────────────────────────────────────────────────────────────

/// Bytes in one mebibyte.
pub const MIB: f64 = 1024.0 * 1024.0;

/// Bytes in one gibibyte.
pub const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
