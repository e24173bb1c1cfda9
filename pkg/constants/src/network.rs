//! Control-plane API constants.

/// Default control-plane API address (HTTP).
pub const DEFAULT_API_ADDR: &str = "http://127.0.0.1:8080";

/// Versioned API prefix for collection listings.
pub const API_PREFIX: &str = "/api/v1";

/// Path of the WebSocket watch endpoint, relative to the API address.
pub const WATCH_PATH: &str = "/api/v1/watch";

/// Collection segment for workspace templates.
pub const TEMPLATES_COLLECTION: &str = "templates";

/// Collection segment for tenant instances.
pub const INSTANCES_COLLECTION: &str = "instances";
