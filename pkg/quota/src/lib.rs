//! Client-side quota accounting: how much a workspace is using, and whether
//! one more instance of a template fits.

pub mod form;
pub mod usage;
pub mod validator;

pub use form::RequestForm;
pub use usage::{Footprint, TemplateResolver, compute_usage};
pub use validator::{QuotaValidator, validate_request};
