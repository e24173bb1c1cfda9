//! Shared data model for the labdash engine: resource quantities, quotas,
//! the template and instance entities, and the update events that keep
//! local mirrors of them current.

pub mod config;
pub mod event;
pub mod instance;
pub mod meta;
pub mod quantity;
pub mod quota;
pub mod template;
pub mod validate;
