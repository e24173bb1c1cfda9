//! The engine's top layer: templates joined with their instances, the
//! per-template create/delete affordances derived from them, and the
//! single-writer loop that keeps both collections in sync with a source.

pub mod catalog;
pub mod join;
pub mod sync;

#[cfg(test)]
mod testutil;

pub use catalog::{Affordance, Catalog, CatalogView, SyncMessage};
pub use join::{JoinedTemplate, joined_view};
pub use sync::{EngineHandle, spawn_engine};
