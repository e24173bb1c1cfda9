//! Local mirrors of remote entity collections.
//!
//! A [`collection::SyncedCollection`] is loaded once from a snapshot and then
//! kept current by applying update events one at a time. Snapshots and events
//! come from a [`source::Source`]: an in-memory [`watch::EventFeed`] or the
//! control plane over HTTP and WebSocket ([`client::HttpSource`]).

pub mod client;
pub mod collection;
pub mod source;
pub mod watch;
