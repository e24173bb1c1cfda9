//! Sync loop / event feed constants.

/// Capacity of the broadcast channel behind an in-memory event feed.
pub const FEED_CHANNEL_CAPACITY: usize = 1024;

/// Capacity of the channel each subscription forwards events into.
pub const SUBSCRIPTION_BUFFER: usize = 256;

/// Capacity of the engine's single inbound message queue.
pub const ENGINE_QUEUE: usize = 512;
