use async_trait::async_trait;
use pkg_types::event::UpdateEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Item delivered on a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem<T> {
    Event(UpdateEvent<T>),
    /// The subscriber fell behind and this many events were dropped. The
    /// local mirror can no longer be trusted and must be resynced.
    Lagged(u64),
}

/// Where a collection's snapshot and update events come from.
///
/// Implementations must deliver events for the same key in causal order;
/// events for different keys may interleave.
#[async_trait]
pub trait Source<T>: Send + Sync {
    /// Name used in logs, e.g. `templates` or `instances`.
    fn collection(&self) -> &str;

    /// One-shot read of every entity currently in the collection.
    async fn fetch_snapshot(&self) -> anyhow::Result<Vec<T>>;

    /// Open a long-lived event channel.
    async fn subscribe(&self) -> anyhow::Result<Subscription<T>>;
}

/// Receiving end of a source's event channel. Dropping it (or calling
/// [`unsubscribe`](Self::unsubscribe)) stops the task feeding it.
pub struct Subscription<T> {
    rx: mpsc::Receiver<StreamItem<T>>,
    pump: Option<JoinHandle<()>>,
}

impl<T> Subscription<T> {
    pub fn new(rx: mpsc::Receiver<StreamItem<T>>, pump: JoinHandle<()>) -> Self {
        Self {
            rx,
            pump: Some(pump),
        }
    }

    /// Next item, or `None` once the source has closed the channel.
    pub async fn next(&mut self) -> Option<StreamItem<T>> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
