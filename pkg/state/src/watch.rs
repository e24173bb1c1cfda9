use async_trait::async_trait;
use pkg_constants::state::{FEED_CHANNEL_CAPACITY, SUBSCRIPTION_BUFFER};
use pkg_types::event::{UpdateEvent, WatchEvent};
use pkg_types::meta::{Keyed, ObjectKey};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, warn};

use crate::source::{Source, StreamItem, Subscription};

/// In-memory authoritative collection that records every mutation as a
/// sequenced watch event. Subscribers receive new events as they are emitted.
///
/// Stands in for the control plane in tests.
#[derive(Clone)]
pub struct EventFeed<T> {
    name: String,
    inner: Arc<RwLock<FeedInner<T>>>,
    sender: broadcast::Sender<WatchEvent<T>>,
}

struct FeedInner<T> {
    seq: u64,
    current: BTreeMap<ObjectKey, T>,
}

impl<T: Clone + Send + Sync + 'static> EventFeed<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, FEED_CHANNEL_CAPACITY)
    }

    /// Create a feed whose subscribers lag after `channel` undelivered
    /// events.
    pub fn with_capacity(name: impl Into<String>, channel: usize) -> Self {
        let (sender, _) = broadcast::channel(channel.max(1));
        Self {
            name: name.into(),
            inner: Arc::new(RwLock::new(FeedInner {
                seq: 0,
                current: BTreeMap::new(),
            })),
            sender,
        }
    }

    /// Set the initial contents without emitting events.
    pub async fn seed<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
        T: Keyed,
    {
        let mut inner = self.inner.write().await;
        inner.current = items.into_iter().map(|i| (i.key(), i)).collect();
        info!("{} feed seeded with {} items", self.name, inner.current.len());
    }

    /// Apply `event` to the feed's own state and broadcast it. Returns the
    /// sequence number assigned to it.
    pub async fn emit(&self, event: UpdateEvent<T>) -> u64 {
        let mut inner = self.inner.write().await;
        match &event {
            UpdateEvent::Added { key, payload } | UpdateEvent::Modified { key, payload } => {
                inner.current.insert(key.clone(), payload.clone());
            }
            UpdateEvent::Deleted { key } => {
                inner.current.remove(key);
            }
        }

        inner.seq += 1;
        let seq = inner.seq;
        let wire = event.into_watch_event(seq);
        debug!("{} feed: seq={} {} {}", self.name, seq, wire.kind, wire.key);

        // Broadcast to subscribers (ignore errors if no receivers)
        let _ = self.sender.send(wire);
        seq
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.current.len()
    }
}

#[async_trait]
impl<T: Keyed + Clone + Send + Sync + 'static> Source<T> for EventFeed<T> {
    fn collection(&self) -> &str {
        &self.name
    }

    async fn fetch_snapshot(&self) -> anyhow::Result<Vec<T>> {
        let inner = self.inner.read().await;
        Ok(inner.current.values().cloned().collect())
    }

    async fn subscribe(&self) -> anyhow::Result<Subscription<T>> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let mut stream = BroadcastStream::new(self.sender.subscribe());
        let name = self.name.clone();
        info!("{} feed: new subscription", name);

        let pump = tokio::spawn(async move {
            while let Some(result) = stream.next().await {
                let item = match result {
                    Ok(wire) => match UpdateEvent::try_from(wire) {
                        Ok(event) => StreamItem::Event(event),
                        Err(e) => {
                            warn!("{} feed: dropping malformed event: {}", name, e);
                            continue;
                        }
                    },
                    Err(BroadcastStreamRecvError::Lagged(n)) => {
                        warn!("{} feed: subscriber lagged by {} events", name, n);
                        StreamItem::Lagged(n)
                    }
                };
                if tx.send(item).await.is_err() {
                    break;
                }
            }
            debug!("{} feed: subscription closed", name);
        });

        Ok(Subscription::new(rx, pump))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: String,
        value: u32,
    }

    impl Keyed for Item {
        fn key(&self) -> ObjectKey {
            ObjectKey::new("ns", &self.name)
        }
    }

    fn item(name: &str, value: u32) -> Item {
        Item {
            name: name.to_string(),
            value,
        }
    }

    #[tokio::test]
    async fn snapshot_reflects_emitted_events() {
        let feed = EventFeed::new("items");
        feed.seed(vec![item("a", 1), item("b", 2)]).await;
        assert_eq!(feed.emit(UpdateEvent::modified(item("a", 5))).await, 1);
        assert_eq!(feed.emit(UpdateEvent::deleted(ObjectKey::new("ns", "b"))).await, 2);

        let snapshot = feed.fetch_snapshot().await.unwrap();
        assert_eq!(snapshot, vec![item("a", 5)]);
        assert_eq!(feed.len().await, 1);
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let feed = EventFeed::new("items");
        let mut sub = feed.subscribe().await.unwrap();

        feed.emit(UpdateEvent::added(item("a", 1))).await;
        feed.emit(UpdateEvent::modified(item("a", 2))).await;

        assert_eq!(
            sub.next().await,
            Some(StreamItem::Event(UpdateEvent::added(item("a", 1))))
        );
        assert_eq!(
            sub.next().await,
            Some(StreamItem::Event(UpdateEvent::modified(item("a", 2))))
        );
    }

    #[tokio::test]
    async fn slow_subscriber_is_told_it_lagged() {
        let feed = EventFeed::with_capacity("items", 2);
        let mut sub = feed.subscribe().await.unwrap();
        // Fill the subscription buffer so the pump stops draining the
        // broadcast channel, then overflow the channel.
        for i in 0..(SUBSCRIPTION_BUFFER as u32 + 8) {
            feed.emit(UpdateEvent::added(item(&format!("i{}", i), i))).await;
        }

        let mut lagged = false;
        while let Ok(Some(next)) =
            tokio::time::timeout(std::time::Duration::from_millis(200), sub.next()).await
        {
            if matches!(next, StreamItem::Lagged(_)) {
                lagged = true;
                break;
            }
        }
        assert!(lagged);
    }
}
