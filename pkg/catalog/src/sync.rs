use pkg_constants::state::ENGINE_QUEUE;
use pkg_state::source::{Source, StreamItem};
use pkg_types::event::UpdateEvent;
use pkg_types::instance::Instance;
use pkg_types::template::Template;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::catalog::{Catalog, CatalogView, SyncMessage};

/// Running sync engine. Dropping it stops every task it spawned.
pub struct EngineHandle {
    view: watch::Receiver<CatalogView>,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    /// A receiver that observes every published view.
    pub fn subscribe(&self) -> watch::Receiver<CatalogView> {
        self.view.clone()
    }

    /// The most recently published view.
    pub fn current(&self) -> CatalogView {
        self.view.borrow().clone()
    }

    /// Wait until a published view satisfies `ready`.
    pub async fn wait_for<F>(&mut self, ready: F) -> anyhow::Result<CatalogView>
    where
        F: FnMut(&CatalogView) -> bool,
    {
        let view = self
            .view
            .wait_for(ready)
            .await
            .map_err(|_| anyhow::anyhow!("sync engine stopped"))?;
        Ok(view.clone())
    }

    pub fn shutdown(self) {}
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Start the engine: one follower task per source feeding a single writer
/// that owns `catalog` and republishes its view after every change.
///
/// `retry` is how long a follower waits after a failed fetch or subscribe,
/// or after its stream closes, before trying again.
pub fn spawn_engine<TS, IS>(
    catalog: Catalog,
    templates: TS,
    instances: IS,
    retry: Duration,
) -> EngineHandle
where
    TS: Source<Template> + 'static,
    IS: Source<Instance> + 'static,
{
    let (tx, rx) = mpsc::channel(ENGINE_QUEUE);
    let (view_tx, view_rx) = watch::channel(catalog.view());

    let tasks = vec![
        tokio::spawn(run(catalog, rx, view_tx)),
        tokio::spawn(follow::<Template, _>(
            Arc::new(templates),
            tx.clone(),
            SyncMessage::TemplatesSnapshot,
            SyncMessage::TemplateEvent,
            retry,
        )),
        tokio::spawn(follow::<Instance, _>(
            Arc::new(instances),
            tx,
            SyncMessage::InstancesSnapshot,
            SyncMessage::InstanceEvent,
            retry,
        )),
    ];

    EngineHandle {
        view: view_rx,
        tasks,
    }
}

/// The single writer: applies messages in arrival order and publishes.
async fn run(
    mut catalog: Catalog,
    mut rx: mpsc::Receiver<SyncMessage>,
    view_tx: watch::Sender<CatalogView>,
) {
    info!("Sync engine started");
    while let Some(message) = rx.recv().await {
        if catalog.handle(message) {
            view_tx.send_replace(catalog.view());
        }
    }
    let (templates, instances) = catalog.stats();
    info!(
        "Sync engine stopped (templates: {} events, {} resyncs; instances: {} events, {} resyncs)",
        templates.events_applied, templates.resyncs, instances.events_applied, instances.resyncs
    );
}

/// Keep one collection flowing into `tx`.
///
/// Subscribes before fetching the snapshot so nothing emitted in between is
/// missed; events that the snapshot already reflects are upserts and apply
/// harmlessly. A lagged or closed stream triggers a fresh subscribe and
/// snapshot, which the catalog treats as a forced resync.
async fn follow<T, S>(
    source: Arc<S>,
    tx: mpsc::Sender<SyncMessage>,
    snapshot: fn(Vec<T>) -> SyncMessage,
    event: fn(UpdateEvent<T>) -> SyncMessage,
    retry: Duration,
) where
    T: Send + 'static,
    S: Source<T> + ?Sized,
{
    let collection = source.collection().to_string();
    loop {
        let mut subscription = match source.subscribe().await {
            Ok(s) => s,
            Err(e) => {
                warn!("{}: subscribe failed: {}", collection, e);
                tokio::time::sleep(retry).await;
                continue;
            }
        };
        let items = match source.fetch_snapshot().await {
            Ok(items) => items,
            Err(e) => {
                warn!("{}: snapshot failed: {}", collection, e);
                tokio::time::sleep(retry).await;
                continue;
            }
        };
        if tx.send(snapshot(items)).await.is_err() {
            return;
        }

        let lagged = loop {
            match subscription.next().await {
                Some(StreamItem::Event(e)) => {
                    if tx.send(event(e)).await.is_err() {
                        return;
                    }
                }
                Some(StreamItem::Lagged(n)) => {
                    warn!("{}: missed {} events, resyncing", collection, n);
                    break true;
                }
                None => {
                    info!("{}: stream closed, reconnecting", collection);
                    break false;
                }
            }
        };
        subscription.unsubscribe();
        if !lagged {
            tokio::time::sleep(retry).await;
        }
    }
}
