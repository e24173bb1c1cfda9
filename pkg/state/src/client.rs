use async_trait::async_trait;
use futures_util::StreamExt;
use pkg_constants::network::{API_PREFIX, WATCH_PATH};
use pkg_constants::state::SUBSCRIPTION_BUFFER;
use pkg_types::event::{UpdateEvent, WatchEvent};
use pkg_types::meta::Keyed;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::{debug, info, warn};

use crate::source::{Source, StreamItem, Subscription};

/// Control-plane backed source: snapshots via
/// `GET {api}/api/v1/namespaces/{ns}/{collection}` and events over a
/// WebSocket at `{api}/api/v1/watch?namespace={ns}&collection={collection}`.
pub struct HttpSource<T> {
    client: reqwest::Client,
    api: String,
    token: Option<String>,
    namespace: String,
    collection: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T> HttpSource<T> {
    pub fn new(
        api: &str,
        token: Option<String>,
        namespace: impl Into<String>,
        collection: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            client,
            api: api.trim_end_matches('/').to_string(),
            token,
            namespace: namespace.into(),
            collection: collection.into(),
            _entity: PhantomData,
        })
    }

    fn list_url(&self) -> String {
        format!(
            "{}{}/namespaces/{}/{}",
            self.api, API_PREFIX, self.namespace, self.collection
        )
    }

    fn watch_url(&self) -> String {
        let base = if let Some(rest) = self.api.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.api.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.api.clone()
        };
        format!(
            "{}{}?namespace={}&collection={}",
            base, WATCH_PATH, self.namespace, self.collection
        )
    }
}

#[async_trait]
impl<T> Source<T> for HttpSource<T>
where
    T: Keyed + DeserializeOwned + Send + 'static,
{
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn fetch_snapshot(&self) -> anyhow::Result<Vec<T>> {
        let url = self.list_url();
        debug!("Fetching snapshot from {}", url);

        let mut req = self.client.get(&url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("GET {} failed: {}", url, e))?;
        if !resp.status().is_success() {
            anyhow::bail!("GET {} returned {}", url, resp.status());
        }
        let items: Vec<T> = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Invalid snapshot from {}: {}", url, e))?;
        info!("Fetched {} {} from {}", items.len(), self.collection, self.namespace);
        Ok(items)
    }

    async fn subscribe(&self) -> anyhow::Result<Subscription<T>> {
        let url = self.watch_url();
        let mut request = url.as_str().into_client_request()?;
        if let Some(token) = &self.token {
            request.headers_mut().insert(
                "Authorization",
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        let (mut ws, _) = connect_async(request)
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket connect to {} failed: {}", url, e))?;
        info!("Watching {} in {}", self.collection, self.namespace);

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let collection = self.collection.clone();
        let pump = tokio::spawn(async move {
            while let Some(msg) = ws.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("{} watch stream error: {}", collection, e);
                        break;
                    }
                };
                let event = serde_json::from_str::<WatchEvent<T>>(text.as_str())
                    .map_err(anyhow::Error::from)
                    .and_then(|wire| UpdateEvent::try_from(wire).map_err(anyhow::Error::from));
                match event {
                    Ok(event) => {
                        if tx.send(StreamItem::Event(event)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("{} watch: dropping malformed event: {}", collection, e),
                }
            }
            info!("{} watch stream closed", collection);
        });

        Ok(Subscription::new(rx, pump))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::template::Template;

    #[test]
    fn urls_follow_api_layout() {
        let source: HttpSource<Template> =
            HttpSource::new("http://127.0.0.1:8080/", None, "workspace-os", "templates").unwrap();
        assert_eq!(
            source.list_url(),
            "http://127.0.0.1:8080/api/v1/namespaces/workspace-os/templates"
        );
        assert_eq!(
            source.watch_url(),
            "ws://127.0.0.1:8080/api/v1/watch?namespace=workspace-os&collection=templates"
        );
    }

    #[test]
    fn secure_api_watches_over_wss() {
        let source: HttpSource<Template> =
            HttpSource::new("https://lab.example.org", None, "tenant-a", "instances").unwrap();
        assert!(source.watch_url().starts_with("wss://lab.example.org/api/v1/watch"));
    }
}
