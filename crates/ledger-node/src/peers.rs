use anyhow::Result;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::constants::PEER_REQUEST_TIMEOUT;

/// Known peer base URLs and a client for fire-and-forget relay.
pub struct Peers {
    urls: RwLock<Vec<String>>,
    client: reqwest::Client,
}

impl Peers {
    pub fn new(initial: impl IntoIterator<Item = String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PEER_REQUEST_TIMEOUT)
            .build()?;
        let mut urls: Vec<String> = Vec::new();
        for url in initial {
            let url = normalize(&url);
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        Ok(Self {
            urls: RwLock::new(urls),
            client,
        })
    }

    /// Adds a peer; returns `false` if it was already known.
    pub async fn add(&self, url: &str) -> bool {
        let url = normalize(url);
        let mut urls = self.urls.write().await;
        if urls.contains(&url) {
            return false;
        }
        info!(peer = %url, "peer added");
        urls.push(url);
        true
    }

    pub async fn list(&self) -> Vec<String> {
        self.urls.read().await.clone()
    }

    /// POSTs `body` to `path` on every peer without waiting for the result.
    /// Failures are logged and otherwise ignored.
    pub async fn broadcast<T: Serialize>(&self, path: &'static str, body: &T) {
        let payload = match serde_json::to_value(body) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "relay payload not serializable");
                return;
            }
        };
        for peer in self.list().await {
            let client = self.client.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                let url = format!("{peer}{path}");
                match client.post(&url).json(&payload).send().await {
                    Ok(res) => debug!(%url, status = %res.status(), "relayed"),
                    Err(e) => debug!(%url, error = %e, "relay failed"),
                }
            });
        }
    }
}

fn normalize(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}
