//! Asset probing: does a candidate URL actually load?

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Checks whether an asset URL is loadable
#[async_trait]
pub trait AssetProbe: Send + Sync {
    async fn probe(&self, url: &str) -> bool;
}

/// Probe over HTTP with a HEAD request; any 2xx counts as loadable
pub struct HttpAssetProbe {
    client: Client,
}

impl HttpAssetProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

#[async_trait]
impl AssetProbe for HttpAssetProbe {
    async fn probe(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => {
                let ok = response.status().is_success();
                debug!("Probe {} -> {}", url, response.status());
                ok
            }
            Err(e) => {
                debug!("Probe {} failed: {}", url, e);
                false
            }
        }
    }
}
