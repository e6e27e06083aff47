//! Remote secret service ("pod") client.
//!
//! The resolution core only sees the [`PodClient`] trait: an authenticated
//! fetch of one cell by its remote path, plus a credential slot the resolver
//! fills exactly once. The shipped implementation speaks HTTP via reqwest.

use crate::config::ConfigStore;
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::RwLock;
use tracing::{debug, warn};

/// Wire contract to the pod.
#[async_trait]
pub trait PodClient: Send + Sync {
    /// Install the credential used for subsequent fetches.
    fn set_credentials(&self, credentials: Credentials);

    /// Fetch one cell by remote path (`{appId}/{envName}/{cellId}`).
    /// Returns the raw JSON body; the caller extracts and validates the
    /// value.
    async fn fetch_cell(&self, remote_path: &str) -> Result<serde_json::Value>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP pod client.
#[derive(Debug)]
pub struct HttpPodClient {
    base_url: String,
    http: reqwest::Client,
    credentials: RwLock<Option<Credentials>>,
}

impl HttpPodClient {
    /// Build a client for the given pod base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::build(base_url, None)
    }

    /// Build a client from the loaded configuration, honoring the proxy
    /// settings (forced off in deployment mode by the config layer).
    pub fn from_config(config: &ConfigStore) -> Result<Self> {
        let proxy = if config.use_proxy()? {
            config.proxy()?
        } else {
            None
        };
        Self::build(&config.host()?, proxy.as_deref())
    }

    fn build(base_url: &str, proxy: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = proxy {
            debug!("Routing pod requests through proxy {proxy}");
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| Error::ClientSetup {
                reason: format!("invalid proxy `{proxy}`: {e}"),
            })?;
            builder = builder.proxy(proxy);
        }
        let http = builder.build().map_err(|e| Error::ClientSetup {
            reason: e.to_string(),
        })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            credentials: RwLock::new(None),
        })
    }

    fn cell_url(&self, remote_path: &str) -> String {
        format!("{}/cells/{}", self.base_url, remote_path)
    }
}

#[async_trait]
impl PodClient for HttpPodClient {
    fn set_credentials(&self, credentials: Credentials) {
        debug!("Pod credentials installed for {}", credentials.identity());
        *self.credentials.write().unwrap_or_else(|e| e.into_inner()) = Some(credentials);
    }

    async fn fetch_cell(&self, remote_path: &str) -> Result<serde_json::Value> {
        let url = self.cell_url(remote_path);
        debug!("GET {url}");

        let mut request = self.http.get(&url);
        {
            let creds = self.credentials.read().unwrap_or_else(|e| e.into_inner());
            if let Some(creds) = creds.as_ref() {
                request = request.basic_auth(creds.identity(), Some(creds.key()));
            }
        }

        let response = request.send().await.map_err(|e| Error::Remote {
            path: remote_path.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let reason = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| status.to_string());
            warn!("Pod returned {status} for {remote_path}: {reason}");
            return Err(Error::Remote {
                path: remote_path.to_string(),
                reason,
            });
        }

        response.json().await.map_err(|e| Error::Remote {
            path: remote_path.to_string(),
            reason: format!("invalid response body: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_url_joins_without_double_slash() {
        let client = HttpPodClient::new("https://pod.example.com/").unwrap();
        assert_eq!(
            client.cell_url("abc123/production/cell-1"),
            "https://pod.example.com/cells/abc123/production/cell-1"
        );
    }

    #[test]
    fn invalid_proxy_is_a_setup_error() {
        let err = HttpPodClient::build("https://pod.example.com", Some("::not a proxy::"))
            .unwrap_err();
        assert!(matches!(err, Error::ClientSetup { .. }));
        assert!(err.to_string().contains("::not a proxy::"));
    }
}
