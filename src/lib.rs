//! Hierarchical secret resolution for processes.
//!
//! A [`Spore`] ties the loaded configuration to an authenticated pod client.
//! From there, [`App::load`](app::App::load) parses the project manifest into
//! the app → environment → cell tree, values resolve lazily (cached after the
//! first fetch, bounded fan-out), and [`inject::EnvOverlay`] carries a
//! resolved environment to whatever wants to apply it.

pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod inject;
pub mod logging;

pub use error::{Error, Result};

use crate::api::{HttpPodClient, PodClient};
use crate::app::App;
use crate::config::ConfigStore;
use crate::credentials::{Credentials, NetrcStore};
use crate::inject::EnvOverlay;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Entry point: configuration plus the pod client it selects.
pub struct Spore {
    config: ConfigStore,
    client: Arc<dyn PodClient>,
}

impl Spore {
    /// Load configuration from the process environment and build the HTTP
    /// client for the configured pod.
    pub fn bootstrap() -> Result<Self> {
        let mut config = ConfigStore::from_env();
        config.load()?;
        let client: Arc<dyn PodClient> = Arc::new(HttpPodClient::from_config(&config)?);
        Ok(Self { config, client })
    }

    /// Assemble from parts. `config` must already be loaded.
    pub fn with_client(config: ConfigStore, client: Arc<dyn PodClient>) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigStore {
        &mut self.config
    }

    /// Derive credentials for the current mode and, when present, install
    /// them on the pod client. Returns the derived record; `None` means "not
    /// authenticated", which is a normal outcome.
    pub fn authenticate(&self) -> Result<Option<Credentials>> {
        // Deployment credentials come straight from the descriptor; the
        // local store is only read on the interactive path.
        let store = if self.config.is_deployment() {
            NetrcStore::empty()
        } else {
            NetrcStore::load(&self.config.netrc_path()?)?
        };
        let credentials = credentials::resolve(&self.config, &store)?;
        match &credentials {
            Some(creds) => self.client.set_credentials(creds.clone()),
            None => debug!("No usable pod credentials found"),
        }
        Ok(credentials)
    }

    /// Load the manifest under `dir` into an app tree wired to this client.
    pub async fn load_app(&self, dir: &Path) -> Result<App> {
        App::load(dir, &self.config, Arc::clone(&self.client)).await
    }

    /// Resolve the named environment (or the configured default) of the app
    /// under `dir` into an overlay.
    pub async fn load_env(&self, dir: &Path, env: Option<&str>) -> Result<EnvOverlay> {
        let name = match env {
            Some(name) => name.to_string(),
            None => self.config.default_env()?,
        };
        let mut app = self.load_app(dir).await?;
        let values = app.values(&name).await?;
        Ok(EnvOverlay::new(&name, values))
    }
}
