//! The app tree: project root, environments, secret slots.
//!
//! An [`App`] is built once from the manifest and lives for the process.
//! Lookups fan out to environments, which fan out (bounded) to cells, each
//! lazily fetching through the injected pod client.

pub mod cell;
pub mod env;

pub use cell::Cell;
pub use env::Env;

use crate::api::PodClient;
use crate::config::ConfigStore;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Manifest shape: `{name, id, envs: {envName: {slotKey: slotId}}}`.
/// Comments are permitted in the file and stripped during parsing.
#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
    id: String,
    #[serde(default)]
    envs: BTreeMap<String, BTreeMap<String, String>>,
}

/// The project root. `id` is the remote namespace root on the pod.
pub struct App {
    name: String,
    id: String,
    dir: PathBuf,
    envs: Vec<Env>,
    client: Arc<dyn PodClient>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Load the manifest from `{dir}/{sporeFile}` and build the tree.
    /// A missing file is [`Error::NoSporefileFound`]; every other read error
    /// propagates unchanged.
    pub async fn load(
        dir: &Path,
        config: &ConfigStore,
        client: Arc<dyn PodClient>,
    ) -> Result<Self> {
        let file = config.spore_file()?;
        let path = dir.join(&file);
        debug!("Loading manifest at {}", path.display());

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NoSporefileFound {
                    file,
                    dir: dir.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let manifest: Manifest = json5::from_str(&content)?;
        Ok(Self::from_manifest(dir, manifest, client))
    }

    fn from_manifest(dir: &Path, manifest: Manifest, client: Arc<dyn PodClient>) -> Self {
        let mut app = Self {
            name: manifest.name,
            id: manifest.id,
            dir: dir.to_path_buf(),
            envs: Vec::new(),
            client,
        };
        debug!("App {} initialized in {}", app.name, app.dir.display());
        for (env_name, ids) in &manifest.envs {
            app.new_env(env_name, Some(ids));
        }
        app
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The remote namespace root.
    pub fn remote_path(&self) -> &str {
        &self.id
    }

    pub fn envs(&self) -> &[Env] {
        &self.envs
    }

    pub fn new_env(&mut self, name: &str, ids: Option<&BTreeMap<String, String>>) -> &mut Env {
        let env = Env::new(&self.id, &self.name, name, ids);
        self.envs.push(env);
        let idx = self.envs.len() - 1;
        &mut self.envs[idx]
    }

    /// Pure lookup by name. The input is slugified the same way stored
    /// environment names are.
    pub fn env(&self, name: &str) -> Option<&Env> {
        let name = env::slugify(name);
        self.envs.iter().find(|e| e.name() == name)
    }

    /// Lookup that creates an empty environment when the name is unknown.
    pub fn env_or_create(&mut self, name: &str) -> &mut Env {
        let slug = env::slugify(name);
        if let Some(idx) = self.envs.iter().position(|e| e.name() == slug) {
            return &mut self.envs[idx];
        }
        debug!("Environment {name} does not exist on {}, creating", self.name);
        self.new_env(name, None)
    }

    /// Resolve the full key/value map of one environment (find-or-create on
    /// the name).
    pub async fn values(&mut self, env_name: &str) -> Result<BTreeMap<String, String>> {
        let client = Arc::clone(&self.client);
        let env = self.env_or_create(env_name);
        env.get_all(client.as_ref()).await
    }

    /// Resolve a single key of one environment.
    pub async fn value(&mut self, env_name: &str, key: &str) -> Result<String> {
        let client = Arc::clone(&self.client);
        let env = self.env_or_create(env_name);
        env.get(key, client.as_ref()).await
    }

    /// Resolve every environment in parallel, keying each environment's full
    /// map by its name. Zero environments resolve to an empty result with no
    /// remote interaction; the first failing environment aborts the
    /// aggregate.
    pub async fn all_values(&self) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
        if self.envs.is_empty() {
            debug!("No environments on {} to retrieve values from", self.name);
            return Ok(BTreeMap::new());
        }

        debug!("Getting all keys for all environments of {}", self.name);
        let client = Arc::clone(&self.client);
        let pairs = futures::future::try_join_all(self.envs.iter().map(|env| {
            let client = Arc::clone(&client);
            async move {
                let values = env.get_all(client.as_ref()).await?;
                Ok::<_, Error>((env.name().to_string(), values))
            }
        }))
        .await?;
        Ok(pairs.into_iter().collect())
    }

    /// Resolve one key across every environment in parallel. Each
    /// environment's entry contains only that key; the slot is created
    /// (find-or-create) in environments that do not declare it.
    pub async fn all_values_of(
        &mut self,
        key: &str,
    ) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
        if self.envs.is_empty() {
            debug!("No environments on {} to retrieve values from", self.name);
            return Ok(BTreeMap::new());
        }

        debug!("Getting {key} for all environments of {}", self.name);
        // Materialize missing slots first so the fan-out can run over shared
        // borrows.
        for env in &mut self.envs {
            env.cell_or_create(key);
        }

        let client = Arc::clone(&self.client);
        let pairs = futures::future::try_join_all(self.envs.iter().map(|env| {
            let client = Arc::clone(&client);
            async move {
                let path = env.remote_path();
                let cell = env.cell(key).ok_or_else(|| Error::NoValue {
                    cell: format!("{}/{key}", env.full_name()),
                })?;
                let value = cell.get_value(client.as_ref(), &path).await?;
                let mut kv = BTreeMap::new();
                kv.insert(key.to_string(), value);
                Ok::<_, Error>((env.name().to_string(), kv))
            }
        }))
        .await?;
        Ok(pairs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct MockClient {
        fetched: Mutex<Vec<String>>,
        fetches: AtomicUsize,
    }

    impl MockClient {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fetched: Mutex::new(Vec::new()),
                fetches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PodClient for MockClient {
        fn set_credentials(&self, _credentials: crate::credentials::Credentials) {}

        async fn fetch_cell(&self, remote_path: &str) -> Result<serde_json::Value> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.fetched.lock().unwrap().push(remote_path.to_string());
            Ok(json!({ "value": format!("secret:{remote_path}") }))
        }
    }

    async fn load_app(manifest: &str, client: Arc<MockClient>) -> App {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Sporefile"), manifest).unwrap();

        let home = TempDir::new().unwrap();
        let mut config = ConfigStore::new(home.path().to_path_buf(), None);
        config.load().unwrap();

        App::load(dir.path(), &config, client).await.unwrap()
    }

    #[tokio::test]
    async fn manifest_builds_the_tree() {
        let client = MockClient::new();
        let app = load_app(
            r#"{
                // demo project
                "name": "demo",
                "id": "abc123",
                "envs": {
                    "production": { "DATABASE_URL": "cell-1" },
                    "staging": { "DATABASE_URL": "cell-2", "API_KEY": "cell-3" }
                }
            }"#,
            client,
        )
        .await;

        assert_eq!(app.name(), "demo");
        assert_eq!(app.remote_path(), "abc123");
        assert_eq!(app.envs().len(), 2);
        assert_eq!(app.env("staging").unwrap().cells().len(), 2);
        assert!(app.env("qa").is_none());
    }

    #[tokio::test]
    async fn missing_manifest_is_its_own_error() {
        let dir = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let mut config = ConfigStore::new(home.path().to_path_buf(), None);
        config.load().unwrap();

        let err = App::load(dir.path(), &config, MockClient::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoSporefileFound { .. }));
    }

    #[tokio::test]
    async fn single_value_hits_the_documented_path() {
        let client = MockClient::new();
        let mut app = load_app(
            r#"{"name":"demo","id":"abc123","envs":{"production":{"DATABASE_URL":"cell-1"}}}"#,
            Arc::clone(&client),
        )
        .await;

        let value = app.value("production", "DATABASE_URL").await.unwrap();
        assert_eq!(value, "secret:abc123/production/cell-1");
        assert_eq!(
            *client.fetched.lock().unwrap(),
            vec!["abc123/production/cell-1".to_string()]
        );
    }

    #[tokio::test]
    async fn values_resolves_the_whole_environment() {
        let client = MockClient::new();
        let mut app = load_app(
            r#"{"name":"demo","id":"abc123","envs":{"production":{"A":"cell-1","B":"cell-2"}}}"#,
            Arc::clone(&client),
        )
        .await;

        let values = app.values("production").await.unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(client.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn all_values_of_returns_one_entry_per_env() {
        let client = MockClient::new();
        let mut app = load_app(
            r#"{"name":"demo","id":"abc123","envs":{
                "development": { "TOKEN": "cell-d" },
                "production": { "TOKEN": "cell-p" },
                "staging": { "TOKEN": "cell-s" }
            }}"#,
            Arc::clone(&client),
        )
        .await;

        let all = app.all_values_of("TOKEN").await.unwrap();
        assert_eq!(all.len(), 3);
        for (env_name, kv) in &all {
            assert_eq!(kv.len(), 1, "{env_name} should carry only TOKEN");
            assert!(kv.contains_key("TOKEN"));
        }
        assert_eq!(client.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn all_values_with_zero_envs_is_empty_and_offline() {
        let client = MockClient::new();
        let app = load_app(r#"{"name":"demo","id":"abc123"}"#, Arc::clone(&client)).await;

        let all = app.all_values().await.unwrap();
        assert!(all.is_empty());
        assert_eq!(client.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn env_or_create_reuses_existing() {
        let client = MockClient::new();
        let mut app = load_app(
            r#"{"name":"demo","id":"abc123","envs":{"production":{"A":"cell-1"}}}"#,
            client,
        )
        .await;

        app.env_or_create("production");
        assert_eq!(app.envs().len(), 1);
        app.env_or_create("qa");
        assert_eq!(app.envs().len(), 2);
    }
}
