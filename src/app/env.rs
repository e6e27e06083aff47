//! A named environment: an ordered collection of secret slots.

use super::cell::Cell;
use crate::api::PodClient;
use crate::error::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use tracing::debug;

/// Cap on simultaneous in-flight cell fetches per environment, so a large
/// environment does not saturate the pod with cell-count-many requests.
pub const MAX_IN_FLIGHT: usize = 100;

/// One deployment environment within an app. Names are slugified and unique
/// within the app.
pub struct Env {
    name: String,
    app_remote_path: String,
    app_full_name: String,
    cells: Vec<Cell>,
}

impl Env {
    pub(crate) fn new(
        app_remote_path: &str,
        app_full_name: &str,
        name: &str,
        ids: Option<&BTreeMap<String, String>>,
    ) -> Self {
        let mut env = Self {
            name: slugify(name),
            app_remote_path: app_remote_path.to_string(),
            app_full_name: app_full_name.to_string(),
            cells: Vec::new(),
        };
        if let Some(ids) = ids {
            for (key, id) in ids {
                env.new_cell(key, Some(id.clone()));
            }
        }
        debug!("{} environment initialized", env.full_name());
        env
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `{app.id}/{name}` — the pod-side namespace of this environment.
    pub fn remote_path(&self) -> String {
        format!("{}/{}", self.app_remote_path, self.name)
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.app_full_name, self.name)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Pure lookup by key.
    pub fn cell(&self, key: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.key() == key)
    }

    /// Lookup that creates an empty slot (fresh id) when the key is unknown.
    pub fn cell_or_create(&mut self, key: &str) -> &Cell {
        if let Some(idx) = self.cells.iter().position(|c| c.key() == key) {
            return &self.cells[idx];
        }
        debug!("Cell {key} does not exist in {}, creating", self.full_name());
        self.new_cell(key, None)
    }

    pub fn new_cell(&mut self, key: &str, id: Option<String>) -> &Cell {
        let cell = Cell::new(&self.full_name(), key, id);
        self.cells.push(cell);
        self.cells
            .last()
            .unwrap_or_else(|| unreachable!("cell was just pushed"))
    }

    /// Resolve one key's value, creating the slot if needed.
    pub async fn get(&mut self, key: &str, client: &dyn PodClient) -> Result<String> {
        debug!("Getting {key} for {}", self.full_name());
        let path = self.remote_path();
        let cell = self.cell_or_create(key);
        cell.get_value(client, &path).await
    }

    /// Resolve every slot with bounded concurrency and merge the results.
    /// An empty environment resolves to an empty map with zero remote calls.
    /// The first failing slot aborts the whole aggregate.
    pub async fn get_all(&self, client: &dyn PodClient) -> Result<BTreeMap<String, String>> {
        if self.cells.is_empty() {
            debug!("No cells found for {}", self.full_name());
            return Ok(BTreeMap::new());
        }

        debug!(
            "Loading {} cells for {}",
            self.cells.len(),
            self.full_name()
        );
        let path = self.remote_path();
        stream::iter(self.cells.iter().map(|cell| cell.kv(client, &path)))
            .buffer_unordered(MAX_IN_FLIGHT)
            .try_collect()
            .await
    }
}

/// Lowercase, alphanumerics kept, every other run collapsed to one `-`.
pub(crate) fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockClient {
        fetches: AtomicUsize,
        fail_path: Option<String>,
    }

    impl MockClient {
        fn new() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                fail_path: None,
            }
        }

        fn failing_on(path: &str) -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                fail_path: Some(path.to_string()),
            }
        }
    }

    #[async_trait]
    impl PodClient for MockClient {
        fn set_credentials(&self, _credentials: crate::credentials::Credentials) {}

        async fn fetch_cell(&self, remote_path: &str) -> Result<serde_json::Value> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_path.as_deref() == Some(remote_path) {
                return Err(Error::Remote {
                    path: remote_path.to_string(),
                    reason: "boom".into(),
                });
            }
            Ok(json!({ "value": format!("secret:{remote_path}") }))
        }
    }

    fn env_with(ids: &[(&str, &str)]) -> Env {
        let map: BTreeMap<String, String> = ids
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Env::new("abc123", "demo", "production", Some(&map))
    }

    #[test]
    fn slugified_names() {
        assert_eq!(slugify("Production"), "production");
        assert_eq!(slugify("My Env (EU)"), "my-env-eu");
        assert_eq!(slugify("staging"), "staging");
    }

    #[test]
    fn remote_path_nests_under_app() {
        let env = env_with(&[]);
        assert_eq!(env.remote_path(), "abc123/production");
    }

    #[test]
    fn lookup_does_not_create() {
        let env = env_with(&[("A", "id-a")]);
        assert!(env.cell("A").is_some());
        assert!(env.cell("MISSING").is_none());
        assert_eq!(env.cells().len(), 1);
    }

    #[test]
    fn lookup_or_create_creates_once() {
        let mut env = env_with(&[]);
        let id = env.cell_or_create("NEW").id().to_string();
        assert_eq!(env.cell_or_create("NEW").id(), id);
        assert_eq!(env.cells().len(), 1);
    }

    #[tokio::test]
    async fn empty_env_resolves_without_remote_calls() {
        let client = MockClient::new();
        let env = env_with(&[]);
        let values = env.get_all(&client).await.unwrap();
        assert!(values.is_empty());
        assert_eq!(client.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn get_all_merges_every_cell() {
        let client = MockClient::new();
        let env = env_with(&[("DATABASE_URL", "cell-1"), ("API_KEY", "cell-2")]);

        let values = env.get_all(&client).await.unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values["DATABASE_URL"], "secret:abc123/production/cell-1");
        assert_eq!(values["API_KEY"], "secret:abc123/production/cell-2");
        assert_eq!(client.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn get_all_fails_fast_on_first_error() {
        let client = MockClient::failing_on("abc123/production/cell-2");
        let env = env_with(&[("A", "cell-1"), ("B", "cell-2")]);

        let err = env.get_all(&client).await.unwrap_err();
        assert!(matches!(err, Error::Remote { ref path, .. } if path.ends_with("cell-2")));
    }

    #[tokio::test]
    async fn get_resolves_one_key() {
        let client = MockClient::new();
        let mut env = env_with(&[("DATABASE_URL", "cell-1")]);

        let value = env.get("DATABASE_URL", &client).await.unwrap();
        assert_eq!(value, "secret:abc123/production/cell-1");
        assert_eq!(client.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_creates_unknown_keys() {
        let client = MockClient::new();
        let mut env = env_with(&[]);

        // The created slot gets a generated id; its fetch goes to that path.
        let value = env.get("FRESH", &client).await.unwrap();
        assert!(value.starts_with("secret:abc123/production/"));
        assert_eq!(env.cells().len(), 1);
    }
}
