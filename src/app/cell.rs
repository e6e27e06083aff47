//! A single lazily-resolved secret slot.

use crate::api::PodClient;
use crate::error::{Error, Result};
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

/// One secret slot. The value is write-once: cached for the rest of the
/// process after the first successful fetch, with no TTL and no
/// invalidation. A failed fetch leaves the slot unresolved so the next call
/// retries.
pub struct Cell {
    key: String,
    id: String,
    full_name: String,
    value: OnceCell<String>,
}

impl Cell {
    /// Slot ids are stable; when the manifest omits one, a fresh uuid is
    /// generated.
    pub(crate) fn new(env_full_name: &str, key: &str, id: Option<String>) -> Self {
        let cell = Self {
            key: key.to_string(),
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            full_name: format!("{env_full_name}/{key}"),
            value: OnceCell::new(),
        };
        debug!("{} cell initialized", cell.full_name);
        cell
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `{app}/{env}/{key}` — used for diagnostics.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// `{env remote path}/{id}` — the pod-side address of this slot.
    pub fn remote_path(&self, env_remote_path: &str) -> String {
        format!("{env_remote_path}/{}", self.id)
    }

    /// Synchronous accessor. [`Error::NoValue`] until resolved; resolution
    /// paths catch that sentinel and fetch.
    pub fn value(&self) -> Result<&str> {
        self.value
            .get()
            .map(String::as_str)
            .ok_or_else(|| Error::NoValue {
                cell: self.full_name.clone(),
            })
    }

    /// Accept a JSON value for this slot. Only strings pass validation;
    /// anything else is [`Error::OnlyStrings`] and leaves the slot
    /// untouched. Setting an already-resolved slot is a no-op (resolved
    /// values are immutable).
    pub fn set_value(&self, value: &serde_json::Value) -> Result<()> {
        let serde_json::Value::String(s) = value else {
            return Err(Error::OnlyStrings {
                cell: self.full_name.clone(),
            });
        };
        let _ = self.value.set(s.clone());
        Ok(())
    }

    /// Resolve this slot's value. A cached value is returned without any
    /// remote interaction; otherwise exactly one authenticated fetch runs
    /// against the slot's remote path, and the result is cached on success.
    /// Concurrent callers coalesce onto the same in-flight fetch.
    pub async fn get_value(
        &self,
        client: &dyn PodClient,
        env_remote_path: &str,
    ) -> Result<String> {
        let value = self
            .value
            .get_or_try_init(|| async {
                let path = self.remote_path(env_remote_path);
                debug!("Loading remote cell value for {}", self.full_name);
                let body = client.fetch_cell(&path).await?;
                match body.get("value") {
                    Some(serde_json::Value::String(s)) => Ok(s.clone()),
                    _ => Err(Error::OnlyStrings {
                        cell: self.full_name.clone(),
                    }),
                }
            })
            .await?;
        Ok(value.clone())
    }

    /// Resolve to a `(key, value)` pair for map assembly.
    pub(crate) async fn kv(
        &self,
        client: &dyn PodClient,
        env_remote_path: &str,
    ) -> Result<(String, String)> {
        let value = self.get_value(client, env_remote_path).await?;
        Ok((self.key.clone(), value))
    }
}
