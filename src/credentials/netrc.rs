//! Local per-host credential store.
//!
//! The interactive path reads credentials from a netrc-format file keyed by
//! the pod's hostname. The store sits behind a trait so resolution logic can
//! be exercised without touching the filesystem.

use crate::error::Result;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// One `machine` entry from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetrcEntry {
    pub login: Option<String>,
    pub password: Option<String>,
}

/// Read-only view over a per-host credential store.
pub trait CredentialStore: Send + Sync {
    fn has_host(&self, hostname: &str) -> bool;
    fn host(&self, hostname: &str) -> Option<NetrcEntry>;
}

/// Netrc-file-backed store. A missing file is an empty store, not an error.
pub struct NetrcStore {
    machines: HashMap<String, NetrcEntry>,
}

impl NetrcStore {
    /// A store with no entries.
    pub fn empty() -> Self {
        Self {
            machines: HashMap::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No netrc file at {}", path.display());
            return Ok(Self::empty());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Token-level netrc parse: `machine <name>` opens an entry, `login` and
    /// `password` attach to the most recent one. Unknown tokens are skipped.
    pub fn parse(content: &str) -> Self {
        let mut machines = HashMap::new();
        let mut current: Option<String> = None;
        let mut tokens = content.split_whitespace();

        while let Some(token) = tokens.next() {
            match token {
                "machine" => {
                    current = tokens.next().map(str::to_string);
                    if let Some(name) = &current {
                        machines.entry(name.clone()).or_insert_with(NetrcEntry::default);
                    }
                }
                "login" => {
                    if let (Some(name), Some(value)) = (&current, tokens.next()) {
                        if let Some(entry) = machines.get_mut(name) {
                            entry.login = Some(value.to_string());
                        }
                    }
                }
                "password" => {
                    if let (Some(name), Some(value)) = (&current, tokens.next()) {
                        if let Some(entry) = machines.get_mut(name) {
                            entry.password = Some(value.to_string());
                        }
                    }
                }
                _ => {}
            }
        }

        Self { machines }
    }
}

impl CredentialStore for NetrcStore {
    fn has_host(&self, hostname: &str) -> bool {
        self.machines.contains_key(hostname)
    }

    fn host(&self, hostname: &str) -> Option<NetrcEntry> {
        self.machines.get(hostname).cloned()
    }
}
