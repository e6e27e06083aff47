//! Process-environment injection.
//!
//! Resolution produces an explicit overlay; applying it to the real process
//! environment (or to a child's) is a separate, caller-driven step, which
//! keeps the resolution core side-effect-free.

use std::collections::BTreeMap;
use tracing::debug;

/// Key an app uses to declare which environment it believes it runs in.
pub const APP_ENV_KEY: &str = "APP_ENV";

/// Well-known runtime variable the broader ecosystem inspects for the same
/// fact. Kept in sync with [`APP_ENV_KEY`] so downstream tooling sees a
/// consistent environment name whichever variable it reads.
pub const RUNTIME_ENV_KEY: &str = "NODE_ENV";

/// Overwrite policy for keys already present in the target environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClobberPolicy {
    /// Existing variables win (default).
    #[default]
    Preserve,
    /// Every resolved key overwrites unconditionally.
    Overwrite,
}

/// A resolved environment's key/value set, ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvOverlay {
    env_name: String,
    values: BTreeMap<String, String>,
}

impl EnvOverlay {
    /// Build an overlay. When the values contain [`APP_ENV_KEY`], its value
    /// is mirrored onto [`RUNTIME_ENV_KEY`] unless the overlay already sets
    /// that variable itself.
    pub fn new(env_name: &str, mut values: BTreeMap<String, String>) -> Self {
        if let Some(app_env) = values.get(APP_ENV_KEY).cloned() {
            values
                .entry(RUNTIME_ENV_KEY.to_string())
                .or_insert(app_env);
        }
        Self {
            env_name: env_name.to_string(),
            values,
        }
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pure merge of this overlay into an existing environment table.
    pub fn merged_into(
        &self,
        existing: &BTreeMap<String, String>,
        policy: ClobberPolicy,
    ) -> BTreeMap<String, String> {
        let mut merged = existing.clone();
        for (key, value) in &self.values {
            match policy {
                ClobberPolicy::Overwrite => {
                    merged.insert(key.clone(), value.clone());
                }
                ClobberPolicy::Preserve => {
                    merged.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        merged
    }

    /// Mutate the host process environment under the given policy.
    pub fn apply(&self, policy: ClobberPolicy) {
        for (key, value) in &self.values {
            if policy == ClobberPolicy::Preserve && std::env::var_os(key).is_some() {
                debug!("{key} already set, preserving");
                continue;
            }
            std::env::set_var(key, value);
        }
    }

    /// Shell `export` lines for `eval`-style consumption, honoring the
    /// policy against the current process environment.
    pub fn export_lines(&self, policy: ClobberPolicy) -> String {
        let mut out = String::new();
        for (key, value) in &self.values {
            if policy == ClobberPolicy::Preserve && std::env::var_os(key).is_some() {
                continue;
            }
            out.push_str(&format!("export {key}='{}'\n", value.replace('\'', r"'\''")));
        }
        out
    }

    /// Configure a child process with this overlay applied under the policy.
    /// The child inherits the parent environment either way.
    pub fn apply_to_command(&self, command: &mut tokio::process::Command, policy: ClobberPolicy) {
        for (key, value) in &self.values {
            if policy == ClobberPolicy::Preserve && std::env::var_os(key).is_some() {
                continue;
            }
            command.env(key, value);
        }
    }
}
