//! Built-in configuration defaults and key names.

use serde_json::{json, Map, Value};

/// Pod the client talks to unless configured otherwise.
pub const DEFAULT_HOST: &str = "https://api.spore.sh";

/// Manifest file name looked up relative to the project directory.
pub const DEFAULT_SPORE_FILE: &str = "Sporefile";

/// Environment resolved when none is named.
pub const DEFAULT_ENV: &str = "development";

/// Name of the persisted config file under the spore home directory.
pub const CONFIG_FILE: &str = "config.json";

/// Environment variable carrying the embedded deployment descriptor.
pub const DEPLOYMENT_VAR: &str = "SPORE_DEPLOYMENT";

/// Environment variable overriding the spore home directory.
pub const HOME_VAR: &str = "SPORE_HOME";

/// Prefix for per-key config overrides in deployment mode
/// (`SPORE_HOST`, `SPORE_DEFAULTENV`, ...).
pub const OVERRIDE_PREFIX: &str = "SPORE_";

/// Every key the config file recognizes, in override-scan order.
pub const CONFIG_KEYS: &[&str] = &[
    "host",
    "sporeFile",
    "defaultEnv",
    "defaultEnvs",
    "netrc",
    "useProxy",
    "proxy",
];

/// The default configuration map written on first interactive run.
pub fn default_settings() -> Map<String, Value> {
    let Value::Object(map) = json!({
        "host": DEFAULT_HOST,
        "sporeFile": DEFAULT_SPORE_FILE,
        "defaultEnv": DEFAULT_ENV,
        "defaultEnvs": ["development", "staging", "production"],
        "netrc": "~/.netrc",
        "useProxy": false,
        "proxy": null,
    }) else {
        unreachable!("default settings literal is an object")
    };
    map
}
