//! Storage engine configuration.
//!
//! The engine section is embedded in the service settings and selects which
//! grouped-map backend holds the indexes:
//!
//! ```toml
//! [engine]
//! engine = "duckdb"        # Options: "duckdb", "memory"
//! connection = ":memory:"  # ":memory:" or a database file path
//! options = { threads = "2" }
//! ```

use serde::Deserialize;
use std::collections::HashMap;

/// Engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Engine type ("duckdb" or "memory")
    pub engine: String,
    /// Connection string for the engine; ignored by the memory engine
    #[serde(default = "default_connection")]
    pub connection: String,
    /// Engine-specific options
    #[serde(default)]
    pub options: HashMap<String, String>,
}

fn default_connection() -> String {
    ":memory:".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine: "duckdb".to_string(),
            connection: default_connection(),
            options: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Config for the non-persistent in-process engine.
    pub fn memory() -> Self {
        Self {
            engine: "memory".to_string(),
            ..Self::default()
        }
    }

    /// Parses `key=value` pairs as given on the command line, skipping
    /// anything that is not a single pair.
    pub fn parse_options<S: AsRef<str>>(pairs: &[S]) -> HashMap<String, String> {
        pairs
            .iter()
            .filter_map(|opt| {
                let (key, value) = opt.as_ref().split_once('=')?;
                if key.is_empty() || value.contains('=') {
                    None
                } else {
                    Some((key.to_string(), value.to_string()))
                }
            })
            .collect()
    }
}
