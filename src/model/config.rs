use serde::{Deserialize, Serialize};

/// Default seed endpoint (a public demo API)
pub const DEFAULT_SEED_URL: &str = "https://jsonplaceholder.typicode.com/todos";

/// Configuration from `config.toml` in the data directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Fetch the seed set when the persisted collection is empty
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_seed_url")]
    pub url: String,
    /// Number of items requested from the seed endpoint
    #[serde(default = "default_seed_limit")]
    pub limit: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        SeedConfig {
            enabled: true,
            url: default_seed_url(),
            limit: default_seed_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_seed_url() -> String {
    DEFAULT_SEED_URL.to_string()
}

fn default_seed_limit() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    10
}
