use std::time::Duration;

use crate::model::config::SeedConfig;
use crate::model::task::Task;

/// Error type for the remote seed fetch
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Failed to fetch tasks: {code} {text}")]
    Status { code: u16, text: String },
    #[error("Failed to fetch tasks: {0}")]
    Transport(String),
    #[error("Failed to read tasks from response: {0}")]
    Decode(#[source] std::io::Error),
}

/// Source of the initial task list used to populate an empty collection
pub trait SeedSource {
    fn fetch(&self, limit: usize) -> Result<Vec<Task>, SeedError>;
}

impl<F> SeedSource for F
where
    F: Fn(usize) -> Result<Vec<Task>, SeedError>,
{
    fn fetch(&self, limit: usize) -> Result<Vec<Task>, SeedError> {
        self(limit)
    }
}

/// Reads the seed list from a JSON todo endpoint (`GET <url>?_limit=<n>`).
pub struct HttpSeedSource {
    agent: ureq::Agent,
    url: String,
}

impl HttpSeedSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("taskpad/", env!("CARGO_PKG_VERSION")))
            .build();
        HttpSeedSource {
            agent,
            url: url.into(),
        }
    }

    pub fn from_config(config: &SeedConfig) -> Self {
        Self::new(&config.url, Duration::from_secs(config.timeout_secs))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SeedSource for HttpSeedSource {
    fn fetch(&self, limit: usize) -> Result<Vec<Task>, SeedError> {
        tracing::debug!(url = %self.url, limit, "requesting seed tasks");

        let response = self
            .agent
            .get(&self.url)
            .set("Accept", "application/json")
            .query("_limit", &limit.to_string())
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code, resp) => SeedError::Status {
                    code,
                    text: resp.status_text().to_string(),
                },
                ureq::Error::Transport(t) => SeedError::Transport(t.to_string()),
            });

        let tasks = match response {
            Ok(resp) => resp.into_json::<Vec<Task>>().map_err(SeedError::Decode),
            Err(e) => Err(e),
        };

        if let Err(ref e) = tasks {
            tracing::warn!(context = "fetch_tasks", error = %e, "seed fetch failed");
        }
        tasks
    }
}
