use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5001/api";

/// Timing knobs shared by the views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub api_url: String,
    pub list_poll_interval: Duration,
    pub detail_poll_interval: Duration,
    /// How long the detail view stays open after a terminate was accepted.
    pub terminate_grace: Duration,
    /// How long a terminated instance keeps being listed.
    pub terminated_retention: Duration,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            api_url: DEFAULT_API_URL.to_string(),
            list_poll_interval: Duration::from_secs(30),
            detail_poll_interval: Duration::from_secs(15),
            terminate_grace: Duration::from_secs(5),
            terminated_retention: Duration::from_secs(60),
        }
    }
}
