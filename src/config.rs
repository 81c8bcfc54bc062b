use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the marketplace API, without a trailing slash.
    pub api_url: String,
    /// Directory for persisted client-side state (credential, wishlist cache, ...).
    pub store_dir: String,
    /// Interval between notification polls.
    pub poll_interval: Duration,
    /// Timeout applied to every API request.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "https://csc648g1.me/api".to_string(),
            store_dir: "gatormarket-state".to_string(),
            poll_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
        }
    }
}
