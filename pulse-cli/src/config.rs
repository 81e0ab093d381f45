//! Configuration module
//!
//! Handles CLI configuration including the server URL.

use pulse_client::PulseClient;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the Pulse server
    pub server_url: String,
}

impl Config {
    /// Client for the configured server
    pub fn client(&self) -> PulseClient {
        PulseClient::new(self.server_url.clone())
    }
}
