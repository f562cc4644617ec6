//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup; handlers only ever see the typed
//! `Config` struct.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Publicly reachable base URL of this tool (no trailing slash).
    /// Platforms redirect browsers here, so it must match what was
    /// registered.
    pub public_url: String,
    /// Address to bind the HTTP listener to.
    pub bind_addr: String,
    /// Server port
    pub port: u16,
    /// Path of the embedded registration database.
    pub storage_path: String,
    /// Display name sent to platforms during dynamic registration.
    pub tool_name: String,
    /// Description sent to platforms during dynamic registration.
    pub tool_description: String,

    // --- Secrets ---
    /// HMAC key for signing the OIDC login `state` parameter.
    pub state_signing_key: Vec<u8>,
    /// HS256 key for launch session tokens.
    pub session_signing_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "9001".to_string())
            .parse()
            .unwrap_or(9001);

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());

        Ok(Self {
            public_url: env::var("PUBLIC_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://127.0.0.1:{}", port)),
            bind_addr,
            port,
            storage_path: env::var("STORAGE_PATH").unwrap_or_else(|_| "chalkline.redb".to_string()),
            tool_name: env::var("TOOL_NAME").unwrap_or_else(|_| "Chalkline".to_string()),
            tool_description: env::var("TOOL_DESCRIPTION")
                .unwrap_or_else(|_| "An LTI 1.3 Advantage demonstration tool".to_string()),
            state_signing_key: env::var("STATE_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("STATE_SIGNING_KEY"))?
                .into_bytes(),
            session_signing_key: env::var("SESSION_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("SESSION_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            public_url: "http://127.0.0.1:9001".to_string(),
            bind_addr: "127.0.0.1".to_string(),
            port: 9001,
            storage_path: "chalkline-test.redb".to_string(),
            tool_name: "Chalkline".to_string(),
            tool_description: "An LTI 1.3 Advantage demonstration tool".to_string(),
            state_signing_key: b"test_state_key_32_bytes_minimum!".to_vec(),
            session_signing_key: b"test_session_key_32_bytes_min!!!".to_vec(),
        }
    }

    /// URL of the OIDC login initiation endpoint.
    pub fn login_url(&self) -> String {
        format!("{}/login", self.public_url)
    }

    /// URL of the message launch endpoint.
    pub fn launch_url(&self) -> String {
        format!("{}/launch", self.public_url)
    }

    /// URL of the tool's public key set.
    pub fn jwks_url(&self) -> String {
        format!("{}/jwks", self.public_url)
    }

    /// Host part of `public_url`, as sent in registration requests.
    pub fn domain(&self) -> String {
        self.public_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_helpers() {
        let config = Config::test_default();

        assert_eq!(config.login_url(), "http://127.0.0.1:9001/login");
        assert_eq!(config.launch_url(), "http://127.0.0.1:9001/launch");
        assert_eq!(config.jwks_url(), "http://127.0.0.1:9001/jwks");
        assert_eq!(config.domain(), "127.0.0.1:9001");
    }

    #[test]
    fn test_domain_strips_path() {
        let mut config = Config::test_default();
        config.public_url = "https://tool.example.edu/lti".to_string();
        assert_eq!(config.domain(), "tool.example.edu");
    }
}
