//! Platform registration record for storage.

use serde::{Deserialize, Serialize};

/// A platform (LMS) this tool is registered with.
///
/// One record per (issuer, client_id) pair; a single issuer may hand out
/// several client ids (e.g. separate Moodle registrations).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRegistration {
    /// Platform issuer URL (the `iss` of its id_tokens)
    pub issuer: String,
    /// Client ID assigned to this tool
    pub client_id: String,
    /// OIDC authorization endpoint for login redirects
    pub authorization_endpoint: String,
    /// OAuth2 token endpoint for service access tokens
    pub token_endpoint: String,
    /// Platform public key set URL
    pub jwks_uri: String,
    /// Deployment ids seen for this registration
    pub deployment_ids: Vec<String>,
    /// When the registration was created (RFC 3339)
    pub registered_at: String,
}

impl PlatformRegistration {
    /// Storage key for a registration.
    pub fn key_for(issuer: &str, client_id: &str) -> String {
        format!("{}|{}", issuer, client_id)
    }

    pub fn storage_key(&self) -> String {
        Self::key_for(&self.issuer, &self.client_id)
    }

    pub fn has_deployment(&self, deployment_id: &str) -> bool {
        self.deployment_ids.iter().any(|d| d == deployment_id)
    }
}
