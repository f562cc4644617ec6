// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! LTI Advantage dynamic registration.
//!
//! The platform opens `/register` with a pointer to its OpenID
//! configuration; the tool fetches that document, POSTs a client
//! registration describing itself, and stores the resulting client_id and
//! endpoints. No manual key/URL exchange needed.

use crate::config::Config;
use crate::db::RegistrationStore;
use crate::error::AppError;
use crate::models::PlatformRegistration;
use crate::services::token::scopes;
use crate::time_utils::format_utc_rfc3339;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Platform OpenID configuration, fetched from the URL the platform hands
/// us. Only the fields the handshake needs.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformOpenIdConfig {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub registration_endpoint: Option<String>,
    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti-platform-configuration"
    )]
    pub lti_platform_configuration: Option<PlatformLtiConfiguration>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformLtiConfiguration {
    #[serde(default)]
    pub product_family_code: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// The registration request body this tool sends.
#[derive(Debug, Serialize)]
struct ClientRegistrationRequest {
    application_type: &'static str,
    response_types: Vec<&'static str>,
    grant_types: Vec<&'static str>,
    initiate_login_uri: String,
    redirect_uris: Vec<String>,
    client_name: String,
    jwks_uri: String,
    token_endpoint_auth_method: &'static str,
    scope: String,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti-tool-configuration")]
    lti_tool_configuration: ToolConfiguration,
}

#[derive(Debug, Serialize)]
struct ToolConfiguration {
    domain: String,
    description: String,
    target_link_uri: String,
    claims: Vec<&'static str>,
    messages: Vec<ToolMessage>,
}

#[derive(Debug, Serialize)]
struct ToolMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    target_link_uri: String,
    label: String,
}

/// The subset of the platform's registration response we keep.
#[derive(Debug, Deserialize)]
struct ClientRegistrationResponse {
    client_id: String,
    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti-tool-configuration"
    )]
    lti_tool_configuration: Option<ToolConfigurationResponse>,
}

#[derive(Debug, Deserialize)]
struct ToolConfigurationResponse {
    #[serde(default)]
    deployment_id: Option<String>,
}

/// Dynamic registration handshake driver.
#[derive(Clone)]
pub struct DynamicRegistrationService {
    http: reqwest::Client,
    store: RegistrationStore,
}

impl DynamicRegistrationService {
    pub fn new(store: RegistrationStore) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { http, store })
    }

    /// Run the handshake and persist the resulting registration.
    pub async fn register(
        &self,
        config: &Config,
        openid_configuration_url: &str,
        registration_token: Option<&str>,
    ) -> Result<PlatformRegistration, AppError> {
        validate_configuration_url(openid_configuration_url)?;

        let platform = self.fetch_openid_config(openid_configuration_url).await?;

        // A platform must not claim an issuer it doesn't serve.
        let config_origin = origin_of(openid_configuration_url);
        let issuer_origin = origin_of(&platform.issuer);
        if config_origin.is_none() || config_origin != issuer_origin {
            return Err(AppError::Registration(format!(
                "issuer {} does not match configuration origin",
                platform.issuer
            )));
        }

        let Some(registration_endpoint) = platform.registration_endpoint.clone() else {
            return Err(AppError::Registration(
                "platform does not offer a registration endpoint".to_string(),
            ));
        };

        if let Some(lti) = &platform.lti_platform_configuration {
            tracing::info!(
                product = lti.product_family_code.as_deref().unwrap_or("<unknown>"),
                version = lti.version.as_deref().unwrap_or("<unknown>"),
                "Registering with platform"
            );
        }

        let request = registration_request(config);

        let mut post = self
            .http
            .post(&registration_endpoint)
            .json(&request);
        if let Some(token) = registration_token {
            post = post.bearer_auth(token);
        }

        let response = post
            .send()
            .await
            .map_err(|e| AppError::Registration(format!("registration POST failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Registration(format!(
                "platform answered HTTP {}: {}",
                status, body
            )));
        }

        let granted: ClientRegistrationResponse = response
            .json()
            .await
            .map_err(|e| AppError::Registration(format!("invalid registration response: {}", e)))?;

        let deployment_ids = granted
            .lti_tool_configuration
            .and_then(|c| c.deployment_id)
            .into_iter()
            .collect();

        let registration = PlatformRegistration {
            issuer: platform.issuer,
            client_id: granted.client_id,
            authorization_endpoint: platform.authorization_endpoint,
            token_endpoint: platform.token_endpoint,
            jwks_uri: platform.jwks_uri,
            deployment_ids,
            registered_at: format_utc_rfc3339(chrono::Utc::now()),
        };

        self.store.upsert_registration(&registration)?;

        tracing::info!(
            issuer = %registration.issuer,
            client_id = %registration.client_id,
            "Platform registration stored"
        );

        Ok(registration)
    }

    async fn fetch_openid_config(&self, url: &str) -> Result<PlatformOpenIdConfig, AppError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Registration(format!("configuration fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Registration(format!(
                "configuration fetch returned HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Registration(format!("invalid configuration JSON: {}", e)))
    }
}

/// Build the registration request from tool configuration.
fn registration_request(config: &Config) -> ClientRegistrationRequest {
    ClientRegistrationRequest {
        application_type: "web",
        response_types: vec!["id_token"],
        grant_types: vec!["client_credentials", "implicit"],
        initiate_login_uri: config.login_url(),
        redirect_uris: vec![config.launch_url()],
        client_name: config.tool_name.clone(),
        jwks_uri: config.jwks_url(),
        token_endpoint_auth_method: "private_key_jwt",
        scope: scopes::all().join(" "),
        lti_tool_configuration: ToolConfiguration {
            domain: config.domain(),
            description: config.tool_description.clone(),
            target_link_uri: config.launch_url(),
            claims: vec!["iss", "sub", "name"],
            messages: vec![ToolMessage {
                kind: "LtiDeepLinkingRequest",
                target_link_uri: config.launch_url(),
                label: "New tool link".to_string(),
            }],
        },
    }
}

/// The page returned once registration succeeds. The platform's
/// registration UI listens for this postMessage and closes the frame.
pub fn complete_html(tool_name: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>\n",
            "<html>\n",
            "<body>\n",
            "<p>{} is registered. You can close this window.</p>\n",
            "<script>\n",
            "(window.opener || window.parent).postMessage(",
            "{{subject: 'org.imsglobal.lti.close'}}, '*');\n",
            "</script>\n",
            "</body>\n",
            "</html>\n"
        ),
        crate::services::deep_linking::html_escape(tool_name)
    )
}

fn validate_configuration_url(url: &str) -> Result<(), AppError> {
    let ok = url.starts_with("https://")
        || url.starts_with("http://localhost")
        || url.starts_with("http://127.0.0.1");

    if ok {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "openid_configuration must be an https URL".to_string(),
        ))
    }
}

/// Scheme + authority of a URL, or None if it doesn't look like one.
fn origin_of(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let authority = rest.split('/').next()?;
    if authority.is_empty() {
        return None;
    }
    Some(format!("{}://{}", scheme, authority))
}

/// Query parameters of a `/register` request.
#[derive(Debug, Deserialize)]
pub struct RegisterParams {
    pub openid_configuration: String,
    #[serde(default)]
    pub registration_token: Option<String>,
}
