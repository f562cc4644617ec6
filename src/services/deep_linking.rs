// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Deep linking response construction.
//!
//! A deep-link launch ends with the tool POSTing a signed JWT back to the
//! platform's return URL, describing the content item(s) the instructor
//! configured. The browser carries the POST, so the handler answers with
//! an auto-submitting form.

use crate::error::AppError;
use crate::models::launch::LTI_VERSION;
use crate::services::keys::ToolKeys;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Response JWT lifetime. The browser submits the form immediately; this
/// only needs to cover clock skew.
const RESPONSE_LIFETIME_SECS: i64 = 10 * 60;

/// A content item of type `ltiResourceLink`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, String>,
}

impl ContentItem {
    /// A resource link back to this tool's launch URL.
    pub fn resource_link(
        launch_url: &str,
        title: impl Into<String>,
        custom: HashMap<String, String>,
    ) -> Self {
        Self {
            kind: "ltiResourceLink".to_string(),
            title: title.into(),
            url: launch_url.to_string(),
            custom,
        }
    }
}

/// Claims of the `LtiDeepLinkingResponse` JWT.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeepLinkResponseClaims {
    /// Tool client_id; roles flip relative to a launch
    pub iss: String,
    /// Platform issuer
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub nonce: String,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/message_type")]
    pub message_type: String,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/version")]
    pub version: String,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/deployment_id")]
    pub deployment_id: String,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti-dl/claim/content_items")]
    pub content_items: Vec<ContentItem>,
    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti-dl/claim/data",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<String>,
}

/// Build and sign the deep-linking response JWT.
pub fn build_response_jwt(
    keys: &ToolKeys,
    client_id: &str,
    issuer: &str,
    deployment_id: &str,
    data: Option<&str>,
    content_items: Vec<ContentItem>,
) -> Result<String, AppError> {
    let now = Utc::now().timestamp();

    let claims = DeepLinkResponseClaims {
        iss: client_id.to_string(),
        aud: issuer.to_string(),
        exp: now + RESPONSE_LIFETIME_SECS,
        iat: now,
        nonce: uuid::Uuid::new_v4().to_string(),
        message_type: "LtiDeepLinkingResponse".to_string(),
        version: LTI_VERSION.to_string(),
        deployment_id: deployment_id.to_string(),
        content_items,
        data: data.map(str::to_string),
    };

    keys.sign(&claims)
}

/// The auto-submitting form that carries the response JWT back to the
/// platform.
pub fn response_form(return_url: &str, jwt: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>\n",
            "<html>\n",
            "<body onload=\"document.forms[0].submit()\">\n",
            "<form action=\"{action}\" method=\"POST\">\n",
            "<input type=\"hidden\" name=\"JWT\" value=\"{jwt}\"/>\n",
            "<noscript><button type=\"submit\">Continue</button></noscript>\n",
            "</form>\n",
            "</body>\n",
            "</html>\n"
        ),
        action = html_escape(return_url),
        jwt = html_escape(jwt),
    )
}

/// Minimal escaping for HTML attribute values.
pub(crate) fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
