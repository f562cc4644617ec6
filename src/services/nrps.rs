// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Names & Role Provisioning Services client.

use crate::error::AppError;
use crate::models::launch::{has_any_role, roles};
use serde::{Deserialize, Serialize};

const MEDIA_MEMBERSHIP_CONTAINER: &str =
    "application/vnd.ims.lti-nrps.v2.membershipcontainer+json";

/// Upper bound on pagination follows, in case a platform serves a cyclic
/// Link chain.
const MAX_PAGES: usize = 32;

/// One member of the launch context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub user_id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Member {
    pub fn is_instructor(&self) -> bool {
        has_any_role(
            &self.roles,
            &[
                roles::CONTEXT_INSTRUCTOR,
                roles::CONTEXT_TEACHING_ASSISTANT,
                roles::INSTITUTION_INSTRUCTOR,
            ],
        )
    }

    pub fn is_student(&self) -> bool {
        has_any_role(
            &self.roles,
            &[roles::CONTEXT_LEARNER, roles::INSTITUTION_STUDENT],
        )
    }
}

#[derive(Debug, Deserialize)]
struct MembershipContainer {
    #[serde(default)]
    members: Vec<Member>,
}

/// Names & Role Provisioning Services HTTP client.
#[derive(Clone)]
pub struct NrpsClient {
    http: reqwest::Client,
}

impl Default for NrpsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl NrpsClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Fetch the full membership of a context, following `rel="next"`
    /// pagination until the platform stops offering more pages.
    pub async fn get_members(
        &self,
        access_token: &str,
        memberships_url: &str,
    ) -> Result<Vec<Member>, AppError> {
        let mut members = Vec::new();
        let mut next = Some(memberships_url.to_string());
        let mut pages = 0usize;

        while let Some(url) = next {
            if pages >= MAX_PAGES {
                tracing::warn!(url = %url, "Membership pagination cut off at page limit");
                break;
            }
            pages += 1;

            let response = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .header(reqwest::header::ACCEPT, MEDIA_MEMBERSHIP_CONTAINER)
                .send()
                .await
                .map_err(|e| AppError::PlatformApi(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::PlatformApi(format!("HTTP {}: {}", status, body)));
            }

            next = next_page_url(response.headers());

            let container: MembershipContainer = response
                .json()
                .await
                .map_err(|e| AppError::PlatformApi(format!("JSON parse error: {}", e)))?;

            members.extend(container.members);
        }

        tracing::debug!(count = members.len(), pages, "Fetched context membership");
        Ok(members)
    }
}

/// Extract the `rel="next"` target from Link headers, if any.
fn next_page_url(headers: &reqwest::header::HeaderMap) -> Option<String> {
    for value in headers.get_all(reqwest::header::LINK) {
        let Ok(value) = value.to_str() else { continue };

        for part in value.split(',') {
            let part = part.trim();
            let Some((target, params)) = part.split_once(';') else {
                continue;
            };

            let is_next = params
                .split(';')
                .any(|p| matches!(p.trim(), "rel=\"next\"" | "rel=next"));

            if is_next {
                let target = target.trim();
                if let Some(url) = target
                    .strip_prefix('<')
                    .and_then(|t| t.strip_suffix('>'))
                {
                    return Some(url.to_string());
                }
            }
        }
    }
    None
}
