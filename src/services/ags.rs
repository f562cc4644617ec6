// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Assignment & Grade Services client.
//!
//! Handles:
//! - Line item listing and creation
//! - Score publishing
//! - Result retrieval for the scoreboard

use crate::error::AppError;
use serde::{Deserialize, Serialize};

const MEDIA_LINEITEM: &str = "application/vnd.ims.lis.v2.lineitem+json";
const MEDIA_LINEITEM_CONTAINER: &str = "application/vnd.ims.lis.v2.lineitemcontainer+json";
const MEDIA_SCORE: &str = "application/vnd.ims.lis.v1.score+json";
const MEDIA_RESULT_CONTAINER: &str = "application/vnd.ims.lis.v2.resultcontainer+json";

/// A grade book column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub score_maximum: f64,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

/// A score publish for one user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub user_id: String,
    pub score_given: f64,
    pub score_maximum: f64,
    pub activity_progress: String,
    pub grading_progress: String,
    /// RFC 3339 with offset, as AGS requires
    pub timestamp: String,
}

/// A stored result for one user, as returned by the results endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Assignment & Grade Services HTTP client.
#[derive(Clone)]
pub struct AgsClient {
    http: reqwest::Client,
}

impl Default for AgsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AgsClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// List line items from the container, optionally filtered by tag.
    pub async fn list_line_items(
        &self,
        access_token: &str,
        lineitems_url: &str,
        tag: Option<&str>,
    ) -> Result<Vec<LineItem>, AppError> {
        let mut request = self
            .http
            .get(lineitems_url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, MEDIA_LINEITEM_CONTAINER);

        if let Some(tag) = tag {
            request = request.query(&[("tag", tag)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::PlatformApi(e.to_string()))?;

        check_response_json(response).await
    }

    /// Create a line item in the container.
    pub async fn create_line_item(
        &self,
        access_token: &str,
        lineitems_url: &str,
        line_item: &LineItem,
    ) -> Result<LineItem, AppError> {
        let response = self
            .http
            .post(lineitems_url)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, MEDIA_LINEITEM)
            .json(line_item)
            .send()
            .await
            .map_err(|e| AppError::PlatformApi(e.to_string()))?;

        check_response_json(response).await
    }

    /// Find a line item by tag, creating it if the platform has none.
    pub async fn find_or_create_line_item(
        &self,
        access_token: &str,
        lineitems_url: &str,
        template: &LineItem,
    ) -> Result<LineItem, AppError> {
        let existing = self
            .list_line_items(access_token, lineitems_url, template.tag.as_deref())
            .await?;

        // Some platforms ignore the tag filter; match again locally.
        if let Some(found) = existing
            .into_iter()
            .find(|li| li.tag == template.tag)
        {
            return Ok(found);
        }

        tracing::info!(
            label = %template.label,
            tag = ?template.tag,
            "Creating line item"
        );
        self.create_line_item(access_token, lineitems_url, template)
            .await
    }

    /// Publish a score to a line item.
    pub async fn put_score(
        &self,
        access_token: &str,
        lineitem_url: &str,
        score: &Score,
    ) -> Result<serde_json::Value, AppError> {
        let url = service_url(lineitem_url, "scores");

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, MEDIA_SCORE)
            .json(score)
            .send()
            .await
            .map_err(|e| AppError::PlatformApi(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(platform_error(status, &body));
        }

        // Platforms answer 200/201/204 with bodies of varying shape.
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::Null))
    }

    /// Fetch results (the platform's stored grades) for a line item.
    pub async fn get_results(
        &self,
        access_token: &str,
        lineitem_url: &str,
    ) -> Result<Vec<ResultRecord>, AppError> {
        let url = service_url(lineitem_url, "results");

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, MEDIA_RESULT_CONTAINER)
            .send()
            .await
            .map_err(|e| AppError::PlatformApi(e.to_string()))?;

        check_response_json(response).await
    }
}

/// Append a service path segment to a line item URL, keeping any query
/// string the platform put there (Moodle does).
pub(crate) fn service_url(lineitem_url: &str, segment: &str) -> String {
    match lineitem_url.split_once('?') {
        Some((base, query)) => format!("{}/{}?{}", base.trim_end_matches('/'), segment, query),
        None => format!("{}/{}", lineitem_url.trim_end_matches('/'), segment),
    }
}

fn platform_error(status: reqwest::StatusCode, body: &str) -> AppError {
    if status.as_u16() == 401 || status.as_u16() == 403 {
        tracing::warn!(status = %status, "Platform rejected the service token");
        return AppError::PlatformApi(format!("service token rejected (HTTP {})", status));
    }
    AppError::PlatformApi(format!("HTTP {}: {}", status, body))
}

/// Check response and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(platform_error(status, &body));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::PlatformApi(format!("JSON parse error: {}", e)))
}
