// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! LTI 1.3 message launch claims.
//!
//! Field names follow the claim URIs from the IMS specifications; serde
//! renames keep the Rust side readable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// LTI version this tool speaks. The `version` claim must match exactly.
pub const LTI_VERSION: &str = "1.3.0";

/// Role vocabulary URIs used for access checks.
pub mod roles {
    pub const CONTEXT_INSTRUCTOR: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/membership#Instructor";
    pub const CONTEXT_TEACHING_ASSISTANT: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/membership/Instructor#TeachingAssistant";
    pub const CONTEXT_LEARNER: &str = "http://purl.imsglobal.org/vocab/lis/v2/membership#Learner";
    pub const INSTITUTION_INSTRUCTOR: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Instructor";
    pub const INSTITUTION_STUDENT: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Student";
}

/// Supported LTI message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    ResourceLink,
    DeepLinking,
}

impl MessageType {
    /// Parse the `message_type` claim value. Returns `None` for message
    /// types this tool does not handle (e.g. submission review).
    pub fn from_claim(value: &str) -> Option<Self> {
        match value {
            "LtiResourceLinkRequest" => Some(Self::ResourceLink),
            "LtiDeepLinkingRequest" => Some(Self::DeepLinking),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceLink => "LtiResourceLinkRequest",
            Self::DeepLinking => "LtiDeepLinkingRequest",
        }
    }
}

/// The `aud` claim may be a single string or an array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Audience::One(aud) => aud == client_id,
            Audience::Many(auds) => auds.iter().any(|a| a == client_id),
        }
    }

    /// The effective audience: for multi-valued `aud` the platform names
    /// the intended party in `azp`, which callers check separately.
    pub fn first(&self) -> Option<&str> {
        match self {
            Audience::One(aud) => Some(aud),
            Audience::Many(auds) => auds.first().map(String::as_str),
        }
    }
}

/// Resource link claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLinkClaim {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Context (course) claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextClaim {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Assignment & Grade Services endpoint claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgsEndpointClaim {
    #[serde(default)]
    pub scope: Vec<String>,
    /// Line item container URL (present when the tool may manage line items).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineitems: Option<String>,
    /// The line item coupled to this resource link, if the platform made one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineitem: Option<String>,
}

impl AgsEndpointClaim {
    /// Whether the launch authorizes creating line items.
    pub fn can_create_lineitem(&self) -> bool {
        self.lineitems.is_some()
            && self
                .scope
                .iter()
                .any(|s| s == crate::services::token::scopes::AGS_LINEITEM)
    }
}

/// Names & Role Provisioning Services claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NrpsClaim {
    pub context_memberships_url: String,
    #[serde(default)]
    pub service_versions: Vec<String>,
}

/// Deep linking settings claim, present on `LtiDeepLinkingRequest` launches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepLinkingSettings {
    pub deep_link_return_url: String,
    #[serde(default)]
    pub accept_types: Vec<String>,
    #[serde(default)]
    pub accept_presentation_document_targets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_multiple: Option<bool>,
    /// Opaque platform value that must be echoed in the response JWT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// The full set of claims carried by a validated `id_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchClaims {
    pub iss: String,
    pub aud: Audience,
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/message_type")]
    pub message_type: String,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/version")]
    pub version: String,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/deployment_id")]
    pub deployment_id: String,
    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti/claim/target_link_uri",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_link_uri: Option<String>,
    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti/claim/resource_link",
        skip_serializing_if = "Option::is_none"
    )]
    pub resource_link: Option<ResourceLinkClaim>,
    #[serde(default, rename = "https://purl.imsglobal.org/spec/lti/claim/roles")]
    pub roles: Vec<String>,
    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti/claim/context",
        skip_serializing_if = "Option::is_none"
    )]
    pub context: Option<ContextClaim>,
    #[serde(default, rename = "https://purl.imsglobal.org/spec/lti/claim/custom")]
    pub custom: HashMap<String, serde_json::Value>,
    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint",
        skip_serializing_if = "Option::is_none"
    )]
    pub ags_endpoint: Option<AgsEndpointClaim>,
    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti-nrps/claim/namesroleservice",
        skip_serializing_if = "Option::is_none"
    )]
    pub names_role_service: Option<NrpsClaim>,
    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti-dl/claim/deep_linking_settings",
        skip_serializing_if = "Option::is_none"
    )]
    pub deep_linking_settings: Option<DeepLinkingSettings>,
}

impl LaunchClaims {
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_claim(&self.message_type)
    }

    pub fn is_deep_link_launch(&self) -> bool {
        self.message_type() == Some(MessageType::DeepLinking)
    }

    pub fn has_ags(&self) -> bool {
        self.ags_endpoint.is_some()
    }

    pub fn has_nrps(&self) -> bool {
        self.names_role_service.is_some()
    }

    /// Instructor access: context Instructor role or institution staff.
    pub fn is_instructor(&self) -> bool {
        has_any_role(
            &self.roles,
            &[roles::CONTEXT_INSTRUCTOR, roles::INSTITUTION_INSTRUCTOR],
        )
    }

    pub fn is_teaching_assistant(&self) -> bool {
        has_any_role(&self.roles, &[roles::CONTEXT_TEACHING_ASSISTANT])
    }

    pub fn is_student(&self) -> bool {
        has_any_role(
            &self.roles,
            &[roles::CONTEXT_LEARNER, roles::INSTITUTION_STUDENT],
        )
    }

    pub fn resource_link_id(&self) -> Option<&str> {
        self.resource_link.as_ref().map(|r| r.id.as_str())
    }

    /// A custom launch parameter, as a string if it is one.
    pub fn custom_param(&self, key: &str) -> Option<&str> {
        self.custom.get(key).and_then(|v| v.as_str())
    }
}

/// Check a role list against a set of role URIs. Platforms are allowed to
/// send the short `membership#` form without the base URI; accept both.
pub fn has_any_role(assigned: &[String], wanted: &[&str]) -> bool {
    assigned.iter().any(|role| {
        wanted.iter().any(|w| {
            role == w || w.rsplit_once('#').is_some_and(|(_, short)| role == short)
        })
    })
}
