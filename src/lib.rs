// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Chalkline: an LTI 1.3 Advantage tool backend
//!
//! This crate provides the tool-side flows a learning platform talks to:
//! OIDC login, message launches, dynamic registration, deep linking, and
//! the Assignment & Grade / Names & Role services.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::RegistrationStore;
use services::{
    AccessTokenService, AgsClient, DynamicRegistrationService, LaunchCache, NonceStore,
    NrpsClient, PlatformKeyVerifier, ToolKeys,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: RegistrationStore,
    pub keys: ToolKeys,
    pub platform_keys: PlatformKeyVerifier,
    pub launches: LaunchCache,
    pub nonces: NonceStore,
    pub tokens: AccessTokenService,
    pub ags: AgsClient,
    pub nrps: NrpsClient,
    pub registrations: DynamicRegistrationService,
}
