// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod ags;
pub mod deep_linking;
pub mod keys;
pub mod launch;
pub mod nrps;
pub mod platform_jwks;
pub mod registration;
pub mod token;

pub use ags::AgsClient;
pub use keys::ToolKeys;
pub use launch::{LaunchCache, NonceStore, StoredLaunch};
pub use nrps::NrpsClient;
pub use platform_jwks::PlatformKeyVerifier;
pub use registration::DynamicRegistrationService;
pub use token::AccessTokenService;
