// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod launch;
pub mod registration;

pub use launch::{LaunchClaims, MessageType};
pub use registration::PlatformRegistration;
