// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory launch state: validated launches and outstanding nonces.
//!
//! Launch data lives for the working session of a user inside the platform
//! iframe; nonces live only between login initiation and the launch POST.
//! Both are per-instance caches, mirroring the cache-table storage the
//! deployment docs call for.

use crate::models::LaunchClaims;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::DashMap;
use rand::RngCore;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a validated launch stays usable.
const LAUNCH_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// How long a login nonce may wait for its launch.
const NONCE_TTL: Duration = Duration::from_secs(10 * 60);

/// A validated launch held for follow-up requests.
#[derive(Debug, Clone)]
pub struct StoredLaunch {
    pub claims: LaunchClaims,
    /// Registration the launch validated against
    pub issuer: String,
    pub client_id: String,
}

struct CacheSlot {
    launch: Arc<StoredLaunch>,
    expires_at: Instant,
}

/// Cache of validated launches keyed by launch id.
#[derive(Clone)]
pub struct LaunchCache {
    slots: Arc<DashMap<String, CacheSlot>>,
    ttl: Duration,
}

impl Default for LaunchCache {
    fn default() -> Self {
        Self::with_ttl(LAUNCH_TTL)
    }
}

impl LaunchCache {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Store a validated launch, returning its generated launch id.
    pub fn insert(&self, launch: StoredLaunch) -> String {
        // Drop expired slots while we are here; the cache never grows
        // past the launches of one TTL window.
        let now = Instant::now();
        self.slots.retain(|_, slot| slot.expires_at > now);

        let launch_id = uuid::Uuid::new_v4().to_string();
        self.slots.insert(
            launch_id.clone(),
            CacheSlot {
                launch: Arc::new(launch),
                expires_at: now + self.ttl,
            },
        );
        launch_id
    }

    /// Fetch a launch by id, treating expired entries as absent.
    pub fn get(&self, launch_id: &str) -> Option<Arc<StoredLaunch>> {
        let slot = self.slots.get(launch_id)?;
        if slot.expires_at <= Instant::now() {
            drop(slot);
            self.slots.remove(launch_id);
            return None;
        }
        Some(slot.launch.clone())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Single-use nonce store for the OIDC login handshake.
#[derive(Clone)]
pub struct NonceStore {
    nonces: Arc<DashMap<String, Instant>>,
    ttl: Duration,
}

impl Default for NonceStore {
    fn default() -> Self {
        Self::with_ttl(NONCE_TTL)
    }
}

impl NonceStore {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            nonces: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Mint a fresh nonce and remember it until consumed or expired.
    pub fn issue(&self) -> String {
        let now = Instant::now();
        self.nonces.retain(|_, expires_at| *expires_at > now);

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let nonce = URL_SAFE_NO_PAD.encode(bytes);

        self.nonces.insert(nonce.clone(), now + self.ttl);
        nonce
    }

    /// Consume a nonce. Returns false for unknown, expired, or replayed
    /// values; a nonce only ever validates once.
    pub fn consume(&self, nonce: &str) -> bool {
        match self.nonces.remove(nonce) {
            Some((_, expires_at)) => expires_at > Instant::now(),
            None => false,
        }
    }
}
