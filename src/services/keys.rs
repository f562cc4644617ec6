// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tool signing key management.
//!
//! The tool holds one RSA keypair: the private half signs client assertions
//! and deep-linking response JWTs, the public half is served from `/jwks`
//! so platforms can verify them. The key is generated on first start and
//! persisted; platforms cache the JWKS, so the kid must stay stable.

use crate::db::{RegistrationStore, ToolKeyRecord};
use crate::error::AppError;
use anyhow::Context;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::Serialize;
use sha2::{Digest, Sha256};

const RSA_BITS: usize = 2048;

/// A single public key in JWK form.
#[derive(Debug, Clone, Serialize)]
pub struct Jwk {
    pub kty: &'static str,
    pub alg: &'static str,
    #[serde(rename = "use")]
    pub use_: &'static str,
    pub kid: String,
    pub n: String,
    pub e: String,
}

/// The tool's public key set, as served from `/jwks`.
#[derive(Debug, Clone, Serialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// The tool's signing key with derived public material.
#[derive(Clone)]
pub struct ToolKeys {
    kid: String,
    encoding_key: EncodingKey,
    public_jwk: Jwk,
}

impl ToolKeys {
    /// Load the persisted key, generating and storing a fresh one on first
    /// start.
    pub fn load_or_generate(store: &RegistrationStore) -> Result<Self, AppError> {
        if let Some(record) = store.load_tool_key()? {
            tracing::info!(kid = %record.kid, "Loaded tool signing key");
            return Self::from_record(&record);
        }

        tracing::info!(bits = RSA_BITS, "Generating tool signing key");
        let record = generate_key_record()?;
        store.save_tool_key(&record)?;
        tracing::info!(kid = %record.kid, "Tool signing key generated");

        Self::from_record(&record)
    }

    /// Build the key set from persisted material.
    pub fn from_record(record: &ToolKeyRecord) -> Result<Self, AppError> {
        let private = RsaPrivateKey::from_pkcs8_pem(&record.private_key_pem)
            .context("failed parsing tool private key PEM")
            .map_err(AppError::Internal)?;

        let encoding_key = EncodingKey::from_rsa_pem(record.private_key_pem.as_bytes())
            .context("failed building RS256 encoding key")
            .map_err(AppError::Internal)?;

        let public_jwk = public_jwk(&private, &record.kid);

        Ok(Self {
            kid: record.kid.clone(),
            encoding_key,
            public_jwk,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The public key set document.
    pub fn jwks(&self) -> Jwks {
        Jwks {
            keys: vec![self.public_jwk.clone()],
        }
    }

    /// Sign a claim set as an RS256 JWT with this tool's kid in the header.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, AppError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());

        jsonwebtoken::encode(&header, claims, &self.encoding_key)
            .context("failed signing JWT with tool key")
            .map_err(AppError::Internal)
    }

    /// Decoding key for the public half. Used by tests to verify what this
    /// tool signed.
    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_rsa_components(&self.public_jwk.n, &self.public_jwk.e)
            .expect("JWK components derived from a valid key")
    }
}

/// Generate a fresh keypair and its storage record.
fn generate_key_record() -> Result<ToolKeyRecord, AppError> {
    let mut rng = rand::thread_rng();
    let private = RsaPrivateKey::new(&mut rng, RSA_BITS)
        .context("RSA key generation failed")
        .map_err(AppError::Internal)?;

    let pem = private
        .to_pkcs8_pem(LineEnding::LF)
        .context("failed encoding private key PEM")
        .map_err(AppError::Internal)?
        .to_string();

    let kid = derive_kid(&private)?;

    Ok(ToolKeyRecord {
        kid,
        private_key_pem: pem,
    })
}

/// Derive a stable kid from the public key DER (truncated SHA-256,
/// base64url).
fn derive_kid(private: &RsaPrivateKey) -> Result<String, AppError> {
    let der = private
        .to_public_key()
        .to_public_key_der()
        .context("failed encoding public key DER")
        .map_err(AppError::Internal)?;

    let digest = Sha256::digest(der.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(&digest[..16]))
}

fn public_jwk(private: &RsaPrivateKey, kid: &str) -> Jwk {
    let public = private.to_public_key();
    Jwk {
        kty: "RSA",
        alg: "RS256",
        use_: "sig",
        kid: kid.to_string(),
        n: URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
        e: URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, Validation};
    use serde::Deserialize;

    #[derive(Serialize, Deserialize)]
    struct TestClaims {
        iss: String,
        aud: String,
        exp: i64,
    }

    fn test_keys() -> ToolKeys {
        let record = generate_key_record().unwrap();
        ToolKeys::from_record(&record).unwrap()
    }

    #[test]
    fn test_jwks_shape() {
        let keys = test_keys();
        let jwks = keys.jwks();

        assert_eq!(jwks.keys.len(), 1);
        let jwk = &jwks.keys[0];
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.alg, "RS256");
        assert_eq!(jwk.use_, "sig");
        assert_eq!(jwk.kid, keys.kid());
        assert!(!jwk.n.is_empty());
        // 65537 big-endian, base64url
        assert_eq!(jwk.e, "AQAB");
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let keys = test_keys();

        let claims = TestClaims {
            iss: "client-1".to_string(),
            aud: "https://lms.example.edu".to_string(),
            exp: chrono::Utc::now().timestamp() + 300,
        };

        let token = keys.sign(&claims).unwrap();

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some(keys.kid()));

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&["https://lms.example.edu"]);
        let decoded =
            decode::<TestClaims>(&token, &keys.decoding_key(), &validation).unwrap();
        assert_eq!(decoded.claims.iss, "client-1");
    }

    #[test]
    fn test_key_record_stable_across_reload() {
        let record = generate_key_record().unwrap();
        let a = ToolKeys::from_record(&record).unwrap();
        let b = ToolKeys::from_record(&record).unwrap();

        assert_eq!(a.kid(), b.kid());
        assert_eq!(a.jwks().keys[0].n, b.jwks().keys[0].n);
    }
}
