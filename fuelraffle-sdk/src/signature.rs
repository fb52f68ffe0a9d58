//! QR token signing and verification for dispenser redemptions.
//!
//! A station prints (or displays) a QR code that authorizes a single redemption at
//! one dispenser for a bounded time. The code content has the wire format:
//!
//! ```text
//! FRQR1.{base64_payload_json}.{base64_ed25519_signature}
//! ```
//!
//! The signature covers the exact payload JSON bytes carried in the token, so the
//! verifier never re-serializes before checking it. Verification order is fixed:
//! structure, then signature, then expiry.
//!
//! The signer is stateless. Single-use enforcement happens downstream through the
//! redemption idempotency key.

use ring::signature::{ED25519, Ed25519KeyPair, KeyPair, UnparsedPublicKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version prefix of the scannable token content.
pub const TOKEN_PREFIX: &str = "FRQR1";

/// Default upper bound for `expiration_hours` accepted by [`QrSigner::sign`].
pub const DEFAULT_MAX_EXPIRATION_HOURS: u32 = 72;

/// Header name for admin API authentication (plaintext secret).
pub const ADMIN_AUTH_HEADER: &str = "Fuelraffle-Admin-Authorization";

/// The signed part of a QR token.
///
/// Field order is part of the wire format: serde serializes fields in
/// declaration order, which keeps the signed bytes deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    pub station_id: Uuid,
    pub dispenser_id: Uuid,
    /// Unix timestamp (seconds).
    pub issued_at: i64,
    /// Unix timestamp (seconds). The token is valid while `now < expires_at`.
    pub expires_at: i64,
}

/// Errors produced while verifying a presented token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QrError {
    #[error("malformed QR token")]
    Malformed,
    #[error("bad QR token signature")]
    BadSignature,
    #[error("QR token expired")]
    Expired,
}

impl From<ring::error::Unspecified> for QrError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::BadSignature
    }
}

/// Errors produced while issuing a token.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("expiration must be between 1 and {max} hours, got {requested}")]
    InvalidExpiration { requested: u32, max: u32 },
    #[error("failed to serialize QR payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors produced while loading key material.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("rejected Ed25519 key: {0}")]
    Rejected(String),
    #[error("failed to generate Ed25519 key")]
    Generate,
    #[error("invalid base64 key encoding")]
    InvalidBase64,
}

// ---------------------------------------------------------------------------
// Key provider
// ---------------------------------------------------------------------------

/// Supplies the asymmetric key pair used to sign QR tokens.
///
/// Loaded once at process start and shared by reference. Rotation is owned by
/// whoever constructs the provider.
pub trait SigningKeyProvider: Send + Sync {
    /// The key pair used for signing.
    fn key_pair(&self) -> &Ed25519KeyPair;

    /// Raw public key bytes, as handed to verifiers.
    fn public_key(&self) -> &[u8] {
        self.key_pair().public_key().as_ref()
    }
}

/// An Ed25519 key provider backed by a PKCS#8 document.
pub struct Ed25519KeyProvider {
    key_pair: Ed25519KeyPair,
}

impl Ed25519KeyProvider {
    /// Load a key pair from a PKCS#8 v2 DER document.
    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Self, KeyError> {
        let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8)
            .map_err(|e| KeyError::Rejected(e.to_string()))?;
        Ok(Self { key_pair })
    }

    /// Load a key pair from a base64-encoded PKCS#8 document.
    pub fn from_pkcs8_base64(encoded: &str) -> Result<Self, KeyError> {
        let der = fast32::base64::RFC4648_NOPAD
            .decode_str(encoded.trim().trim_end_matches('='))
            .map_err(|_| KeyError::InvalidBase64)?;
        Self::from_pkcs8(&der)
    }

    /// Generate a fresh key pair. Returns the provider and its PKCS#8 document.
    pub fn generate() -> Result<(Self, Vec<u8>), KeyError> {
        let rng = ring::rand::SystemRandom::new();
        let document = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| KeyError::Generate)?;
        let pkcs8 = document.as_ref().to_vec();
        Ok((Self::from_pkcs8(&pkcs8)?, pkcs8))
    }
}

impl SigningKeyProvider for Ed25519KeyProvider {
    fn key_pair(&self) -> &Ed25519KeyPair {
        &self.key_pair
    }
}

// ---------------------------------------------------------------------------
// SignedToken
// ---------------------------------------------------------------------------

/// A signed QR token: the typed payload, the exact signed JSON, and the
/// detached signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    pub payload: QrPayload,
    pub json: String,
    pub signature: Box<[u8]>,
}

impl SignedToken {
    /// Format the scannable content string.
    pub fn content(&self) -> String {
        format!(
            "{}.{}.{}",
            TOKEN_PREFIX,
            fast32::base64::RFC4648_NOPAD.encode(self.json.as_bytes()),
            fast32::base64::RFC4648_NOPAD.encode(&self.signature),
        )
    }

    /// Parse scannable content into a token.
    ///
    /// This checks structure only and does **not** verify the signature. Call
    /// [`verify`](Self::verify) for that.
    pub fn parse(content: &str) -> Result<Self, QrError> {
        let mut parts = content.trim().split('.');
        let (Some(prefix), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(QrError::Malformed);
        };
        if prefix != TOKEN_PREFIX {
            return Err(QrError::Malformed);
        }
        let json_bytes = fast32::base64::RFC4648_NOPAD
            .decode_str(payload)
            .map_err(|_| QrError::Malformed)?;
        let json = String::from_utf8(json_bytes).map_err(|_| QrError::Malformed)?;
        let signature = fast32::base64::RFC4648_NOPAD
            .decode_str(signature)
            .map_err(|_| QrError::Malformed)?
            .into_boxed_slice();
        let payload: QrPayload = serde_json::from_str(&json).map_err(|_| QrError::Malformed)?;
        Ok(Self {
            payload,
            json,
            signature,
        })
    }

    /// Verify against the current wall clock.
    pub fn verify(self, public_key: &[u8]) -> Result<QrPayload, QrError> {
        self.verify_at(public_key, time::OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Verify the signature, then that `now < expires_at`.
    ///
    /// ring's Ed25519 verification does not branch on signature contents, so a
    /// forged token takes as long to reject as a nearly-valid one.
    pub fn verify_at(self, public_key: &[u8], now: i64) -> Result<QrPayload, QrError> {
        UnparsedPublicKey::new(&ED25519, public_key)
            .verify(self.json.as_bytes(), &self.signature)?;
        if now >= self.payload.expires_at {
            return Err(QrError::Expired);
        }
        Ok(self.payload)
    }
}

/// Parse and verify scannable content in one step.
pub fn verify_content(content: &str, public_key: &[u8], now: i64) -> Result<QrPayload, QrError> {
    SignedToken::parse(content)?.verify_at(public_key, now)
}

// ---------------------------------------------------------------------------
// QrSigner
// ---------------------------------------------------------------------------

/// Issues and verifies QR tokens with an injected key provider.
pub struct QrSigner<K: SigningKeyProvider> {
    keys: K,
    max_expiration_hours: u32,
}

impl<K: SigningKeyProvider> QrSigner<K> {
    pub fn new(keys: K, max_expiration_hours: u32) -> Self {
        Self {
            keys,
            max_expiration_hours,
        }
    }

    /// Public key bytes for verifiers.
    pub fn public_key(&self) -> &[u8] {
        self.keys.public_key()
    }

    /// Sign a token valid for `expiration_hours` from now.
    pub fn sign(
        &self,
        station_id: Uuid,
        dispenser_id: Uuid,
        expiration_hours: u32,
    ) -> Result<SignedToken, SigningError> {
        self.sign_at(
            station_id,
            dispenser_id,
            expiration_hours,
            time::OffsetDateTime::now_utc().unix_timestamp(),
        )
    }

    /// Sign a token issued at `now`.
    pub fn sign_at(
        &self,
        station_id: Uuid,
        dispenser_id: Uuid,
        expiration_hours: u32,
        now: i64,
    ) -> Result<SignedToken, SigningError> {
        if expiration_hours == 0 || expiration_hours > self.max_expiration_hours {
            return Err(SigningError::InvalidExpiration {
                requested: expiration_hours,
                max: self.max_expiration_hours,
            });
        }
        let payload = QrPayload {
            station_id,
            dispenser_id,
            issued_at: now,
            expires_at: now + i64::from(expiration_hours) * 3600,
        };
        let json = serde_json::to_string(&payload)?;
        let signature = self.keys.key_pair().sign(json.as_bytes());
        Ok(SignedToken {
            payload,
            json,
            signature: signature.as_ref().to_owned().into_boxed_slice(),
        })
    }

    /// Verify scannable content with this signer's own public key.
    pub fn verify(&self, content: &str) -> Result<QrPayload, QrError> {
        SignedToken::parse(content)?.verify(self.public_key())
    }
}
