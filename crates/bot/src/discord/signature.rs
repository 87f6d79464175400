//! Interaction request signature verification.
//!
//! Discord signs every interaction request with the application's Ed25519
//! key. The signed message is the `X-Signature-Timestamp` header value
//! followed by the raw request body:
//! <https://discord.com/developers/docs/interactions/overview#setting-up-an-endpoint-validating-security-request-headers>

use ed25519_dalek::{Signature, Verifier as _, VerifyingKey};
use thiserror::Error;
use tracing::{debug, instrument};

/// Header carrying the hex-encoded signature.
pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";

/// Header carrying the unix timestamp that was signed.
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// Maximum accepted clock skew, in seconds.
const MAX_TIMESTAMP_SKEW_SECS: i64 = 300;

/// Errors that can occur while verifying an interaction request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("malformed signature")]
    MalformedSignature,

    #[error("invalid timestamp")]
    InvalidTimestamp,

    #[error("request timestamp outside the accepted window")]
    StaleTimestamp,

    #[error("signature mismatch")]
    Mismatch,
}

/// Verifies interaction requests against the application public key.
#[derive(Debug, Clone)]
pub struct InteractionVerifier {
    key: VerifyingKey,
}

impl InteractionVerifier {
    #[must_use]
    pub const fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Build a verifier from the hex public key shown in the developer portal.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::InvalidPublicKey` if the key is not 32 bytes
    /// of hex or not a valid curve point.
    pub fn from_hex(public_key: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(public_key.trim())
            .map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SignatureError::InvalidPublicKey("expected 32 bytes".to_string()))?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))?;
        Ok(Self::new(key))
    }

    /// Verify a request against the current time.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError` if the timestamp is stale or the signature
    /// does not match.
    #[instrument(skip(self, signature, body))]
    pub fn verify(
        &self,
        signature: &str,
        timestamp: &str,
        body: &[u8],
    ) -> Result<(), SignatureError> {
        self.verify_at(signature, timestamp, body, chrono::Utc::now().timestamp())
    }

    /// Verify a request as if the current unix time were `now`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::verify`].
    pub fn verify_at(
        &self,
        signature: &str,
        timestamp: &str,
        body: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let ts: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;

        if (now - ts).abs() > MAX_TIMESTAMP_SKEW_SECS {
            return Err(SignatureError::StaleTimestamp);
        }

        let sig_bytes = hex::decode(signature.trim()).map_err(|_| SignatureError::MalformedSignature)?;
        let signature =
            Signature::from_slice(&sig_bytes).map_err(|_| SignatureError::MalformedSignature)?;

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        self.key
            .verify(&message, &signature)
            .map_err(|_| SignatureError::Mismatch)?;

        debug!("Interaction signature verified");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ed25519_dalek::{Signer as _, SigningKey};

    use super::*;

    const NOW: i64 = 1_760_000_000;

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn verifier() -> InteractionVerifier {
        InteractionVerifier::new(signing_key().verifying_key())
    }

    fn sign(timestamp: &str, body: &[u8]) -> String {
        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(body);
        hex::encode(signing_key().sign(&message).to_bytes())
    }

    #[test]
    fn test_valid_signature() {
        let ts = NOW.to_string();
        let body = br#"{"type":1}"#;
        let sig = sign(&ts, body);
        assert_eq!(verifier().verify_at(&sig, &ts, body, NOW), Ok(()));
    }

    #[test]
    fn test_tampered_body() {
        let ts = NOW.to_string();
        let sig = sign(&ts, br#"{"type":1}"#);
        assert_eq!(
            verifier().verify_at(&sig, &ts, br#"{"type":2}"#, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp() {
        let ts = (NOW - 600).to_string();
        let body = b"{}";
        let sig = sign(&ts, body);
        assert_eq!(
            verifier().verify_at(&sig, &ts, body, NOW),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn test_malformed_inputs() {
        let v = verifier();
        assert_eq!(
            v.verify_at("zz", &NOW.to_string(), b"{}", NOW),
            Err(SignatureError::MalformedSignature)
        );
        assert_eq!(
            v.verify_at("00", "yesterday", b"{}", NOW),
            Err(SignatureError::InvalidTimestamp)
        );
    }

    #[test]
    fn test_from_hex_round_trip() {
        let hex_key = hex::encode(signing_key().verifying_key().to_bytes());
        let v = InteractionVerifier::from_hex(&hex_key).unwrap();
        let ts = NOW.to_string();
        let sig = sign(&ts, b"{}");
        assert!(v.verify_at(&sig, &ts, b"{}", NOW).is_ok());
    }

    #[test]
    fn test_from_hex_rejects_short_key() {
        assert!(matches!(
            InteractionVerifier::from_hex("abcd"),
            Err(SignatureError::InvalidPublicKey(_))
        ));
    }
}
