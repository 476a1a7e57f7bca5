//! VAPID keys and request authentication for Web Push (RFC 8292).
//!
//! [`VapidKeys`] holds the server's P-256 ECDSA keypair as configured.
//! [`VapidAuthenticator`] turns it into a signed `Authorization` header
//! value for one push endpoint.

// Rust guideline compliant 2026-02

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use p256::elliptic_curve::rand_core::OsRng;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::constants::{P256_POINT_LEN, VAPID_MAX_EXPIRY_SECS, VAPID_MIN_EXPIRY_SECS};
use crate::error::{PushError, Result};
use crate::notifications::push::decode_base64url;

/// JWS header; identical for every assertion.
const JWT_HEADER: &str = r#"{"typ":"JWT","alg":"ES256"}"#;

/// VAPID keypair for web push authentication.
///
/// The private key is the raw 32-byte scalar (base64url). The public key is
/// the uncompressed SEC1 point (65 bytes) that browsers receive as
/// `applicationServerKey`.
#[derive(Clone, Serialize, Deserialize)]
pub struct VapidKeys {
    /// Raw 32-byte P-256 private key scalar (base64url).
    private_key_b64: String,
    /// Uncompressed public key bytes (base64url, 65 bytes decoded).
    public_key_b64: String,
}

impl std::fmt::Debug for VapidKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidKeys")
            .field("public_key", &self.public_key_b64)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl VapidKeys {
    /// Generate a fresh VAPID keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        Self::from_signing_key(&signing_key)
    }

    fn from_signing_key(signing_key: &SigningKey) -> Self {
        // SEC1 uncompressed public key (65 bytes: 0x04 || x || y)
        let public_bytes = signing_key.verifying_key().to_encoded_point(false);
        Self {
            private_key_b64: BASE64URL.encode(signing_key.to_bytes().as_slice()),
            public_key_b64: BASE64URL.encode(public_bytes.as_bytes()),
        }
    }

    /// Base64url-encoded uncompressed public key (65 bytes decoded).
    pub fn public_key_base64url(&self) -> &str {
        &self.public_key_b64
    }

    /// Base64url-encoded raw 32-byte private key scalar.
    pub fn private_key_base64url(&self) -> &str {
        &self.private_key_b64
    }

    /// Reconstruct from configured base64url strings.
    ///
    /// The private key may be the raw scalar, SEC1 DER or PKCS8 DER; it is
    /// normalized to the raw scalar. The public key must be the one derived
    /// from the private key.
    pub fn from_base64url(public_key_b64: &str, private_key_b64: &str) -> Result<Self> {
        if public_key_b64.trim().is_empty() || private_key_b64.trim().is_empty() {
            return Err(PushError::Config("VAPID public and private keys are required".into()));
        }

        let pub_bytes = decode_base64url(public_key_b64)
            .map_err(|e| {
                PushError::Config(format!("invalid base64url for VAPID public key: {e}"))
            })?;
        if pub_bytes.len() != P256_POINT_LEN || pub_bytes[0] != 0x04 {
            return Err(PushError::Config(
                "VAPID public key must be 65-byte uncompressed P-256 point".into(),
            ));
        }

        let priv_bytes = decode_base64url(private_key_b64)
            .map_err(|e| {
                PushError::Config(format!("invalid base64url for VAPID private key: {e}"))
            })?;
        let signing_key = signing_key_from_bytes(&priv_bytes)?;

        let keys = Self::from_signing_key(&signing_key);
        if keys.public_key_bytes()? != pub_bytes {
            return Err(PushError::Config(
                "VAPID public key does not match the private key".into(),
            ));
        }
        Ok(keys)
    }

    /// Uncompressed public key bytes (65 bytes).
    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        BASE64URL
            .decode(&self.public_key_b64)
            .map_err(|e| PushError::Config(format!("failed to decode VAPID public key: {e}")))
    }

    fn signing_key(&self) -> Result<SigningKey> {
        let bytes = BASE64URL
            .decode(&self.private_key_b64)
            .map_err(|e| PushError::Config(format!("failed to decode VAPID private key: {e}")))?;
        signing_key_from_bytes(&bytes)
    }
}

/// Parse a private key given as raw scalar, SEC1 DER or PKCS8 DER.
fn signing_key_from_bytes(bytes: &[u8]) -> Result<SigningKey> {
    if bytes.len() == 32 {
        return SigningKey::from_bytes(bytes.into())
            .map_err(|_| PushError::Config("VAPID private key is not a valid P-256 scalar".into()));
    }

    if let Ok(sk) = p256::SecretKey::from_sec1_der(bytes) {
        log::info!("[WebPush] Normalized VAPID key from SEC1 DER ({} bytes)", bytes.len());
        return Ok(SigningKey::from(sk));
    }

    use p256::pkcs8::DecodePrivateKey;
    let sk = SigningKey::from_pkcs8_der(bytes).map_err(|_| {
        PushError::Config(format!(
            "VAPID private key is not a 32-byte scalar, SEC1 DER or PKCS8 DER ({} bytes)",
            bytes.len()
        ))
    })?;
    log::info!("[WebPush] Normalized VAPID key from PKCS8 DER ({} bytes)", bytes.len());
    Ok(sk)
}

#[derive(Serialize)]
struct Claims<'a> {
    aud: &'a str,
    exp: i64,
    sub: &'a str,
}

/// Signs VAPID assertions for push endpoints.
///
/// Immutable after construction and safe to share across concurrent
/// deliveries.
pub struct VapidAuthenticator {
    signing_key: SigningKey,
    public_key_b64: String,
    subject: String,
    expiry_secs: u64,
}

impl std::fmt::Debug for VapidAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidAuthenticator")
            .field("public_key", &self.public_key_b64)
            .field("subject", &self.subject)
            .field("expiry_secs", &self.expiry_secs)
            .finish_non_exhaustive()
    }
}

impl VapidAuthenticator {
    /// Build an authenticator from keys and a contact subject.
    ///
    /// `subject` must be a `mailto:` or `https:` URI. `expiry_secs` is the
    /// assertion lifetime, clamped to between 1 and 24 hours.
    pub fn new(keys: &VapidKeys, subject: &str, expiry_secs: u64) -> Result<Self> {
        let subject = subject.trim();
        if !(subject.starts_with("mailto:") || subject.starts_with("https:")) {
            return Err(PushError::Config(format!(
                "VAPID subject must be a mailto: or https: URI, got {subject:?}"
            )));
        }

        Ok(Self {
            signing_key: keys.signing_key()?,
            public_key_b64: keys.public_key_base64url().to_string(),
            subject: subject.to_string(),
            expiry_secs: expiry_secs.clamp(VAPID_MIN_EXPIRY_SECS, VAPID_MAX_EXPIRY_SECS),
        })
    }

    /// Server public key as sent in the `k=` parameter.
    pub fn public_key_base64url(&self) -> &str {
        &self.public_key_b64
    }

    /// The `aud` claim for an endpoint: its origin (scheme, host, non-default port).
    pub fn audience(endpoint: &str) -> Result<String> {
        let url = Url::parse(endpoint)
            .map_err(|e| PushError::SubscriptionInvalid(format!("endpoint is not a URL: {e}")))?;
        if url.host_str().is_none() {
            return Err(PushError::SubscriptionInvalid(format!(
                "endpoint has no host: {endpoint}"
            )));
        }
        Ok(url.origin().ascii_serialization())
    }

    /// Signed JWT for `endpoint`, valid from now for the configured lifetime.
    ///
    /// The signature is the raw 64-byte `r || s` form required by JWS ES256.
    pub fn sign(&self, endpoint: &str) -> Result<String> {
        let aud = Self::audience(endpoint)?;
        let exp = chrono::Utc::now().timestamp() + self.expiry_secs as i64;
        let claims = serde_json::to_vec(&Claims {
            aud: &aud,
            exp,
            sub: &self.subject,
        })
        .map_err(|e| PushError::Config(format!("failed to encode VAPID claims: {e}")))?;

        let signing_input = format!(
            "{}.{}",
            BASE64URL.encode(JWT_HEADER),
            BASE64URL.encode(claims)
        );
        let signature: Signature = self.signing_key.sign(signing_input.as_bytes());

        Ok(format!(
            "{signing_input}.{}",
            BASE64URL.encode(signature.to_bytes())
        ))
    }

    /// `Authorization` header value: `vapid t=<jwt>, k=<public key>`.
    pub fn authorization(&self, endpoint: &str) -> Result<String> {
        Ok(format!("vapid t={}, k={}", self.sign(endpoint)?, self.public_key_b64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::{signature::Verifier, VerifyingKey};

    /// Conformant verifier: checks signature, audience and expiry.
    fn verify(header: &str, expected_aud: &str) -> std::result::Result<serde_json::Value, String> {
        let rest = header.strip_prefix("vapid t=").ok_or("missing vapid scheme")?;
        let (token, key) = rest.split_once(", k=").ok_or("missing k parameter")?;

        let mut parts = token.split('.');
        let (h, c, s) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(c), Some(s), None) => (h, c, s),
            _ => return Err("token is not three segments".into()),
        };

        let key_bytes = BASE64URL.decode(key).map_err(|e| e.to_string())?;
        let verifying_key = VerifyingKey::from_sec1_bytes(&key_bytes).map_err(|e| e.to_string())?;
        let sig_bytes = BASE64URL.decode(s).map_err(|e| e.to_string())?;
        let signature = Signature::from_slice(&sig_bytes).map_err(|e| e.to_string())?;
        verifying_key
            .verify(format!("{h}.{c}").as_bytes(), &signature)
            .map_err(|e| e.to_string())?;

        let claims: serde_json::Value =
            serde_json::from_slice(&BASE64URL.decode(c).map_err(|e| e.to_string())?)
                .map_err(|e| e.to_string())?;
        if claims["aud"] != expected_aud {
            return Err(format!("audience mismatch: {}", claims["aud"]));
        }
        if claims["exp"].as_i64().unwrap_or(0) <= chrono::Utc::now().timestamp() {
            return Err("expired".into());
        }
        Ok(claims)
    }

    fn authenticator() -> VapidAuthenticator {
        VapidAuthenticator::new(&VapidKeys::generate(), "mailto:ops@brigade.example", 86_400)
            .expect("authenticator")
    }

    #[test]
    fn test_generate_vapid_keys() {
        let keys = VapidKeys::generate();

        let pub_bytes = keys.public_key_bytes().expect("decode public key");
        assert_eq!(pub_bytes.len(), 65, "uncompressed P-256 public key is 65 bytes");
        assert_eq!(pub_bytes[0], 0x04, "uncompressed point starts with 0x04");

        let priv_bytes = BASE64URL
            .decode(keys.private_key_base64url())
            .expect("decode private key");
        assert_eq!(priv_bytes.len(), 32, "raw P-256 scalar is 32 bytes");
    }

    #[test]
    fn test_from_base64url_roundtrip() {
        let keys = VapidKeys::generate();
        let reconstructed =
            VapidKeys::from_base64url(keys.public_key_base64url(), keys.private_key_base64url())
                .expect("should reconstruct from base64url");

        assert_eq!(keys.public_key_base64url(), reconstructed.public_key_base64url());
        assert_eq!(keys.private_key_base64url(), reconstructed.private_key_base64url());
    }

    #[test]
    fn test_der_private_keys_normalized_to_raw_scalar() {
        use p256::pkcs8::EncodePrivateKey;

        let signing_key = SigningKey::random(&mut OsRng);
        let expected = VapidKeys::from_signing_key(&signing_key);
        let secret_key: p256::SecretKey = signing_key.into();

        let sec1 = secret_key.to_sec1_der().expect("SEC1 DER");
        let pkcs8 = secret_key.to_pkcs8_der().expect("PKCS8 DER");

        for der in [sec1.to_vec(), pkcs8.as_bytes().to_vec()] {
            let keys =
                VapidKeys::from_base64url(expected.public_key_base64url(), &BASE64URL.encode(&der))
                    .expect("DER key should load");
            assert_eq!(keys.private_key_base64url(), expected.private_key_base64url());
        }
    }

    #[test]
    fn test_from_base64url_rejects_invalid() {
        assert!(VapidKeys::from_base64url("not-valid-key", "also-bad").is_err());
        assert!(VapidKeys::from_base64url("", "").is_err());
    }

    #[test]
    fn test_mismatched_public_key_rejected() {
        let a = VapidKeys::generate();
        let b = VapidKeys::generate();
        let err = VapidKeys::from_base64url(a.public_key_base64url(), b.private_key_base64url())
            .expect_err("mismatched pair must fail");
        assert!(matches!(err, PushError::Config(_)));
    }

    #[test]
    fn test_subject_must_be_mailto_or_https() {
        let keys = VapidKeys::generate();
        assert!(VapidAuthenticator::new(&keys, "https://brigade.example", 3600).is_ok());
        assert!(VapidAuthenticator::new(&keys, "ops@brigade.example", 3600).is_err());
        assert!(VapidAuthenticator::new(&keys, "http://brigade.example", 3600).is_err());
    }

    #[test]
    fn test_audience_is_endpoint_origin() {
        assert_eq!(
            VapidAuthenticator::audience("https://fcm.googleapis.com/fcm/send/abc").expect("aud"),
            "https://fcm.googleapis.com"
        );
        assert_eq!(
            VapidAuthenticator::audience("http://127.0.0.1:8080/push/1").expect("aud"),
            "http://127.0.0.1:8080"
        );
        assert!(VapidAuthenticator::audience("no-scheme").is_err());
    }

    #[test]
    fn test_signature_is_raw_64_bytes() {
        let auth = authenticator();
        for i in 0..32 {
            let token = auth.sign(&format!("https://push.example/{i}")).expect("sign");
            let sig = token.rsplit('.').next().expect("signature segment");
            assert_eq!(BASE64URL.decode(sig).expect("b64").len(), 64);
        }
    }

    #[test]
    fn test_header_and_claims() {
        let auth = authenticator();
        let token = auth
            .sign("https://updates.push.services.mozilla.com/wpush/v2/x")
            .expect("sign");
        let mut parts = token.split('.');

        let header: serde_json::Value =
            serde_json::from_slice(&BASE64URL.decode(parts.next().expect("header")).expect("b64"))
                .expect("json");
        assert_eq!(header["typ"], "JWT");
        assert_eq!(header["alg"], "ES256");

        let claims: serde_json::Value =
            serde_json::from_slice(&BASE64URL.decode(parts.next().expect("claims")).expect("b64"))
                .expect("json");
        assert_eq!(claims["aud"], "https://updates.push.services.mozilla.com");
        assert_eq!(claims["sub"], "mailto:ops@brigade.example");
        let exp = claims["exp"].as_i64().expect("exp");
        let now = chrono::Utc::now().timestamp();
        assert!(exp > now && exp <= now + 86_400);
    }

    #[test]
    fn test_authorization_verifies_for_own_origin_only() {
        let auth = authenticator();
        let header = auth.authorization("https://push-a.example/sub/1").expect("authorization");
        assert!(header.ends_with(&format!(", k={}", auth.public_key_base64url())));

        verify(&header, "https://push-a.example").expect("valid for endpoint A");
        assert!(verify(&header, "https://push-b.example").is_err());
    }

    #[test]
    fn test_expiry_clamped_to_24_hours() {
        let auth = VapidAuthenticator::new(&VapidKeys::generate(), "mailto:a@b.c", 7 * 86_400)
            .expect("authenticator");
        let header = auth.authorization("https://push.example/x").expect("authorization");
        let claims = verify(&header, "https://push.example").expect("valid");
        assert!(claims["exp"].as_i64().expect("exp") <= chrono::Utc::now().timestamp() + 86_400);
    }

    #[test]
    fn test_zero_ttl_still_gets_an_hour() {
        let before = chrono::Utc::now().timestamp();
        let auth = VapidAuthenticator::new(&VapidKeys::generate(), "mailto:a@b.c", 0)
            .expect("authenticator");
        let header = auth.authorization("https://push.example/x").expect("authorization");
        let claims = verify(&header, "https://push.example").expect("valid");
        assert!(claims["exp"].as_i64().expect("exp") >= before + 3600);
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let keys = VapidKeys::generate();
        let debug = format!("{keys:?}");
        assert!(!debug.contains(keys.private_key_base64url()));
        assert!(debug.contains(keys.public_key_base64url()));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_vapid_keys_roundtrip_serde() {
        let keys = VapidKeys::generate();
        let json = serde_json::to_string(&keys).expect("serialize");
        let loaded: VapidKeys = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(keys.public_key_base64url(), loaded.public_key_base64url());
        assert_eq!(keys.private_key_base64url(), loaded.private_key_base64url());
    }
}
