//! Shared helpers for integration tests: subscriber keys, a reference
//! RFC 8291 decryptor, and sender construction.

#![allow(dead_code, reason = "not every test binary uses every helper")]

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use brigade_push::{
    NotificationSender, PushDispatcher, SubscriptionStore, VapidAuthenticator, VapidKeys,
};
use hkdf::Hkdf;
use p256::elliptic_curve::rand_core::OsRng;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;

/// A browser-side subscriber: private key plus the base64url values it
/// would post to the portal.
pub struct Subscriber {
    pub secret: SecretKey,
    pub p256dh: String,
    pub auth: String,
    auth_bytes: [u8; 16],
}

impl Subscriber {
    pub fn new() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let p256dh = BASE64URL.encode(secret.public_key().to_encoded_point(false).as_bytes());
        let auth_bytes: [u8; 16] = *b"brigade-auth-key";
        Self {
            secret,
            p256dh,
            auth: BASE64URL.encode(auth_bytes),
            auth_bytes,
        }
    }

    /// Decrypt an aes128gcm push body the way a user agent does.
    pub fn decrypt(&self, body: &[u8]) -> Vec<u8> {
        let salt = &body[..16];
        assert_eq!(&body[16..20], &4096u32.to_be_bytes());
        assert_eq!(body[20], 65);
        let server_key = &body[21..86];
        let server_public = PublicKey::from_sec1_bytes(server_key).expect("server key");

        let shared =
            p256::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), server_public.as_affine());
        let mut info = b"WebPush: info\0".to_vec();
        info.extend_from_slice(self.secret.public_key().to_encoded_point(false).as_bytes());
        info.extend_from_slice(server_key);
        let mut ikm = [0u8; 32];
        Hkdf::<Sha256>::new(Some(&self.auth_bytes[..]), shared.raw_secret_bytes().as_slice())
            .expand(&info, &mut ikm)
            .expect("ikm");

        let hk = Hkdf::<Sha256>::new(Some(salt), &ikm);
        let mut cek = [0u8; 16];
        hk.expand(b"Content-Encoding: aes128gcm\0", &mut cek).expect("cek");
        let mut nonce = [0u8; 12];
        hk.expand(b"Content-Encoding: nonce\0", &mut nonce).expect("nonce");

        let mut plain = Aes128Gcm::new_from_slice(&cek)
            .expect("key")
            .decrypt(Nonce::from_slice(&nonce), &body[86..])
            .expect("authentic");
        assert_eq!(plain.pop(), Some(0x02), "single-record delimiter");
        plain
    }
}

/// Enabled sender over `store` with a fresh VAPID keypair.
pub fn sender(store: Arc<dyn SubscriptionStore>, timeout: Duration) -> NotificationSender {
    let authenticator =
        VapidAuthenticator::new(&VapidKeys::generate(), "mailto:ops@brigade.example", 86_400)
            .expect("authenticator");
    let dispatcher =
        PushDispatcher::new(Arc::new(authenticator), 86_400, timeout).expect("dispatcher");
    NotificationSender::new(store, dispatcher)
}

/// Claims of the VAPID JWT in an `Authorization` header.
pub fn vapid_claims(authorization: &str) -> serde_json::Value {
    let token = authorization
        .strip_prefix("vapid t=")
        .and_then(|rest| rest.split(", k=").next())
        .expect("vapid header");
    let claims = token.split('.').nth(1).expect("claims segment");
    serde_json::from_slice(&BASE64URL.decode(claims).expect("base64url")).expect("json")
}
