//! Web Push message encryption (RFC 8291, `aes128gcm` content coding).
//!
//! Every call generates a fresh ephemeral P-256 keypair and a fresh salt.
//! The output is a single aes128gcm record ready to be POSTed with
//! `Content-Encoding: aes128gcm`.
//!
//! # Wire Format
//!
//! ```text
//! salt (16) || rs = 4096 (u32 BE) || idlen = 65 (u8) || keyid = server public key (65)
//! || AES-128-GCM(plaintext || 0x02) || tag (16)
//! ```

// Rust guideline compliant 2026-02

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Nonce,
};
use hkdf::Hkdf;
use p256::elliptic_curve::rand_core::OsRng;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::constants::{
    AUTH_SECRET_LEN, HEADER_LEN, LAST_RECORD_DELIMITER, MAX_BODY_LEN, MAX_PLAINTEXT_LEN,
    P256_POINT_LEN, RECORD_SIZE, SALT_LEN, TAG_LEN,
};
use crate::error::{PushError, Result};
use crate::notifications::push::{
    decode_auth_secret, decode_subscriber_key, parse_subscriber_key, Subscription,
};

const KEY_INFO_PREFIX: &[u8] = b"WebPush: info\0";
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";

/// Encrypt `payload` for a stored subscription.
///
/// Decodes the subscription's base64url keys; malformed keys yield
/// [`PushError::Encryption`].
pub fn encrypt_for(subscription: &Subscription, payload: &[u8]) -> Result<Vec<u8>> {
    let ua_public = decode_subscriber_key(&subscription.p256dh).map_err(PushError::Encryption)?;
    let auth = decode_auth_secret(&subscription.auth).map_err(PushError::Encryption)?;
    encrypt_with_fresh_keys(payload, &ua_public, &auth)
}

/// Encrypt `payload` for a subscriber given raw key material.
///
/// `ua_public` must be the 65-byte uncompressed point, `auth_secret` exactly
/// 16 bytes.
pub fn encrypt(payload: &[u8], ua_public: &[u8], auth_secret: &[u8]) -> Result<Vec<u8>> {
    let ua_public = parse_subscriber_key(ua_public).map_err(PushError::Encryption)?;
    let auth: [u8; AUTH_SECRET_LEN] = auth_secret.try_into().map_err(|_| {
        PushError::Encryption(format!(
            "auth secret must be {AUTH_SECRET_LEN} bytes, got {}",
            auth_secret.len()
        ))
    })?;
    encrypt_with_fresh_keys(payload, &ua_public, &auth)
}

fn encrypt_with_fresh_keys(
    payload: &[u8],
    ua_public: &PublicKey,
    auth: &[u8; AUTH_SECRET_LEN],
) -> Result<Vec<u8>> {
    let local = SecretKey::random(&mut OsRng);
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    encrypt_with(payload, ua_public, auth, &local, &salt)
}

/// Deterministic core: all randomness is supplied by the caller.
fn encrypt_with(
    payload: &[u8],
    ua_public: &PublicKey,
    auth: &[u8; AUTH_SECRET_LEN],
    local: &SecretKey,
    salt: &[u8; SALT_LEN],
) -> Result<Vec<u8>> {
    if payload.len() > MAX_PLAINTEXT_LEN {
        return Err(PushError::Encryption(format!(
            "payload of {} bytes exceeds the {MAX_PLAINTEXT_LEN}-byte limit",
            payload.len()
        )));
    }

    let ua_point = ua_public.to_encoded_point(false);
    let local_point = local.public_key().to_encoded_point(false);

    // ECDH: x-coordinate of local_private * ua_public
    let shared = p256::ecdh::diffie_hellman(local.to_nonzero_scalar(), ua_public.as_affine());

    let mut key_info = Vec::with_capacity(KEY_INFO_PREFIX.len() + 2 * P256_POINT_LEN);
    key_info.extend_from_slice(KEY_INFO_PREFIX);
    key_info.extend_from_slice(ua_point.as_bytes());
    key_info.extend_from_slice(local_point.as_bytes());

    let mut ikm = Zeroizing::new([0u8; 32]);
    Hkdf::<Sha256>::new(Some(&auth[..]), shared.raw_secret_bytes().as_slice())
        .expand(&key_info, &mut ikm[..])
        .map_err(|e| PushError::Encryption(format!("HKDF expand (ikm) failed: {e}")))?;

    let hk = Hkdf::<Sha256>::new(Some(&salt[..]), &ikm[..]);
    let mut cek = Zeroizing::new([0u8; 16]);
    hk.expand(CEK_INFO, &mut cek[..])
        .map_err(|e| PushError::Encryption(format!("HKDF expand (cek) failed: {e}")))?;
    let mut nonce = [0u8; 12];
    hk.expand(NONCE_INFO, &mut nonce)
        .map_err(|e| PushError::Encryption(format!("HKDF expand (nonce) failed: {e}")))?;

    let mut record = Zeroizing::new(Vec::with_capacity(payload.len() + 1));
    record.extend_from_slice(payload);
    record.push(LAST_RECORD_DELIMITER);

    let cipher = Aes128Gcm::new_from_slice(&cek[..])
        .map_err(|e| PushError::Encryption(format!("invalid content encryption key: {e}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), record.as_slice())
        .map_err(|e| PushError::Encryption(format!("AES-GCM encryption failed: {e}")))?;

    let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    out.extend_from_slice(salt);
    out.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    out.push(P256_POINT_LEN as u8);
    out.extend_from_slice(local_point.as_bytes());
    out.extend_from_slice(&ciphertext);
    debug_assert_eq!(out.len(), HEADER_LEN + payload.len() + 1 + TAG_LEN);
    debug_assert!(out.len() <= MAX_BODY_LEN);
    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};

    /// Reference RFC 8291 decryptor (user agent side).
    pub(crate) fn decrypt(ua_secret: &SecretKey, auth: &[u8], body: &[u8]) -> Vec<u8> {
        assert!(body.len() >= HEADER_LEN + TAG_LEN, "body shorter than header + tag");
        let salt = &body[..SALT_LEN];
        let rs = u32::from_be_bytes(body[16..20].try_into().expect("rs"));
        assert_eq!(rs, RECORD_SIZE);
        let idlen = body[20] as usize;
        assert_eq!(idlen, P256_POINT_LEN);
        let as_public =
            PublicKey::from_sec1_bytes(&body[21..21 + idlen]).expect("keyid is a point");
        let ciphertext = &body[21 + idlen..];

        let shared =
            p256::ecdh::diffie_hellman(ua_secret.to_nonzero_scalar(), as_public.as_affine());
        let mut key_info = KEY_INFO_PREFIX.to_vec();
        key_info.extend_from_slice(ua_secret.public_key().to_encoded_point(false).as_bytes());
        key_info.extend_from_slice(&body[21..21 + idlen]);
        let mut ikm = [0u8; 32];
        Hkdf::<Sha256>::new(Some(auth), shared.raw_secret_bytes().as_slice())
            .expand(&key_info, &mut ikm)
            .expect("ikm");

        let hk = Hkdf::<Sha256>::new(Some(salt), &ikm);
        let mut cek = [0u8; 16];
        hk.expand(CEK_INFO, &mut cek).expect("cek");
        let mut nonce = [0u8; 12];
        hk.expand(NONCE_INFO, &mut nonce).expect("nonce");

        let mut plain = Aes128Gcm::new_from_slice(&cek)
            .expect("key")
            .decrypt(Nonce::from_slice(&nonce), ciphertext)
            .expect("authentic ciphertext");
        while plain.last() == Some(&0) {
            plain.pop();
        }
        assert_eq!(plain.pop(), Some(LAST_RECORD_DELIMITER), "last record delimiter");
        plain
    }

    fn b64(s: &str) -> Vec<u8> {
        BASE64URL.decode(s).expect("test vector is base64url")
    }

    fn subscriber() -> (SecretKey, Vec<u8>, [u8; 16]) {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key().to_encoded_point(false).as_bytes().to_vec();
        let mut auth = [0u8; 16];
        rand::rng().fill_bytes(&mut auth);
        (secret, public, auth)
    }

    #[test]
    fn test_rfc8291_appendix_a_vector() {
        let plaintext = b64("V2hlbiBJIGdyb3cgdXAsIEkgd2FudCB0byBiZSBhIHdhdGVybWVsb24");
        let as_private = b64("yfWPiYE-n46HLnH0KqZOF1fJJU3MYrct3AELtAQ-oRw");
        let ua_public = b64(
            "BCVxsr7N_eNgVRqvHtD0zTZsEc6-VV-JvLexhqUzORcxaOzi6-AYWXvTBHm4bjyPjs7Vd8pZGH6SRpkNtoIAiw4",
        );
        let auth: [u8; 16] = b64("BTBZMqHH6r4Tts7J_aSIgg").try_into().expect("16 bytes");
        let salt: [u8; 16] = b64("DGv6ra1nlYgDCS1FRnbzlw").try_into().expect("16 bytes");

        let local = SecretKey::from_slice(&as_private).expect("as_private");
        let ua = PublicKey::from_sec1_bytes(&ua_public).expect("ua_public");
        let out = encrypt_with(&plaintext, &ua, &auth, &local, &salt).expect("encrypt");

        assert_eq!(
            BASE64URL.encode(out),
            "DGv6ra1nlYgDCS1FRnbzlwAAEABBBP4z9KsN6nGRTbVYI_c7VJSPQTBtkgcy27mlmlMoZIIgDll6e3vCYLocInmYWAmS6TlzAC8wEqKK6PBru3jl7A_yl95bQpu6cVPTpK4Mqgkf1CXztLVBSt2Ks3oZwbuwXPXLWyouBWLVWGNWQexSgSxsj_Qulcy4a-fN"
        );
    }

    #[test]
    fn test_roundtrip_various_sizes() {
        let (secret, public, auth) = subscriber();
        for size in [0usize, 1, 41, 1000, MAX_PLAINTEXT_LEN] {
            let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let body = encrypt(&payload, &public, &auth).expect("encrypt");
            assert_eq!(body.len(), HEADER_LEN + size + 1 + TAG_LEN);
            assert!(body.len() <= MAX_BODY_LEN, "size {size} gives a {}-byte body", body.len());
            assert_eq!(decrypt(&secret, &auth, &body), payload, "size {size}");
        }
    }

    #[test]
    fn test_header_layout() {
        let (_, public, auth) = subscriber();
        let body = encrypt(b"{}", &public, &auth).expect("encrypt");
        assert_eq!(&body[16..20], &[0x00, 0x00, 0x10, 0x00]);
        assert_eq!(body[20], 0x41);
        assert_eq!(body[21], 0x04);
        assert_ne!(
            &body[21..86],
            public.as_slice(),
            "keyid is the server key, not the subscriber's"
        );
    }

    #[test]
    fn test_fresh_salt_and_key_per_message() {
        let (_, public, auth) = subscriber();
        let a = encrypt(b"same payload", &public, &auth).expect("encrypt");
        let b = encrypt(b"same payload", &public, &auth).expect("encrypt");

        assert_ne!(&a[..SALT_LEN], &b[..SALT_LEN], "salt reused");
        assert_ne!(&a[21..86], &b[21..86], "ephemeral key reused");
        assert_ne!(&a[HEADER_LEN..], &b[HEADER_LEN..], "ciphertext repeated");
    }

    #[test]
    fn test_malformed_keys_rejected() {
        let (_, public, auth) = subscriber();

        let err = encrypt(b"x", &public[..64], &auth).expect_err("64-byte key");
        assert!(matches!(err, PushError::Encryption(_)));

        let mut compressed_tag = public.clone();
        compressed_tag[0] = 0x02;
        assert!(encrypt(b"x", &compressed_tag, &auth).is_err());

        assert!(encrypt(b"x", &public, &auth[..15]).is_err());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let (_, public, auth) = subscriber();
        assert_eq!(MAX_PLAINTEXT_LEN, 3993);
        let largest =
            encrypt(&vec![b'a'; MAX_PLAINTEXT_LEN], &public, &auth).expect("largest payload fits");
        assert_eq!(largest.len(), MAX_BODY_LEN);

        let payload = vec![b'a'; MAX_PLAINTEXT_LEN + 1];
        assert!(matches!(
            encrypt(&payload, &public, &auth),
            Err(PushError::Encryption(_))
        ));
    }

    #[test]
    fn test_encrypt_for_subscription_decodes_keys() {
        let (secret, public, auth) = subscriber();
        let sub = Subscription {
            id: uuid::Uuid::new_v4(),
            member_id: 1,
            endpoint: "https://push.example/abc".into(),
            p256dh: BASE64URL.encode(&public),
            auth: BASE64URL.encode(auth),
            user_agent: None,
            created_at: chrono::Utc::now(),
        };
        let body = encrypt_for(&sub, b"hello").expect("encrypt");
        assert_eq!(decrypt(&secret, &auth, &body), b"hello");

        let broken = Subscription {
            auth: "short".into(),
            ..sub
        };
        assert!(matches!(encrypt_for(&broken, b"hello"), Err(PushError::Encryption(_))));
    }
}
