//! Protocol and runtime constants for the push engine.
//!
//! Centralizes the magic numbers of RFC 8188/8291/8292 and the delivery
//! defaults so they are documented in one place.
//!
//! # Categories
//!
//! - **Encryption**: aes128gcm content-coding layout
//! - **VAPID**: JWT lifetime limits
//! - **Delivery**: timeouts, TTL and fan-out width

// Rust guideline compliant 2026-02

use std::time::Duration;

// ============================================================================
// Encryption (RFC 8188 / RFC 8291)
// ============================================================================

/// Declared record size of the single aes128gcm record.
pub const RECORD_SIZE: u32 = 4096;

/// Salt length in the aes128gcm header.
pub const SALT_LEN: usize = 16;

/// Uncompressed SEC1 P-256 point length (`0x04 || x || y`).
pub const P256_POINT_LEN: usize = 65;

/// Subscriber auth secret length.
pub const AUTH_SECRET_LEN: usize = 16;

/// AES-GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// Padding delimiter for the last (and only) record.
pub const LAST_RECORD_DELIMITER: u8 = 0x02;

/// Fixed header length: salt, record size, keyid length, keyid.
pub const HEADER_LEN: usize = SALT_LEN + 4 + 1 + P256_POINT_LEN;

/// Largest encrypted body a push service must accept (RFC 8291 §4).
pub const MAX_BODY_LEN: usize = 4096;

/// Largest plaintext whose encrypted body, header included, fits in
/// [`MAX_BODY_LEN`]: 4096 - 86 - 16 - 1 = 3993.
pub const MAX_PLAINTEXT_LEN: usize = MAX_BODY_LEN - HEADER_LEN - TAG_LEN - 1;

// ============================================================================
// VAPID (RFC 8292)
// ============================================================================

/// Upper bound on the JWT `exp` claim, relative to now.
///
/// Push services reject assertions valid for more than 24 hours.
pub const VAPID_MAX_EXPIRY_SECS: u64 = 24 * 60 * 60;

/// Lower bound on the JWT lifetime.
///
/// A message `TTL` of 0 is valid, but the assertion must outlive the request.
pub const VAPID_MIN_EXPIRY_SECS: u64 = 60 * 60;

// ============================================================================
// Delivery
// ============================================================================

/// Default `TTL` header and VAPID lifetime.
pub const DEFAULT_TTL_SECS: u32 = 86_400;

/// Per-request timeout when talking to a push service.
///
/// One unreachable push service must not stall the rest of a fan-out.
pub const PUSH_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of deliveries in flight per fan-out.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Maximum length of a `Topic` header value (RFC 8030 §5.4).
pub const MAX_TOPIC_LEN: usize = 32;
