//! HMAC-SHA256 signatures on inbound webhooks.
//!
//! Two header formats are accepted:
//! - payment processor: `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>]`, signed
//!   over `"<t>.<body>"`
//! - generation provider: `X-Signature: sha256=<hex>`, signed over the raw body
//!
//! Comparisons go through `Mac::verify_slice`, which is constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Reject processor events signed more than this long ago (or ahead).
pub const PAYMENT_TOLERANCE_SECS: i64 = 300;

fn mac(secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid")
}

/// `sha256=<hex>` over `payload`.
pub fn sign_body(secret: &str, payload: &[u8]) -> String {
    let mut mac = mac(secret);
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify an `X-Signature: sha256=<hex>` header.
pub fn verify_body(secret: &str, payload: &[u8], header: &str) -> bool {
    let Some(expected) = header.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(expected) else {
        return false;
    };
    let mut mac = mac(secret);
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Build a processor-style header. Used to sign test fixtures.
pub fn sign_payment(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = mac(secret);
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify a processor signature header against `now` (unix seconds).
pub fn verify_payment(secret: &str, payload: &[u8], header: &str, now: i64) -> bool {
    let mut timestamp: Option<i64> = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = t.parse().ok(),
            Some(("v1", sig)) => candidates.push(sig),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    if now.abs_diff(timestamp) > PAYMENT_TOLERANCE_SECS as u64 {
        return false;
    }

    candidates.into_iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let mut mac = mac(secret);
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn body_signature_round_trip() {
        let body = br#"{"id":"gen_1","status":"succeeded"}"#;
        let header = sign_body(SECRET, body);
        assert!(header.starts_with("sha256="));
        assert!(verify_body(SECRET, body, &header));
        assert!(!verify_body("other", body, &header));
        assert!(!verify_body(SECRET, b"tampered", &header));
    }

    #[test]
    fn malformed_body_signatures_fail() {
        assert!(!verify_body(SECRET, b"x", "md5=abc"));
        assert!(!verify_body(SECRET, b"x", "sha256=zz"));
        assert!(!verify_body(SECRET, b"x", ""));
    }

    #[test]
    fn payment_signature_within_tolerance() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign_payment(SECRET, 1_700_000_000, body);
        assert!(verify_payment(SECRET, body, &header, 1_700_000_100));
        assert!(!verify_payment(SECRET, body, &header, 1_700_000_000 + 301));
        assert!(!verify_payment(SECRET, b"{}", &header, 1_700_000_000));
    }

    #[test]
    fn any_v1_candidate_may_match() {
        let body = b"payload";
        let good = sign_payment(SECRET, 100, body);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t=100,v1=deadbeef,v1={good_sig}");
        assert!(verify_payment(SECRET, body, &header, 100));
    }

    #[test]
    fn payment_header_without_timestamp_fails() {
        assert!(!verify_payment(SECRET, b"x", "v1=abcd", 0));
    }

    #[test]
    fn extreme_timestamps_are_rejected() {
        let now = 1_700_000_000;
        assert!(!verify_payment(SECRET, b"{}", "t=-9223372036854775808,v1=00", now));
        assert!(!verify_payment(SECRET, b"{}", "t=9223372036854775807,v1=00", now));
        assert!(!verify_payment(SECRET, b"{}", "t=0,v1=00", i64::MIN));
    }
}
