//! WebSub content distribution signature verification.
//!
//! When a subscription is created with `hub.secret`, the hub signs every
//! delivery with `X-Hub-Signature: method=signature`.
//! Reference: https://www.w3.org/TR/websub/#signing-content

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

/// Verify an `X-Hub-Signature` header against the raw delivery body.
///
/// Only `sha256` is accepted; any other method counts as a mismatch.
///
/// # Arguments
///
/// * `secret` - The `hub.secret` registered with the subscription
/// * `body` - The raw request body, exactly as received
/// * `header` - The header value, e.g. `sha256=5d41...`
///
/// # Returns
///
/// `true` if the signature matches, `false` otherwise.
pub fn verify_hub_signature(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let header = match header {
        Some(h) if !h.trim().is_empty() => h.trim(),
        _ => {
            warn!("hub_signature_missing");
            return false;
        }
    };

    let (method, signature) = match header.split_once('=') {
        Some(parts) => parts,
        None => {
            warn!(header_length = header.len(), "hub_signature_malformed");
            return false;
        }
    };

    if !method.eq_ignore_ascii_case("sha256") {
        warn!(method = %method, "hub_signature_unsupported_method");
        return false;
    }

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("hub_signature_invalid_key");
            return false;
        }
    };

    mac.update(body);

    let expected_signature = hex::encode(mac.finalize().into_bytes());

    let valid = constant_time_compare(&expected_signature, &signature.to_ascii_lowercase());

    if !valid {
        warn!(
            expected_length = expected_signature.len(),
            actual_length = signature.len(),
            "hub_signature_mismatch"
        );
    }

    valid
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Check if signature verification is enabled.
pub fn is_signature_verification_enabled(secret: &Option<String>) -> bool {
    secret
        .as_ref()
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_signature_valid() {
        let body = b"<feed><entry/></feed>";
        let header = sign("topic-secret", body);
        assert!(verify_hub_signature("topic-secret", body, Some(&header)));
    }

    #[test]
    fn test_verify_signature_uppercase_hex() {
        let body = b"<feed/>";
        let header = sign("topic-secret", body).to_uppercase();
        assert!(verify_hub_signature("topic-secret", body, Some(&header)));
    }

    #[test]
    fn test_verify_signature_wrong_secret() {
        let body = b"<feed/>";
        let header = sign("other-secret", body);
        assert!(!verify_hub_signature("topic-secret", body, Some(&header)));
    }

    #[test]
    fn test_verify_signature_tampered_body() {
        let header = sign("topic-secret", b"<feed/>");
        assert!(!verify_hub_signature("topic-secret", b"<feed></feed>", Some(&header)));
    }

    #[test]
    fn test_verify_signature_missing_or_malformed() {
        assert!(!verify_hub_signature("topic-secret", b"<feed/>", None));
        assert!(!verify_hub_signature("topic-secret", b"<feed/>", Some("")));
        assert!(!verify_hub_signature("topic-secret", b"<feed/>", Some("deadbeef")));
    }

    #[test]
    fn test_verify_signature_unsupported_method() {
        assert!(!verify_hub_signature(
            "topic-secret",
            b"<feed/>",
            Some("sha1=2fd4e1c67a2d28fced849ee1bb76e7391b93eb12")
        ));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_is_signature_verification_enabled() {
        assert!(!is_signature_verification_enabled(&None));
        assert!(!is_signature_verification_enabled(&Some("".to_string())));
        assert!(!is_signature_verification_enabled(&Some("   ".to_string())));
        assert!(is_signature_verification_enabled(&Some(
            "secret123".to_string()
        )));
    }
}
