//! Opaque identifiers and request authentication primitives.
//!
//! All correlation identifiers handed to clients (request, payment, asset,
//! dividend, activation) are 128-bit random values rendered as 32 lowercase
//! hex characters. Access keys and secrets are 256-bit values rendered as 64
//! hex characters. Request signatures are HMAC-SHA-512 over the exact body
//! bytes, rendered as 128 hex characters.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha512;
use std::fmt::{Display, Formatter};
use subtle::ConstantTimeEq;

type HmacSha512 = Hmac<Sha512>;

/// A 128-bit random identifier used to correlate a single HTTP request
/// through logs and telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        RequestId(random_hex(16))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Generates a 64 character random string usable as an access key or secret.
pub fn generate_key() -> String {
    random_hex(32)
}

pub fn generate_payment_id() -> String {
    random_hex(16)
}

pub fn generate_asset_id() -> String {
    random_hex(16)
}

pub fn generate_dividend_id() -> String {
    random_hex(16)
}

pub fn generate_activation_id() -> String {
    random_hex(16)
}

/// Computes HMAC-SHA-512 over `message` keyed by `secret`, hex encoded.
pub fn compute_hmac512(message: &[u8], secret: &str) -> String {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a client-supplied hex signature against the HMAC of the body.
///
/// The comparison runs in constant time over the decoded digest so the
/// signature check does not leak a matching prefix length.
pub fn verify_hmac512(message: &[u8], secret: &str, signature_hex: &str) -> bool {
    let Ok(supplied) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(message);
    let expected = mac.finalize().into_bytes();
    expected.as_slice().ct_eq(supplied.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_32_hex_chars_and_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn keys_are_64_hex_chars() {
        let key = generate_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hmac_matches_known_vector() {
        // RFC 4231 test case 2 (key "Jefe", data "what do ya want for nothing?").
        let digest = compute_hmac512(b"what do ya want for nothing?", "Jefe");
        assert_eq!(
            digest,
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
             9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn verify_accepts_the_computed_signature() {
        let body = br#"{"nonce":42}"#;
        let sig = compute_hmac512(body, "topsecret");
        assert!(verify_hmac512(body, "topsecret", &sig));
    }

    #[test]
    fn verify_rejects_a_single_flipped_nibble() {
        let body = br#"{"nonce":42}"#;
        let mut sig = compute_hmac512(body, "topsecret").into_bytes();
        sig[17] = if sig[17] == b'0' { b'1' } else { b'0' };
        let tampered = String::from_utf8(sig).unwrap();
        assert!(!verify_hmac512(body, "topsecret", &tampered));
    }

    #[test]
    fn verify_rejects_non_hex_signatures() {
        assert!(!verify_hmac512(b"{}", "s", "zz-not-hex"));
    }
}
