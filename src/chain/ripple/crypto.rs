//! Offline key material handling for the consensus-ledger backend.
//!
//! The ledger's secrets are "family seeds": 16 bytes of entropy wrapped in a
//! version byte and a double-SHA-256 checksum, base58 encoded with the
//! ledger's own alphabet. Client passphrases are the same 12-word mnemonics
//! used by the Bitcoin-family wallets; the mnemonic entropy is the family
//! seed, so one passphrase controls a wallet on either backend.

use bip39::{Language, Mnemonic};
use sha2::{Digest, Sha256};

/// Version byte prefixed to a family seed before encoding.
const FAMILY_SEED_VERSION: u8 = 33;
const SEED_LEN: usize = 16;
const CHECKSUM_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum RippleCryptoError {
    #[error("invalid passphrase: {0}")]
    InvalidPassphrase(#[from] bip39::Error),
    #[error("secret does not decode: {0}")]
    InvalidSecret(String),
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// Encodes 16 seed bytes as a family seed secret (`s...`).
pub fn to_secret(seed: &[u8]) -> Result<String, RippleCryptoError> {
    if seed.len() != SEED_LEN {
        return Err(RippleCryptoError::InvalidSecret(format!(
            "seed must be {SEED_LEN} bytes, got {}",
            seed.len()
        )));
    }
    let mut payload = Vec::with_capacity(1 + SEED_LEN + CHECKSUM_LEN);
    payload.push(FAMILY_SEED_VERSION);
    payload.extend_from_slice(seed);
    let checksum = double_sha256(&payload);
    payload.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    Ok(bs58::encode(payload)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .into_string())
}

/// Decodes a family seed secret back to its hex seed.
pub fn to_hex_seed(secret: &str) -> Result<String, RippleCryptoError> {
    let decoded = bs58::decode(secret)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .into_vec()
        .map_err(|e| RippleCryptoError::InvalidSecret(e.to_string()))?;
    if decoded.len() != 1 + SEED_LEN + CHECKSUM_LEN {
        return Err(RippleCryptoError::InvalidSecret(
            "unexpected secret length".to_string(),
        ));
    }
    if decoded[0] != FAMILY_SEED_VERSION {
        return Err(RippleCryptoError::InvalidSecret(
            "unexpected version byte".to_string(),
        ));
    }
    let (payload, checksum) = decoded.split_at(1 + SEED_LEN);
    if &double_sha256(payload)[..CHECKSUM_LEN] != checksum {
        return Err(RippleCryptoError::InvalidSecret(
            "checksum mismatch".to_string(),
        ));
    }
    Ok(hex::encode(&payload[1..]))
}

/// Derives the family seed secret controlled by a 12-word passphrase.
pub fn passphrase_to_secret(passphrase: &str) -> Result<String, RippleCryptoError> {
    let normalized = passphrase.trim().to_lowercase();
    let mnemonic =
        Mnemonic::parse_in_normalized_without_checksum_check(Language::English, &normalized)?;
    to_secret(&mnemonic.to_entropy())
}

/// Renders a node-generated hex seed as the equivalent 12-word passphrase,
/// so one passphrase controls the wallet on either backend family.
pub fn mnemonic_from_hex_seed(hex_seed: &str) -> Result<String, RippleCryptoError> {
    let seed = hex::decode(hex_seed)
        .map_err(|e| RippleCryptoError::InvalidSecret(e.to_string()))?;
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &seed)?;
    Ok(mnemonic.words().collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_seed_encodes_to_known_secret() {
        // The ledger's canonical "masterpassphrase" seed/secret pair.
        let seed = hex::decode("DEDCE9CE67B451D852FD4E846FCDE31C").unwrap();
        let secret = to_secret(&seed).unwrap();
        assert_eq!(secret, "snoPBrXtMeMyMHUVTgbuqAfg1SUTb");
    }

    #[test]
    fn secrets_round_trip_through_hex() {
        let seed = hex::decode("00112233445566778899aabbccddeeff").unwrap();
        let secret = to_secret(&seed).unwrap();
        assert!(secret.starts_with('s'));
        assert_eq!(to_hex_seed(&secret).unwrap(), "00112233445566778899aabbccddeeff");
    }

    #[test]
    fn corrupted_secrets_are_rejected() {
        let seed = [7u8; 16];
        let secret = to_secret(&seed).unwrap();
        let mut corrupted = secret.into_bytes();
        let last = corrupted.len() - 1;
        corrupted[last] = if corrupted[last] == b'r' { b'p' } else { b'r' };
        let corrupted = String::from_utf8(corrupted).unwrap();
        assert!(to_hex_seed(&corrupted).is_err());
    }

    #[test]
    fn passphrase_secrets_are_deterministic() {
        let phrase = "attention stranger fate plain huge poetry view precious drug world try age";
        let a = passphrase_to_secret(phrase).unwrap();
        let b = passphrase_to_secret(phrase).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with('s'));
    }

    #[test]
    fn hex_seed_and_mnemonic_are_inverse() {
        let words = mnemonic_from_hex_seed("DEDCE9CE67B451D852FD4E846FCDE31C").unwrap();
        assert_eq!(words.split(' ').count(), 12);
        let secret_from_words = passphrase_to_secret(&words).unwrap();
        let seed = hex::decode("DEDCE9CE67B451D852FD4E846FCDE31C").unwrap();
        assert_eq!(secret_from_words, to_secret(&seed).unwrap());
    }
}
