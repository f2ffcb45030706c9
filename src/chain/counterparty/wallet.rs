//! Hierarchical-deterministic wallets for the Bitcoin-based backend.
//!
//! A wallet is a 12-word mnemonic passphrase. The 128-bit entropy behind the
//! words seeds a BIP-32 master key; addresses are derived along
//! `m/0'/0/i` (hardened account 0, external chain 0, sequential indices).
//! Client passphrases are accepted without a wordlist checksum so wallets
//! issued by earlier generations of the gateway keep working.

use bip39::{Language, Mnemonic};
use bitcoin::bip32::{ChildNumber, Xpriv};
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::{Address, Network, PublicKey};
use serde::{Deserialize, Serialize};

/// How many addresses are searched when matching a passphrase to an address.
pub const ADDRESS_SEARCH_DEPTH: u32 = 20;

/// Default number of addresses generated for a new wallet.
const DEFAULT_WALLET_ADDRESSES: usize = 20;
const MAX_WALLET_ADDRESSES: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("invalid passphrase: {0}")]
    InvalidPassphrase(#[from] bip39::Error),
    #[error("key derivation failed: {0}")]
    Derivation(#[from] bitcoin::bip32::Error),
    #[error("private and public keys not found for address {0}")]
    AddressNotFound(String),
}

/// A freshly generated wallet. The passphrase is the only durable secret;
/// it is returned to the caller once and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HdWallet {
    pub passphrase: String,
    pub hex_seed: String,
    pub addresses: Vec<String>,
}

/// A key pair derived for one address of a wallet.
#[derive(Debug, Clone)]
pub struct DerivedKey {
    pub address: String,
    /// Compressed public key, hex encoded.
    pub public_key: String,
    pub secret_key: SecretKey,
}

fn mnemonic_from_passphrase(passphrase: &str) -> Result<Mnemonic, WalletError> {
    let normalized = passphrase.trim().to_lowercase();
    Ok(Mnemonic::parse_in_normalized_without_checksum_check(
        Language::English,
        &normalized,
    )?)
}

fn derive_at(passphrase: &str, index: u32) -> Result<DerivedKey, WalletError> {
    let mnemonic = mnemonic_from_passphrase(passphrase)?;
    let entropy = mnemonic.to_entropy();
    derive_from_entropy(&entropy, index)
}

fn derive_from_entropy(entropy: &[u8], index: u32) -> Result<DerivedKey, WalletError> {
    let secp = Secp256k1::new();
    let master = Xpriv::new_master(Network::Bitcoin, entropy)?;
    let path = [
        ChildNumber::from_hardened_idx(0)?,
        ChildNumber::from_normal_idx(0)?,
        ChildNumber::from_normal_idx(index)?,
    ];
    let child = master.derive_priv(&secp, &path)?;
    let secret_key = child.private_key;
    let public_key = PublicKey::new(secret_key.public_key(&secp));
    let address = Address::p2pkh(&public_key, Network::Bitcoin);
    Ok(DerivedKey {
        address: address.to_string(),
        public_key: public_key.to_string(),
        secret_key,
    })
}

/// Generates a new wallet with `count` addresses (defaulted and capped like
/// the public API documents: 20 by default, at most 100).
pub fn create_wallet(count: usize) -> Result<HdWallet, WalletError> {
    let count = match count {
        0 => DEFAULT_WALLET_ADDRESSES,
        n if n > MAX_WALLET_ADDRESSES => MAX_WALLET_ADDRESSES,
        n => n,
    };

    let mnemonic = Mnemonic::generate_in(Language::English, 12)?;
    let entropy = mnemonic.to_entropy();

    let mut addresses = Vec::with_capacity(count);
    for index in 0..count as u32 {
        addresses.push(derive_from_entropy(&entropy, index)?.address);
    }

    Ok(HdWallet {
        passphrase: mnemonic.words().collect::<Vec<_>>().join(" "),
        hex_seed: hex::encode(entropy),
        addresses,
    })
}

/// Finds the key pair whose derived address equals `address`, searching the
/// first [`ADDRESS_SEARCH_DEPTH`] indices of the wallet.
pub fn get_key_for_address(passphrase: &str, address: &str) -> Result<DerivedKey, WalletError> {
    for index in 0..ADDRESS_SEARCH_DEPTH {
        let derived = derive_at(passphrase, index)?;
        if derived.address == address {
            return Ok(derived);
        }
    }
    Err(WalletError::AddressNotFound(address.to_string()))
}

/// The compressed public key (hex) for `address` under `passphrase`.
pub fn get_public_key(passphrase: &str, address: &str) -> Result<String, WalletError> {
    Ok(get_key_for_address(passphrase, address)?.public_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSPHRASE: &str =
        "attention stranger fate plain huge poetry view precious drug world try age";

    #[test]
    fn derivation_is_deterministic_across_runs() {
        let first = derive_at(PASSPHRASE, 0).unwrap();
        let second = derive_at(PASSPHRASE, 0).unwrap();
        assert_eq!(first.address, second.address);
        assert_eq!(first.public_key, second.public_key);
    }

    #[test]
    fn distinct_indices_yield_distinct_addresses() {
        let a = derive_at(PASSPHRASE, 0).unwrap();
        let b = derive_at(PASSPHRASE, 1).unwrap();
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn derived_addresses_are_mainnet_p2pkh() {
        let key = derive_at(PASSPHRASE, 0).unwrap();
        assert!(key.address.starts_with('1'));
        assert_eq!(key.public_key.len(), 66);
        assert!(key.public_key.starts_with("02") || key.public_key.starts_with("03"));
    }

    #[test]
    fn generated_wallets_reproduce_from_their_passphrase() {
        let wallet = create_wallet(3).unwrap();
        assert_eq!(wallet.addresses.len(), 3);
        let rederived = derive_at(&wallet.passphrase, 0).unwrap();
        assert_eq!(rederived.address, wallet.addresses[0]);
    }

    #[test]
    fn wallet_size_is_defaulted_and_capped() {
        assert_eq!(create_wallet(0).unwrap().addresses.len(), 20);
        assert_eq!(create_wallet(500).unwrap().addresses.len(), 100);
    }

    #[test]
    fn key_lookup_finds_addresses_within_search_depth() {
        let wallet = create_wallet(5).unwrap();
        let target = &wallet.addresses[4];
        let key = get_key_for_address(&wallet.passphrase, target).unwrap();
        assert_eq!(&key.address, target);
    }

    #[test]
    fn key_lookup_rejects_foreign_addresses() {
        let result = get_key_for_address(PASSPHRASE, "1CounterpartyXXXXXXXXXXXXXXXUWLpVr");
        assert!(matches!(result, Err(WalletError::AddressNotFound(_))));
    }
}
