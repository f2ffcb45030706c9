//! Local signing of composed Bitcoin-family transactions.
//!
//! The composition node returns unsigned transactions with each input's
//! script field pre-filled with the previous output's pubkey script. Signing
//! therefore never needs the node again: the script names the address, the
//! address names the wallet index, and every input is signed SIGHASH_ALL
//! with the matching derived key. Only pubkeyhash scripts are supported.

use bitcoin::hashes::Hash;
use bitcoin::script::PushBytesBuf;
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::sighash::SighashCache;
use bitcoin::{Address, EcdsaSighashType, Network, PubkeyHash, ScriptBuf, Transaction};
use std::collections::HashMap;

use super::wallet::{self, DerivedKey, WalletError};

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("transaction hex is invalid: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("transaction does not deserialize: {0}")]
    InvalidTransaction(#[from] bitcoin::consensus::encode::Error),
    #[error("only pubkeyhash script signing is supported, input {input} carries {kind}")]
    UnsupportedScript { input: usize, kind: String },
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("sighash computation failed: {0}")]
    Sighash(String),
}

/// Signs every input of `raw_tx_hex` with keys derived from `passphrase`
/// and returns the fully signed transaction, hex encoded.
pub fn sign_raw_transaction(passphrase: &str, raw_tx_hex: &str) -> Result<String, SignerError> {
    let tx_bytes = hex::decode(raw_tx_hex)?;
    let mut tx: Transaction = bitcoin::consensus::encode::deserialize(&tx_bytes)?;

    let secp = Secp256k1::new();
    let mut keys_by_hash: HashMap<PubkeyHash, DerivedKey> = HashMap::new();

    // First pass: resolve the signing key for every input.
    let mut input_scripts: Vec<(ScriptBuf, PubkeyHash)> = Vec::with_capacity(tx.input.len());
    for (index, input) in tx.input.iter().enumerate() {
        let script = input.script_sig.clone();
        if !script.is_p2pkh() {
            return Err(SignerError::UnsupportedScript {
                input: index,
                kind: format!("{:?}", script),
            });
        }
        // A p2pkh script is OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG.
        let hash = PubkeyHash::from_slice(&script.as_bytes()[3..23])
            .map_err(|e| SignerError::Sighash(e.to_string()))?;
        if !keys_by_hash.contains_key(&hash) {
            let address = Address::p2pkh(hash, Network::Bitcoin);
            let key = wallet::get_key_for_address(passphrase, &address.to_string())?;
            keys_by_hash.insert(hash, key);
        }
        input_scripts.push((script, hash));
    }

    // Second pass: compute each input's signature against the untouched
    // transaction, then install the final unlocking scripts.
    let mut final_scripts: Vec<ScriptBuf> = Vec::with_capacity(tx.input.len());
    {
        let cache = SighashCache::new(&tx);
        for (index, (script, hash)) in input_scripts.iter().enumerate() {
            let sighash = cache
                .legacy_signature_hash(index, script, EcdsaSighashType::All.to_u32())
                .map_err(|e| SignerError::Sighash(e.to_string()))?;
            let message = Message::from_digest(sighash.to_byte_array());

            let key = &keys_by_hash[hash];
            let signature = bitcoin::ecdsa::Signature {
                signature: secp.sign_ecdsa(&message, &key.secret_key),
                sighash_type: EcdsaSighashType::All,
            };

            let sig_push = PushBytesBuf::try_from(signature.to_vec())
                .map_err(|e| SignerError::Sighash(e.to_string()))?;
            let pubkey_bytes = hex::decode(&key.public_key)?;
            let pubkey_push = PushBytesBuf::try_from(pubkey_bytes)
                .map_err(|e| SignerError::Sighash(e.to_string()))?;

            let script_sig = bitcoin::script::Builder::new()
                .push_slice(sig_push)
                .push_slice(pubkey_push)
                .into_script();
            final_scripts.push(script_sig);
        }
    }

    for (input, script_sig) in tx.input.iter_mut().zip(final_scripts) {
        input.script_sig = script_sig;
    }

    Ok(bitcoin::consensus::encode::serialize_hex(&tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, Sequence, TxIn, TxOut, Txid, Witness};

    fn unsigned_tx_for(script_pubkey: ScriptBuf) -> Transaction {
        Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(Txid::all_zeros(), 0),
                script_sig: script_pubkey.clone(),
                sequence: Sequence::MAX,
                witness: Witness::default(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(5430),
                script_pubkey,
            }],
        }
    }

    #[test]
    fn signs_a_p2pkh_input_from_the_wallet() {
        let wallet = wallet::create_wallet(1).unwrap();
        let key = wallet::get_key_for_address(&wallet.passphrase, &wallet.addresses[0]).unwrap();
        let pubkey_bytes = hex::decode(&key.public_key).unwrap();
        let pubkey = bitcoin::PublicKey::from_slice(&pubkey_bytes).unwrap();
        let script_pubkey = ScriptBuf::new_p2pkh(&pubkey.pubkey_hash());

        let unsigned = unsigned_tx_for(script_pubkey);
        let raw = bitcoin::consensus::encode::serialize_hex(&unsigned);

        let signed_hex = sign_raw_transaction(&wallet.passphrase, &raw).unwrap();
        let signed: Transaction =
            bitcoin::consensus::encode::deserialize(&hex::decode(&signed_hex).unwrap()).unwrap();

        let script_sig = &signed.input[0].script_sig;
        assert!(!script_sig.is_p2pkh());
        // <sig> <pubkey>: last push must be the compressed public key.
        let bytes = script_sig.as_bytes();
        assert_eq!(&bytes[bytes.len() - 33..], pubkey_bytes.as_slice());
    }

    #[test]
    fn rejects_inputs_the_wallet_does_not_own() {
        let wallet_a = wallet::create_wallet(1).unwrap();
        let wallet_b = wallet::create_wallet(1).unwrap();
        let key_b = wallet::get_key_for_address(&wallet_b.passphrase, &wallet_b.addresses[0]).unwrap();
        let pubkey_b = bitcoin::PublicKey::from_slice(&hex::decode(&key_b.public_key).unwrap()).unwrap();
        let unsigned = unsigned_tx_for(ScriptBuf::new_p2pkh(&pubkey_b.pubkey_hash()));
        let raw = bitcoin::consensus::encode::serialize_hex(&unsigned);

        let result = sign_raw_transaction(&wallet_a.passphrase, &raw);
        assert!(matches!(
            result,
            Err(SignerError::Wallet(WalletError::AddressNotFound(_)))
        ));
    }

    #[test]
    fn rejects_non_p2pkh_scripts() {
        let wallet = wallet::create_wallet(1).unwrap();
        let unsigned = unsigned_tx_for(ScriptBuf::new_op_return([1u8, 2, 3]));
        let raw = bitcoin::consensus::encode::serialize_hex(&unsigned);
        let result = sign_raw_transaction(&wallet.passphrase, &raw);
        assert!(matches!(result, Err(SignerError::UnsupportedScript { .. })));
    }

    #[test]
    fn rejects_garbage_hex() {
        assert!(matches!(
            sign_raw_transaction("word ".repeat(12).trim(), "zz"),
            Err(SignerError::InvalidHex(_))
        ));
    }
}
