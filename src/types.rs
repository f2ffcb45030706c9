//! Wire and row models shared by the HTTP surface, the orchestrator and the
//! persistent store.
//!
//! Field names follow the public JSON contract (camelCase); quantities are
//! always minimal units (satoshi-style integers) on the wire.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Lifecycle state of a request row.
///
/// Mutating requests are inserted as `Valid` (or `Authorized` for recorded
/// payments with no on-chain action yet), move to `Complete` or `Error`, and
/// may re-enter `Authorized` from `Error`/`Manual` via an explicit retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Authorized,
    Valid,
    Complete,
    Error,
    Manual,
    #[serde(rename = "Not found")]
    NotFound,
}

impl RequestStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Authorized => "authorized",
            RequestStatus::Valid => "valid",
            RequestStatus::Complete => "complete",
            RequestStatus::Error => "error",
            RequestStatus::Manual => "manual",
            RequestStatus::NotFound => "Not found",
        }
    }
}

impl Display for RequestStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorized" | "Authorized" => Ok(RequestStatus::Authorized),
            "valid" => Ok(RequestStatus::Valid),
            "complete" => Ok(RequestStatus::Complete),
            "error" => Ok(RequestStatus::Error),
            "manual" => Ok(RequestStatus::Manual),
            "Not found" => Ok(RequestStatus::NotFound),
            _ => Err(()),
        }
    }
}

/// Whether a broadcast transaction has been observed in a confirmed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockchainStatus {
    Unconfirmed,
    Confirmed,
}

/// A single asset balance held at an address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Amount {
    pub asset: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    pub quantity: u64,
}

/// A single holder row in an asset ledger listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressAmount {
    pub address: String,
    pub quantity: u64,
    pub percentage_holding: f64,
}

/// Reply for `GET /asset/ledger/{asset}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBalances {
    pub asset: String,
    pub locked: bool,
    pub divisible: bool,
    pub divisibility: u64,
    pub description: String,
    #[serde(rename = "quantity")]
    pub supply: u64,
    pub balances: Vec<AddressAmount>,
    pub request_id: String,
}

/// A payment row as stored and as returned to clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(default)]
    pub blockchain_id: String,
    pub source_address: String,
    pub destination_address: String,
    pub asset: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    pub amount: u64,
    pub payment_id: String,
    pub tx_fee: i64,
    #[serde(default)]
    pub broadcast_tx_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain_status: Option<BlockchainStatus>,
    #[serde(default)]
    pub blockchain_confirmations: u64,
    #[serde(default)]
    pub payment_tag: String,
    pub status: String,
    #[serde(default)]
    pub error_code: i64,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub request_id: String,
}

/// Reply for `POST /wallet/payment`: the accepted request snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPayment {
    pub source_address: String,
    pub destination_address: String,
    pub asset: String,
    pub quantity: u64,
    pub payment_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payment_tag: String,
    pub request_id: String,
}

/// An asset issuance row as stored and as returned to clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub distribution_passphrase: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub distribution_address: String,
    pub asset_id: String,
    pub asset: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    pub description: String,
    pub quantity: u64,
    pub divisible: bool,
    pub source_address: String,
    #[serde(default)]
    pub broadcast_tx_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain_status: Option<BlockchainStatus>,
    #[serde(default)]
    pub blockchain_confirmations: u64,
    pub status: String,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub blockchain_id: String,
}

/// A dividend distribution row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dividend {
    pub source_address: String,
    pub dividend_id: String,
    pub asset: String,
    pub dividend_asset: String,
    pub quantity_per_unit: u64,
    pub status: String,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub broadcast_tx_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain_status: Option<BlockchainStatus>,
    #[serde(default)]
    pub blockchain_confirmations: u64,
    #[serde(default)]
    pub request_id: String,
}

/// One historical issuance event of an asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issuance {
    pub block_index: u64,
    pub quantity: u64,
    pub issuer: String,
    pub transfer: bool,
}

/// Reply for `GET /asset/issuances/{asset}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIssuances {
    pub asset: String,
    pub divisible: bool,
    pub divisibility: u64,
    pub description: String,
    pub locked: bool,
    pub issuances: Vec<Issuance>,
    pub request_id: String,
}

/// Reply for `GET /wallet/balances/{address}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBalances {
    pub address: String,
    pub number_of_transactions: u64,
    pub balances: Vec<Amount>,
    pub request_id: String,
    pub blockchain_id: String,
}

/// Reply for `POST /wallet`: a freshly generated wallet.
///
/// The passphrase and seed are returned exactly once and never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub passphrase: String,
    pub hex_seed: String,
    pub addresses: Vec<String>,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub blockchain_id: String,
    #[serde(default, rename = "key_type", skip_serializing_if = "String::is_empty")]
    pub key_type: String,
    #[serde(default, rename = "master_seed", skip_serializing_if = "String::is_empty")]
    pub master_seed: String,
    #[serde(
        default,
        rename = "master_seed_hex",
        skip_serializing_if = "String::is_empty"
    )]
    pub master_seed_hex: String,
    #[serde(default, rename = "public_key", skip_serializing_if = "String::is_empty")]
    pub public_key: String,
    #[serde(
        default,
        rename = "public_key_hex",
        skip_serializing_if = "String::is_empty"
    )]
    pub public_key_hex: String,
}

/// A secondary on-chain address attached to an existing access key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressReply {
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub public_key: String,
    pub request_id: String,
}

/// Reply for `POST /wallet/activate/address/{address}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
    pub address: String,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<TrustAsset>,
    pub activation_id: String,
    pub broadcast_tx_id: String,
    pub status: String,
    pub error_message: String,
    pub request_id: String,
}

/// A trust line to pre-establish during activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustAsset {
    pub currency: String,
    pub issuer: String,
}

/// An observed block row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub block_id: i64,
    pub status: String,
    pub duration: i64,
}

/// Reply for `GET /blocks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blocks {
    pub blocks: Vec<Block>,
    pub request_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            RequestStatus::Authorized,
            RequestStatus::Valid,
            RequestStatus::Complete,
            RequestStatus::Error,
            RequestStatus::Manual,
            RequestStatus::NotFound,
        ] {
            assert_eq!(status.as_str().parse::<RequestStatus>(), Ok(status));
        }
    }

    #[test]
    fn payment_serializes_camel_case_and_hides_empty_issuer() {
        let payment = Payment {
            source_address: "1abc".into(),
            destination_address: "1def".into(),
            asset: "ENUTEST".into(),
            amount: 100_000,
            payment_id: "aa".repeat(16),
            status: "valid".into(),
            ..Payment::default()
        };
        let json = serde_json::to_value(&payment).unwrap();
        assert_eq!(json["sourceAddress"], "1abc");
        assert_eq!(json["destinationAddress"], "1def");
        assert!(json.get("issuer").is_none());
        assert!(json.get("blockchainStatus").is_none());
    }

    #[test]
    fn blockchain_status_uses_lowercase_wire_form() {
        assert_eq!(
            serde_json::to_value(BlockchainStatus::Unconfirmed).unwrap(),
            serde_json::json!("unconfirmed")
        );
        assert_eq!(
            serde_json::to_value(BlockchainStatus::Confirmed).unwrap(),
            serde_json::json!("confirmed")
        );
    }
}
