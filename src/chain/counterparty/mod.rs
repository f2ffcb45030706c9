//! Counterparty composition-node adapter.
//!
//! Compose operations (send, issuance, dividend) are assembled by the
//! composition node over JSON-RPC; signing happens locally (see
//! [`signer`]); broadcast goes through the Bitcoin node. Read queries fall
//! back to the composition node's backing SQLite store when the RPC
//! interface reports itself unavailable or times out. Compose operations
//! have no fallback and surface the error.

pub mod signer;
pub mod wallet;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Row};
use std::str::FromStr;
use std::time::Duration;

use crate::chain::Balance;
use crate::config::{Config, Env};
use crate::errors::{CounterpartyError, GatewayError};

/// Minimal units per whole coin for divisible assets.
pub const SATOSHI: u64 = 100_000_000;
/// Default dust output size in satoshis.
pub const DEFAULT_DUST_SIZE: u64 = 5430;
/// Default miner fee per transaction in satoshis.
pub const DEFAULT_TX_FEE: u64 = 10_000;
/// Reduced miner fee used in the dev environment.
pub const DEFAULT_TESTING_TX_FEE: u64 = 1500;
/// Interval at which the composition node polls its backing chain.
pub const BACKEND_POLL_RATE_MS: u64 = 1000;
/// Divisibility reported for divisible assets (8 decimal places).
pub const DIVISIBLE_DIVISIBILITY: u64 = 100_000_000;
/// Longest asset description the backend accepts.
pub const MAX_DESCRIPTION_LEN: usize = 52;

/// Bounds for generated numeric asset identifiers.
const NUMERIC_ASSET_ID_MIN: u128 = 95_428_956_661_682_176;
const NUMERIC_ASSET_ID_MAX: u128 = 18_446_744_073_709_551_616;

/// Well-known substrings in composition-node error messages.
const LIB_INSUFFICIENT_FUNDS: &str = "insufficient funds";
const LIB_MALFORMED_ADDRESS: &str = "Odd-length string";
const LIB_INSUFFICIENT_BTC: &str = "Insufficient BTC at address";
const LIB_ONLY_ISSUER_CAN_PAY_DIVIDENDS: &str = "only issuer can pay dividends";
const LIB_NO_SUCH_ASSET: &str = "no such asset";
const LIB_MEMPOOL_NOT_READY: &str = "Mempool is not yet ready";

pub const RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
struct RpcFilter {
    field: &'static str,
    op: &'static str,
    value: String,
}

/// One historical issuance event as reported by the composition node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Issuance {
    #[serde(default)]
    pub tx_index: u64,
    #[serde(default)]
    pub tx_hash: String,
    #[serde(default)]
    pub block_index: u64,
    pub asset: String,
    pub quantity: u64,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub divisible: bool,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub transfer: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fee_paid: u64,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub locked: bool,
    #[serde(default)]
    pub status: String,
}

/// One asset transfer as reported by the composition node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetSend {
    #[serde(default)]
    pub tx_index: u64,
    #[serde(default)]
    pub tx_hash: String,
    #[serde(default)]
    pub block_index: u64,
    pub source: String,
    pub destination: String,
    pub asset: String,
    pub quantity: u64,
    #[serde(default)]
    pub status: String,
}

/// The composition node reports booleans as 0/1 over RPC and as the strings
/// "true"/"false" from its backing store.
fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_u64().unwrap_or(0) != 0,
        Value::String(s) => s == "true" || s == "1",
        _ => false,
    })
}

#[derive(Debug, Clone)]
pub struct CounterpartyClient {
    http: reqwest::Client,
    host: String,
    user: String,
    password: String,
    transaction_encoding: String,
    db_location: String,
    env: Env,
}

impl CounterpartyClient {
    pub fn new(config: &Config, env: Env) -> Self {
        CounterpartyClient {
            http: reqwest::Client::new(),
            host: config.counterparty_host.clone(),
            user: config.counterparty_user.clone(),
            password: config.counterparty_password.clone(),
            transaction_encoding: config.counterparty_transaction_encoding.clone(),
            db_location: config.counterparty_db_location.clone(),
            env,
        }
    }

    /// Posts one JSON-RPC call and translates composition-node failures into
    /// taxonomy codes. Callers see either the `result` value or a
    /// [`GatewayError`] they can persist as-is.
    async fn post_api(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let payload = json!({
            "method": method,
            "params": params,
            "jsonrpc": "2.0",
            "id": rand::random::<u32>(),
        });

        let response = self
            .http
            .post(&self.host)
            .basic_auth(&self.user, Some(&self.password))
            .header("Content-Type", "application/json")
            .timeout(RPC_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::from(CounterpartyError::Timeout)
                } else {
                    tracing::error!(method, error = %e, "composition node transport failure");
                    GatewayError::from(CounterpartyError::MiscError)
                }
            })?;

        let status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(method, %status, error = %e, "composition node returned unparseable body");
                return Err(CounterpartyError::MiscError.into());
            }
        };

        if !status.is_success() {
            // The node often reports its real condition inside a non-200 body.
            if let Some(code) = body["code"].as_f64() {
                if code == -32000.0 || code == -10000.0 {
                    return Err(CounterpartyError::ReparsingOrUnavailable.into());
                }
            }
        }

        if body["result"].is_null() {
            if let Some(translated) = translate_error_body(&body) {
                return Err(translated.into());
            }
            tracing::debug!(method, body = %body, "composition node replied without a result");
            return Err(CounterpartyError::MiscError.into());
        }

        Ok(body["result"].clone())
    }

    fn is_fallback_worthy(error: &GatewayError) -> bool {
        matches!(
            error,
            GatewayError::Counterparty(CounterpartyError::ReparsingOrUnavailable)
                | GatewayError::Counterparty(CounterpartyError::Timeout)
        )
    }

    // ------------------------------------------------------------------
    // Balance and history queries (RPC with read-only store fallback)
    // ------------------------------------------------------------------

    pub async fn get_balances_by_address(
        &self,
        address: &str,
    ) -> Result<Vec<Balance>, GatewayError> {
        let filters = vec![RpcFilter {
            field: "address",
            op: "==",
            value: address.to_string(),
        }];
        let params = json!({
            "filters": filters,
            "filterop": "AND",
        });
        match self.post_api("get_balances", params).await {
            Ok(result) => Ok(parse_balances(&result)),
            Err(e) if Self::is_fallback_worthy(&e) => self.get_balances_by_address_db(address).await,
            Err(e) => Err(e),
        }
    }

    pub async fn get_balances_by_asset(&self, asset: &str) -> Result<Vec<Balance>, GatewayError> {
        let filters = vec![RpcFilter {
            field: "asset",
            op: "==",
            value: asset.to_string(),
        }];
        let params = json!({
            "filters": filters,
            "filterop": "AND",
        });
        match self.post_api("get_balances", params).await {
            Ok(result) => Ok(parse_balances(&result)),
            Err(e) if Self::is_fallback_worthy(&e) => self.get_balances_by_asset_db(asset).await,
            Err(e) => Err(e),
        }
    }

    pub async fn get_sends_by_address(&self, address: &str) -> Result<Vec<AssetSend>, GatewayError> {
        let filters = vec![RpcFilter {
            field: "destination",
            op: "==",
            value: address.to_string(),
        }];
        let params = json!({
            "filters": filters,
            "filterop": "OR",
            "status": "valid",
        });
        match self.post_api("get_sends", params).await {
            Ok(result) => {
                let sends = result
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|item| serde_json::from_value(item.clone()).ok())
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(sends)
            }
            Err(e) if Self::is_fallback_worthy(&e) => self.get_sends_by_address_db(address).await,
            Err(e) => Err(e),
        }
    }

    pub async fn get_issuances(&self, asset: &str) -> Result<Vec<Issuance>, GatewayError> {
        let filters = vec![
            RpcFilter {
                field: "asset",
                op: "==",
                value: asset.to_string(),
            },
            RpcFilter {
                field: "status",
                op: "==",
                value: "valid".to_string(),
            },
        ];
        let params = json!({
            "order_by": "tx_index",
            "order_dir": "asc",
            "filters": filters,
        });
        match self.post_api("get_issuances", params).await {
            Ok(result) => {
                let issuances = result
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|item| serde_json::from_value(item.clone()).ok())
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(issuances)
            }
            Err(e) if Self::is_fallback_worthy(&e) => self.get_issuances_db(asset).await,
            Err(e) => Err(e),
        }
    }

    /// The composition node's SQLite drivers are not concurrency safe, so a
    /// fresh read-only connection is opened per query.
    async fn fallback_connection(&self) -> Result<sqlx::SqliteConnection, GatewayError> {
        SqliteConnectOptions::from_str(&format!("sqlite://{}", self.db_location))
            .map_err(|e| {
                tracing::error!(error = %e, "bad composition store location");
                GatewayError::from(CounterpartyError::MiscError)
            })?
            .read_only(true)
            .connect()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to open composition store");
                GatewayError::from(CounterpartyError::MiscError)
            })
    }

    async fn get_balances_by_address_db(&self, address: &str) -> Result<Vec<Balance>, GatewayError> {
        let mut conn = self.fallback_connection().await?;
        let rows = sqlx::query("select address, asset, quantity from balances where address = ?")
            .bind(address)
            .fetch_all(&mut conn)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "composition store query failed");
                GatewayError::from(CounterpartyError::MiscError)
            })?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(Balance {
                    address: row.try_get("address").ok()?,
                    asset: row.try_get("asset").ok()?,
                    quantity: row.try_get::<i64, _>("quantity").ok()? as u64,
                })
            })
            .collect())
    }

    async fn get_balances_by_asset_db(&self, asset: &str) -> Result<Vec<Balance>, GatewayError> {
        let mut conn = self.fallback_connection().await?;
        let rows = sqlx::query("select address, asset, quantity from balances where asset = ?")
            .bind(asset)
            .fetch_all(&mut conn)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "composition store query failed");
                GatewayError::from(CounterpartyError::MiscError)
            })?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(Balance {
                    address: row.try_get("address").ok()?,
                    asset: row.try_get("asset").ok()?,
                    quantity: row.try_get::<i64, _>("quantity").ok()? as u64,
                })
            })
            .collect())
    }

    async fn get_sends_by_address_db(&self, address: &str) -> Result<Vec<AssetSend>, GatewayError> {
        let mut conn = self.fallback_connection().await?;
        let rows = sqlx::query(
            "select tx_index, tx_hash, block_index, source, destination, asset, quantity, status \
             from sends where destination = ?",
        )
        .bind(address)
        .fetch_all(&mut conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "composition store query failed");
            GatewayError::from(CounterpartyError::MiscError)
        })?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(AssetSend {
                    tx_index: row.try_get::<i64, _>("tx_index").ok()? as u64,
                    tx_hash: row.try_get("tx_hash").ok()?,
                    block_index: row.try_get::<i64, _>("block_index").ok()? as u64,
                    source: row.try_get("source").ok()?,
                    destination: row.try_get("destination").ok()?,
                    asset: row.try_get("asset").ok()?,
                    quantity: row.try_get::<i64, _>("quantity").ok()? as u64,
                    status: row.try_get("status").ok()?,
                })
            })
            .collect())
    }

    async fn get_issuances_db(&self, asset: &str) -> Result<Vec<Issuance>, GatewayError> {
        let mut conn = self.fallback_connection().await?;
        let rows = sqlx::query(
            "select tx_index, tx_hash, block_index, asset, quantity, divisible, source, issuer, \
             transfer, description, fee_paid, locked, status \
             from issuances where status = 'valid' and asset = ?",
        )
        .bind(asset)
        .fetch_all(&mut conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "composition store query failed");
            GatewayError::from(CounterpartyError::MiscError)
        })?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(Issuance {
                    tx_index: row.try_get::<i64, _>("tx_index").ok()? as u64,
                    tx_hash: row.try_get("tx_hash").ok()?,
                    block_index: row.try_get::<i64, _>("block_index").ok()? as u64,
                    asset: row.try_get("asset").ok()?,
                    quantity: row.try_get::<i64, _>("quantity").ok()? as u64,
                    divisible: row.try_get::<String, _>("divisible").ok()? == "true",
                    source: row.try_get("source").ok()?,
                    issuer: row.try_get("issuer").ok()?,
                    transfer: row.try_get::<String, _>("transfer").ok()? == "true",
                    description: row.try_get("description").ok()?,
                    fee_paid: row.try_get::<i64, _>("fee_paid").ok()? as u64,
                    locked: row.try_get::<String, _>("locked").ok()? == "true",
                    status: row.try_get("status").ok()?,
                })
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Compose operations (no fallback)
    // ------------------------------------------------------------------

    /// Composes an unsigned transaction sending `quantity` of `asset` from
    /// `source` to `destination`. Returns the hex-encoded raw transaction.
    pub async fn create_send(
        &self,
        source: &str,
        destination: &str,
        asset: &str,
        quantity: u64,
        source_pub_key: &str,
    ) -> Result<String, GatewayError> {
        let params = json!({
            "source": source,
            "destination": destination,
            "asset": asset,
            "quantity": quantity,
            "allow_unconfirmed_inputs": "true",
            "encoding": self.transaction_encoding,
            "pubkey": source_pub_key,
            "fee": self.tx_fee(),
            "regular_dust_size": DEFAULT_DUST_SIZE,
        });
        let result = self.post_api("create_send", params).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CounterpartyError::ComposeError.into())
    }

    /// Composes an unsigned issuance transaction. The description is capped
    /// at the backend's 52-character limit.
    pub async fn create_issuance(
        &self,
        source: &str,
        asset: &str,
        description: &str,
        quantity: u64,
        divisible: bool,
        source_pub_key: &str,
    ) -> Result<String, GatewayError> {
        let description = truncate_description(description);
        let params = json!({
            "source": source,
            "asset": asset,
            "quantity": quantity,
            "divisible": divisible,
            "description": description,
            "allow_unconfirmed_inputs": "true",
            "encoding": self.transaction_encoding,
            "pubkey": source_pub_key,
            "fee": self.tx_fee(),
            "regular_dust_size": DEFAULT_DUST_SIZE,
        });
        let result = self.post_api("create_issuance", params).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CounterpartyError::ComposeError.into())
    }

    /// Composes an unsigned dividend transaction paying `quantity_per_unit`
    /// of `dividend_asset` to every holder of `asset`.
    pub async fn create_dividend(
        &self,
        source: &str,
        asset: &str,
        dividend_asset: &str,
        quantity_per_unit: u64,
        source_pub_key: &str,
    ) -> Result<String, GatewayError> {
        let params = json!({
            "source": source,
            "asset": asset,
            "dividend_asset": dividend_asset,
            "quantity_per_unit": quantity_per_unit,
            "encoding": self.transaction_encoding,
            "pubkey": source_pub_key,
            "fee": self.tx_fee(),
            "regular_dust_size": DEFAULT_DUST_SIZE,
        });
        let result = self.post_api("create_dividend", params).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CounterpartyError::ComposeError.into())
    }

    /// Picks a free numeric asset name by uniform sampling, asking the
    /// composition node whether any balance already exists under the
    /// candidate and retrying until one is free.
    pub async fn generate_random_asset_name(&self) -> Result<String, GatewayError> {
        loop {
            let candidate = random_numeric_asset_name();
            let existing = self.get_balances_by_asset(&candidate).await?;
            if existing.is_empty() {
                return Ok(candidate);
            }
            tracing::info!(candidate, "numeric asset name collision, retrying");
        }
    }

    fn tx_fee(&self) -> u64 {
        if self.env.is_dev() {
            DEFAULT_TESTING_TX_FEE
        } else {
            DEFAULT_TX_FEE
        }
    }

    // ------------------------------------------------------------------
    // Fee arithmetic
    // ------------------------------------------------------------------

    /// Total BTC (satoshis) required to fund `amount` future transactions.
    /// The requested count is capped at 1000.
    pub fn calculate_fee_amount(&self, amount: u64) -> (u64, &'static str) {
        let clamped = amount.min(1000);
        let per_tx = DEFAULT_DUST_SIZE + self.tx_fee();
        (per_tx * clamped, "BTC")
    }

    /// Number of transactions affordable with `amount` satoshis of BTC.
    pub fn calculate_number_of_transactions(&self, amount: u64) -> u64 {
        amount / (DEFAULT_DUST_SIZE + self.tx_fee())
    }
}

fn parse_balances(result: &Value) -> Vec<Balance> {
    result
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(Balance {
                        address: item["address"].as_str()?.to_string(),
                        asset: item["asset"].as_str()?.to_string(),
                        quantity: item["quantity"].as_u64()?,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Truncates an asset description to the backend's 52-character cap.
pub fn truncate_description(description: &str) -> &str {
    if description.len() > MAX_DESCRIPTION_LEN {
        &description[..MAX_DESCRIPTION_LEN - 1]
    } else {
        description
    }
}

/// Generates a candidate numeric asset name: `A` followed by a uniform
/// integer in the numeric asset id range.
fn random_numeric_asset_name() -> String {
    use rand::Rng;
    let n: u128 = rand::rng().random_range(NUMERIC_ASSET_ID_MIN..=NUMERIC_ASSET_ID_MAX);
    format!("A{n}")
}

/// Maps well-known substrings of a composition-node error body onto stable
/// taxonomy codes.
fn translate_error_body(body: &Value) -> Option<CounterpartyError> {
    let message = body["error"]["data"]["message"].as_str()?;
    if message.contains(LIB_ONLY_ISSUER_CAN_PAY_DIVIDENDS) {
        Some(CounterpartyError::OnlyIssuerCanPayDividends)
    } else if message.contains(LIB_INSUFFICIENT_FUNDS) {
        Some(CounterpartyError::InsufficientFunds)
    } else if message.contains(LIB_MALFORMED_ADDRESS) {
        Some(CounterpartyError::MalformedAddress)
    } else if message.contains(LIB_NO_SUCH_ASSET) {
        Some(CounterpartyError::NoSuchAsset)
    } else if message.contains(LIB_INSUFFICIENT_BTC) {
        Some(CounterpartyError::InsufficientFees)
    } else if message.contains(LIB_MEMPOOL_NOT_READY) {
        Some(CounterpartyError::ReparsingOrUnavailable)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_asset_names_stay_in_range() {
        for _ in 0..64 {
            let name = random_numeric_asset_name();
            let digits = name.strip_prefix('A').expect("A prefix");
            let n: u128 = digits.parse().unwrap();
            assert!((NUMERIC_ASSET_ID_MIN..=NUMERIC_ASSET_ID_MAX).contains(&n));
        }
    }

    #[test]
    fn descriptions_are_capped_at_52_chars() {
        let long = "x".repeat(80);
        assert_eq!(truncate_description(&long).len(), 51);
        assert_eq!(truncate_description("short"), "short");
        let exactly = "y".repeat(52);
        assert_eq!(truncate_description(&exactly), exactly.as_str());
    }

    #[test]
    fn node_error_messages_translate_to_stable_codes() {
        let cases = [
            ("only issuer can pay dividends", CounterpartyError::OnlyIssuerCanPayDividends),
            ("insufficient funds at 1abc", CounterpartyError::InsufficientFunds),
            ("Odd-length string", CounterpartyError::MalformedAddress),
            ("no such asset: PONZI", CounterpartyError::NoSuchAsset),
            ("Insufficient BTC at address 1abc", CounterpartyError::InsufficientFees),
            ("Mempool is not yet ready", CounterpartyError::ReparsingOrUnavailable),
        ];
        for (message, expected) in cases {
            let body = json!({"error": {"data": {"message": message}}});
            assert_eq!(translate_error_body(&body), Some(expected), "{message}");
        }
        let unknown = json!({"error": {"data": {"message": "some novel failure"}}});
        assert_eq!(translate_error_body(&unknown), None);
    }

    #[test]
    fn balances_parse_from_rpc_result() {
        let result = json!([
            {"address": "1abc", "asset": "GOLD", "quantity": 5},
            {"address": "1def", "asset": "GOLD", "quantity": 7},
        ]);
        let balances = parse_balances(&result);
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[1].quantity, 7);
    }

    #[test]
    fn fee_arithmetic_clamps_and_divides() {
        let config_json = serde_json::json!({
            "dburl": "h", "schema": "s", "dbuser": "u", "dbpassword": "p",
            "btchost": "h", "btcuser": "u", "btcpassword": "p",
            "counterpartyhost": "h", "counterpartyuser": "u", "counterpartypassword": "p",
            "counterpartytransactionencoding": "multisig", "counterpartydblocation": "/tmp/x.db",
            "rippleHost": "h", "rippleLastLedgerSequenceOffset": 10,
            "fluentHost": "h"
        });
        let config: crate::config::Config = serde_json::from_value(config_json).unwrap();
        let client = CounterpartyClient::new(&config, Env::Production);

        let (quantity, asset) = client.calculate_fee_amount(10);
        assert_eq!(asset, "BTC");
        assert_eq!(quantity, (DEFAULT_DUST_SIZE + DEFAULT_TX_FEE) * 10);

        let (quantity, _) = client.calculate_fee_amount(5000);
        assert_eq!(quantity, (DEFAULT_DUST_SIZE + DEFAULT_TX_FEE) * 1000);

        assert_eq!(
            client.calculate_number_of_transactions(DEFAULT_DUST_SIZE + DEFAULT_TX_FEE),
            1
        );

        let dev_client = CounterpartyClient::new(&config, Env::Dev);
        assert_eq!(
            dev_client.calculate_number_of_transactions(DEFAULT_DUST_SIZE + DEFAULT_TESTING_TX_FEE),
            1
        );
    }
}
