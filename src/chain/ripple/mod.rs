//! Consensus-ledger (Ripple) adapter.
//!
//! Speaks JSON-RPC to a validator-adjacent node. Transactions are signed by
//! the node with a secret derived offline from the caller's passphrase (see
//! [`crypto`]), and every submitted transaction carries a
//! `LastLedgerSequence` bound so abandoned transactions definitively expire.
//! Submission distinguishes `tec*` engine failures (fee lost) from
//! `terQUEUED` (poll until validated or the ledger bound passes).

pub mod crypto;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;
use std::time::Duration;

use crate::config::{Config, Env};
use crate::errors::{GatewayError, RippleError};

/// Fee per transaction in drops, as a decimal string for tx fields.
pub const DEFAULT_FEE: &str = "10000";
/// Fee per transaction in drops.
pub const DEFAULT_FEE_DROPS: u64 = 10_000;
/// Native-currency reserve required by an empty account, in drops.
pub const BASE_RESERVE: u64 = 20_000_000;
/// Additional reserve per owned ledger object (trust line), in drops.
pub const OWNER_RESERVE: u64 = 5_000_000;
/// Limit placed on trust lines the gateway establishes.
pub const DEFAULT_AMOUNT_TO_TRUST: u64 = 100_000_000_000_000_000;
/// Interval at which the node's ledger advances, used for settle sleeps.
pub const BACKEND_POLL_RATE_MS: u64 = 1000;
/// Minimal units per whole unit on the wire (satoshi-style fixed point).
pub const SATOSHI: u64 = 100_000_000;

/// Account-set flag enabling rippling through the issuer by default.
pub const ASF_DEFAULT_RIPPLE: u32 = 8;
/// AccountRoot flag bit indicating default rippling is enabled.
pub const LSF_DEFAULT_RIPPLE: u32 = 8_388_608;
/// Transaction flag requiring a fully canonical signature.
pub const TF_FULLY_CANONICAL_SIG: u32 = 2_147_483_648;

const CUSTOM_CURRENCY_PREFIX: &str = "80";
/// Longest custom currency name carried in the 160-bit field.
const MAX_CURRENCY_LEN: usize = 19;
/// The ledger targets 15 significant digits for amounts.
const AMOUNT_PRECISION: u32 = 15;

const QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const QUEUE_POLL_ATTEMPTS: u32 = 10;

pub const RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// An issued-currency amount: decimal value, currency code, issuing account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrencyAmount {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub currency: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
}

#[derive(Debug, Clone, Serialize)]
struct PaymentAssetTx {
    #[serde(rename = "TransactionType")]
    transaction_type: &'static str,
    #[serde(rename = "Account")]
    account: String,
    #[serde(rename = "Destination")]
    destination: String,
    #[serde(rename = "Amount")]
    amount: CurrencyAmount,
    /// The gateway allows no slippage: SendMax equals Amount.
    #[serde(rename = "SendMax")]
    send_max: CurrencyAmount,
    #[serde(rename = "Flags")]
    flags: u32,
    #[serde(rename = "Fee")]
    fee: &'static str,
    #[serde(rename = "LastLedgerSequence")]
    last_ledger_sequence: u64,
}

#[derive(Debug, Clone, Serialize)]
struct PaymentXrpTx {
    #[serde(rename = "TransactionType")]
    transaction_type: &'static str,
    #[serde(rename = "Account")]
    account: String,
    #[serde(rename = "Destination")]
    destination: String,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Flags")]
    flags: u32,
    #[serde(rename = "Fee")]
    fee: &'static str,
    #[serde(rename = "LastLedgerSequence")]
    last_ledger_sequence: u64,
}

#[derive(Debug, Clone, Serialize)]
struct AccountSetTx {
    #[serde(rename = "TransactionType")]
    transaction_type: &'static str,
    #[serde(rename = "Account")]
    account: String,
    #[serde(rename = "Flags")]
    flags: u32,
    #[serde(rename = "Fee")]
    fee: &'static str,
    #[serde(rename = "SetFlag")]
    set_flag: u32,
}

#[derive(Debug, Clone, Serialize)]
struct TrustSetTx {
    #[serde(rename = "TransactionType")]
    transaction_type: &'static str,
    #[serde(rename = "Account")]
    account: String,
    #[serde(rename = "Flags")]
    flags: u32,
    #[serde(rename = "Fee")]
    fee: &'static str,
    #[serde(rename = "LimitAmount")]
    limit_amount: CurrencyAmount,
}

/// One trust line of an account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Line {
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub balance: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub limit: String,
    #[serde(default)]
    pub limit_peer: String,
    #[serde(default)]
    pub no_ripple: bool,
}

/// Trust lines of an account, with issuer/currency membership lookup.
#[derive(Debug, Clone, Default)]
pub struct Lines(pub Vec<Line>);

impl Lines {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if a line toward `account` exists for `currency` (ledger form,
    /// compared case-insensitively).
    pub fn contains(&self, account: &str, currency: &str) -> bool {
        self.0.iter().any(|line| {
            line.account == account && line.currency.eq_ignore_ascii_case(currency)
        })
    }
}

/// Account root summary for an account.
#[derive(Debug, Clone, Default)]
pub struct AccountInfo {
    pub account: String,
    /// XRP balance in drops, as reported (decimal string); empty when the
    /// account does not exist yet.
    pub balance: String,
    pub flags: u32,
    pub owner_count: u64,
    pub sequence: u64,
}

/// Identity of the latest validated ledger.
#[derive(Debug, Clone, Default)]
pub struct LedgerValue {
    pub accepted: bool,
    pub closed: bool,
    pub ledger_hash: String,
    pub ledger_index: String,
}

/// Status of a submitted transaction.
#[derive(Debug, Clone, Default)]
pub struct TransactionStatus {
    pub account: String,
    pub hash: String,
    pub ledger_index: u64,
    pub validated: bool,
}

/// An account proposal returned by the node's offline wallet generator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RippleWallet {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub key_type: String,
    #[serde(default)]
    pub master_key: String,
    #[serde(default)]
    pub master_seed: String,
    #[serde(default)]
    pub master_seed_hex: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub public_key_hex: String,
}

/// A balance held by an account: decimal value, currency, counterparty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountBalance {
    pub value: String,
    pub currency: String,
    pub counterparty: String,
}

#[derive(Debug, Clone)]
pub struct RippleClient {
    http: reqwest::Client,
    host: String,
    last_ledger_sequence_offset: u64,
    env: Env,
}

impl RippleClient {
    pub fn new(config: &Config, env: Env) -> Self {
        RippleClient {
            http: reqwest::Client::new(),
            host: config.ripple_host.clone(),
            last_ledger_sequence_offset: config.ripple_last_ledger_sequence_offset,
            env,
        }
    }

    async fn post_rpc(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let payload = json!({
            "method": method,
            "params": params,
        });
        let response = self
            .http
            .post(&self.host)
            .header("Content-Type", "application/json")
            .timeout(RPC_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::from(RippleError::Timeout)
                } else {
                    tracing::error!(method, error = %e, "ripple rpc transport failure");
                    GatewayError::from(RippleError::MiscError)
                }
            })?;
        response.json::<Value>().await.map_err(|e| {
            tracing::error!(method, error = %e, "ripple rpc returned unparseable body");
            GatewayError::from(RippleError::MiscError)
        })
    }

    /// Signs a transaction with the node. The secret never appears in logs.
    pub async fn sign(&self, tx: &Value, secret: &str) -> Result<String, GatewayError> {
        let params = json!([{
            "offline": false,
            "secret": secret,
            "tx_json": tx,
        }]);
        let body = self.post_rpc("sign", params).await?;
        let result = &body["result"];
        if result["status"] == "success" {
            return result["tx_blob"]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| RippleError::SigningError.into());
        }

        let error_code = result["error_code"].as_i64().unwrap_or(0);
        let error_message = result["error_message"].as_str().unwrap_or("");
        tracing::error!(error_code, error_message, "ripple sign rejected");
        match error_code {
            55 | 63 => Err(RippleError::InvalidSource.into()),
            29 => Err(RippleError::InvalidDestination.into()),
            _ => Err(RippleError::SigningError.into()),
        }
    }

    /// Submits a signed transaction blob and returns the transaction hash.
    ///
    /// `terQUEUED` submissions are polled every second until validated or
    /// until the latest validated ledger passes the submission ledger plus
    /// the configured offset, at most [`QUEUE_POLL_ATTEMPTS`] times.
    pub async fn submit(&self, tx_blob: &str) -> Result<String, GatewayError> {
        if self.env.is_dev() {
            tracing::info!("dev environment, not submitting tx to the ledger");
            return Ok("youwereasuccess".to_string());
        }

        let params = json!([{ "tx_blob": tx_blob }]);
        let body = self.post_rpc("submit", params).await?;
        let result = &body["result"];
        if result.is_null() {
            return Err(RippleError::SubmitError.into());
        }

        let hash = result["tx_json"]["hash"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let engine_result = result["engine_result"].as_str().unwrap_or("");
        if engine_result == "tesSUCCESS" {
            return Ok(hash);
        }

        tracing::error!(
            engine_result,
            engine_result_code = result["engine_result_code"].as_i64().unwrap_or(0),
            engine_result_message = result["engine_result_message"].as_str().unwrap_or(""),
            "ledger submit did not succeed"
        );

        if engine_result == "terQUEUED" {
            return self.await_queued(&hash).await;
        }

        Err(translate_engine_result(engine_result).into())
    }

    /// Waits for a queued transaction to reach a validated ledger.
    async fn await_queued(&self, hash: &str) -> Result<String, GatewayError> {
        let submission_ledger = self.get_latest_validated_ledger().await?;
        let submission_index: u64 = submission_ledger
            .ledger_index
            .parse()
            .map_err(|_| GatewayError::from(RippleError::UnableToGetLatestLedger))?;

        for _ in 0..QUEUE_POLL_ATTEMPTS {
            tokio::time::sleep(QUEUE_POLL_INTERVAL).await;

            let tx = self.get_tx(hash).await?;
            if tx.validated {
                tracing::info!(hash, "queued transaction subsequently accepted");
                return Ok(tx.hash);
            }

            let ledger = self.get_latest_validated_ledger().await?;
            let current_index: u64 = ledger
                .ledger_index
                .parse()
                .map_err(|_| GatewayError::from(RippleError::UnableToGetLatestLedger))?;
            if current_index > submission_index + self.last_ledger_sequence_offset {
                break;
            }
        }

        let tx = self.get_tx(hash).await?;
        if tx.validated {
            tracing::info!(hash, "queued transaction subsequently accepted");
            Ok(tx.hash)
        } else {
            tracing::error!(hash, "queued transaction expired unvalidated");
            Err(RippleError::QueuedNotAccepted.into())
        }
    }

    /// Composes and signs a payment. XRP amounts are given in drops; issued
    /// currencies carry `SendMax = Amount` so no slippage is accepted.
    pub async fn create_payment(
        &self,
        account: &str,
        destination: &str,
        quantity: &str,
        currency: &str,
        issuer: &str,
        secret: &str,
    ) -> Result<String, GatewayError> {
        let latest = self.get_latest_validated_ledger().await?;
        if !latest.accepted || !latest.closed {
            tracing::error!(?latest, "latest ledger is not closed and accepted");
            return Err(RippleError::UnableToGetLatestLedger.into());
        }
        let latest_index: u64 = latest
            .ledger_index
            .parse()
            .map_err(|_| GatewayError::from(RippleError::UnableToGetLatestLedger))?;
        let last_ledger_sequence = latest_index + self.last_ledger_sequence_offset;

        let tx = if currency.eq_ignore_ascii_case("XRP") {
            serde_json::to_value(PaymentXrpTx {
                transaction_type: "Payment",
                account: account.to_string(),
                destination: destination.to_string(),
                amount: quantity.to_string(),
                flags: TF_FULLY_CANONICAL_SIG,
                fee: DEFAULT_FEE,
                last_ledger_sequence,
            })
        } else {
            let amount = CurrencyAmount {
                value: quantity.to_string(),
                currency: currency.to_string(),
                issuer: issuer.to_string(),
            };
            serde_json::to_value(PaymentAssetTx {
                transaction_type: "Payment",
                account: account.to_string(),
                destination: destination.to_string(),
                amount: amount.clone(),
                send_max: amount,
                flags: TF_FULLY_CANONICAL_SIG,
                fee: DEFAULT_FEE,
                last_ledger_sequence,
            })
        }
        .map_err(|_| GatewayError::from(RippleError::MiscError))?;

        self.sign(&tx, secret).await
    }

    /// Sets an account-root flag, signing and submitting in one step.
    pub async fn account_set_flag(
        &self,
        account: &str,
        flag: u32,
        secret: &str,
    ) -> Result<String, GatewayError> {
        let tx = serde_json::to_value(AccountSetTx {
            transaction_type: "AccountSet",
            account: account.to_string(),
            flags: TF_FULLY_CANONICAL_SIG,
            fee: DEFAULT_FEE,
            set_flag: flag,
        })
        .map_err(|_| GatewayError::from(RippleError::MiscError))?;
        let signed = self.sign(&tx, secret).await?;
        self.submit(&signed).await
    }

    /// Establishes or modifies a trust line from `account` toward
    /// `issuer` for up to `value` of `currency`.
    pub async fn trust_set(
        &self,
        account: &str,
        currency: &str,
        value: &str,
        issuer: &str,
        flag: u32,
        secret: &str,
    ) -> Result<String, GatewayError> {
        let tx = serde_json::to_value(TrustSetTx {
            transaction_type: "TrustSet",
            account: account.to_string(),
            flags: TF_FULLY_CANONICAL_SIG | flag,
            fee: DEFAULT_FEE,
            limit_amount: CurrencyAmount {
                value: value.to_string(),
                currency: currency.to_string(),
                issuer: issuer.to_string(),
            },
        })
        .map_err(|_| GatewayError::from(RippleError::MiscError))?;
        let signed = self.sign(&tx, secret).await?;
        self.submit(&signed).await
    }

    /// Proposes a new account offline via the node.
    pub async fn create_wallet(&self) -> Result<RippleWallet, GatewayError> {
        let body = self.post_rpc("wallet_propose", json!([{}])).await?;
        let result = &body["result"];
        if result.is_null() {
            return Err(RippleError::MiscError.into());
        }
        serde_json::from_value(result.clone())
            .map_err(|_| GatewayError::from(RippleError::MiscError))
    }

    /// Trust lines held by `account`. A missing account yields no lines.
    pub async fn get_account_lines(&self, account: &str) -> Result<Lines, GatewayError> {
        let params = json!([{ "account": account, "ledger": "validated" }]);
        let body = self.post_rpc("account_lines", params).await?;
        let result = &body["result"];
        if result.is_null() {
            tracing::error!("no result from account_lines");
            return Err(RippleError::MiscError.into());
        }
        if !result["error"].is_null() && result["error_code"].as_i64() == Some(18) {
            return Ok(Lines::default());
        }
        let lines = result["lines"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(Lines(lines))
    }

    /// Account root for `account`. A missing account yields the default
    /// (empty) info rather than an error.
    pub async fn get_account_info(&self, account: &str) -> Result<AccountInfo, GatewayError> {
        let params = json!([{ "account": account, "ledger": "validated" }]);
        let body = self.post_rpc("account_info", params).await?;
        let result = &body["result"];
        if result.is_null() {
            tracing::error!("no result from account_info");
            return Err(RippleError::MiscError.into());
        }
        if !result["error"].is_null() {
            if result["error_code"].as_i64() == Some(18) {
                return Ok(AccountInfo::default());
            }
            tracing::error!(error = %result["error"], "account_info failed");
            return Err(RippleError::MiscError.into());
        }
        let data = &result["account_data"];
        Ok(AccountInfo {
            account: data["Account"].as_str().unwrap_or_default().to_string(),
            balance: data["Balance"].as_str().unwrap_or_default().to_string(),
            flags: data["Flags"].as_u64().unwrap_or(0) as u32,
            owner_count: data["OwnerCount"].as_u64().unwrap_or(0),
            sequence: data["Sequence"].as_u64().unwrap_or(0),
        })
    }

    /// Balances held by `account`: positive trust-line balances plus the
    /// native XRP balance. Assumes each custom currency ripples through one
    /// central issuing address.
    pub async fn get_account_balances(
        &self,
        account: &str,
    ) -> Result<Vec<AccountBalance>, GatewayError> {
        let lines = self.get_account_lines(account).await?;
        let mut balances: Vec<AccountBalance> = lines
            .0
            .iter()
            .filter(|line| {
                Decimal::from_str(&line.balance)
                    .map(|value| value > Decimal::ZERO)
                    .unwrap_or(false)
            })
            .map(|line| AccountBalance {
                value: line.balance.clone(),
                currency: line.currency.clone(),
                counterparty: line.account.clone(),
            })
            .collect();

        match self.get_account_info(account).await {
            Ok(info) => {
                let drops = Decimal::from_str(if info.balance.is_empty() {
                    "0"
                } else {
                    &info.balance
                })
                .unwrap_or(Decimal::ZERO);
                let xrp = (drops / Decimal::from(1_000_000u64)).normalize();
                balances.push(AccountBalance {
                    value: xrp.to_string(),
                    currency: "XRP".to_string(),
                    counterparty: String::new(),
                });
            }
            Err(e) => {
                // The XRP balance is simply omitted from the results.
                tracing::error!(error = %e, "unable to read account info for XRP balance");
            }
        }

        Ok(balances)
    }

    /// The latest closed and validated ledger.
    pub async fn get_latest_validated_ledger(&self) -> Result<LedgerValue, GatewayError> {
        let body = self.post_rpc("ledger", json!([{}])).await?;
        let ledger = &body["result"]["closed"]["ledger"];
        if ledger.is_null() {
            return Err(RippleError::UnableToGetLatestLedger.into());
        }
        Ok(LedgerValue {
            accepted: ledger["accepted"].as_bool().unwrap_or(false),
            closed: ledger["closed"].as_bool().unwrap_or(false),
            ledger_hash: ledger["ledger_hash"].as_str().unwrap_or_default().to_string(),
            ledger_index: value_as_string(&ledger["ledger_index"]),
        })
    }

    /// Status of a transaction by hash. Returns nothing useful until the
    /// transaction has been seen by the node.
    pub async fn get_tx(&self, hash: &str) -> Result<TransactionStatus, GatewayError> {
        let params = json!([{ "transaction": hash, "binary": false }]);
        let body = self.post_rpc("tx", params).await?;
        let result = &body["result"];
        if result.is_null() {
            return Err(RippleError::MiscError.into());
        }
        Ok(TransactionStatus {
            account: result["Account"].as_str().unwrap_or_default().to_string(),
            hash: result["hash"].as_str().unwrap_or_default().to_string(),
            ledger_index: result["ledger_index"].as_u64().unwrap_or(0),
            validated: result["validated"].as_bool().unwrap_or(false),
        })
    }

    /// Total drops required to fund `amount` future transactions; the count
    /// is capped at 1000.
    pub fn calculate_fee_amount(&self, amount: u64) -> (u64, &'static str) {
        let clamped = amount.clamp(1, 1000);
        (DEFAULT_FEE_DROPS * clamped, "XRP")
    }

    /// Number of transactions affordable with `amount` drops.
    pub fn calculate_number_of_transactions(&self, amount: u64) -> u64 {
        amount / DEFAULT_FEE_DROPS
    }
}

/// Reserve (drops) an account must hold with `owned_lines` ledger objects.
pub fn calculate_reserve(owned_lines: u64) -> u64 {
    BASE_RESERVE + owned_lines * OWNER_RESERVE
}

/// Maps a non-queued engine failure to its taxonomy code. `tec*` codes mean
/// the fee was lost on-ledger; two subtypes carry more specific causes.
fn translate_engine_result(engine_result: &str) -> RippleError {
    if engine_result.starts_with("tec") {
        match engine_result {
            "tecPATH_DRY" => RippleError::InvalidCurrencyOrNoTrustline,
            "tecUNFUNDED_PAYMENT" => RippleError::InsufficientXrp,
            _ => RippleError::SubmitErrorFeeLost,
        }
    } else {
        RippleError::SubmitError
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

// ----------------------------------------------------------------------
// Currency and amount codecs
// ----------------------------------------------------------------------

/// Encodes an asset name into the ledger's currency field. Names of exactly
/// 3 characters pass through; longer names (up to 19 bytes) are hex encoded
/// behind a sentinel byte and zero padded to the 160-bit field width.
pub fn to_currency(asset: &str) -> Result<String, GatewayError> {
    if asset.len() < 3 {
        return Err(RippleError::InvalidCurrency.into());
    }
    if asset.len() == 3 {
        return Ok(asset.to_string());
    }
    let truncated = &asset[..asset.len().min(MAX_CURRENCY_LEN)];
    let mut encoded = String::with_capacity(40);
    encoded.push_str(CUSTOM_CURRENCY_PREFIX);
    encoded.push_str(&hex::encode(truncated));
    for _ in truncated.len()..MAX_CURRENCY_LEN {
        encoded.push_str("00");
    }
    Ok(encoded)
}

/// Decodes a ledger currency field back to the asset name: the sentinel byte
/// is stripped and trailing zero bytes removed before hex decoding.
pub fn from_currency(currency: &str) -> Result<String, GatewayError> {
    if currency.len() < 3 {
        return Err(RippleError::InvalidCurrency.into());
    }
    if currency.len() == 3 {
        return Ok(currency.to_string());
    }
    if currency.len() != 40 {
        return Err(RippleError::InvalidCurrency.into());
    }
    let mut body = currency
        .strip_prefix(CUSTOM_CURRENCY_PREFIX)
        .ok_or(GatewayError::from(RippleError::InvalidCurrency))?;
    while let Some(stripped) = body.strip_suffix("00") {
        body = stripped;
    }
    let decoded = hex::decode(body).map_err(|_| GatewayError::from(RippleError::InvalidCurrency))?;
    String::from_utf8(decoded).map_err(|_| RippleError::InvalidCurrency.into())
}

/// Converts a ledger decimal amount string into the wire's fixed-point
/// integer form (×10⁸). Arbitrary-precision decimals avoid double rounding.
pub fn amount_to_uint64(amount: &str) -> Result<u64, GatewayError> {
    let value =
        Decimal::from_str(amount).map_err(|_| GatewayError::from(RippleError::InvalidAmount))?;
    let scaled = value * Decimal::from(SATOSHI);
    scaled
        .trunc()
        .to_u64()
        .ok_or_else(|| RippleError::InvalidAmount.into())
}

/// Converts a fixed-point integer (×10⁸) into the ledger's decimal string,
/// trimmed of trailing zeros and limited to 15 significant decimals.
pub fn uint64_to_amount(amount: u64) -> String {
    let mut value = Decimal::from(amount) / Decimal::from(SATOSHI);
    value.rescale(AMOUNT_PRECISION);
    value.normalize().to_string()
}

/// Canonical decimal form of an amount string (trailing zeros trimmed).
pub fn canonicalize_amount(amount: &str) -> Result<String, GatewayError> {
    let value =
        Decimal::from_str(amount).map_err(|_| GatewayError::from(RippleError::InvalidAmount))?;
    Ok(value.normalize().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_currencies_pass_through() {
        assert_eq!(to_currency("USD").unwrap(), "USD");
        assert_eq!(from_currency("USD").unwrap(), "USD");
        assert!(to_currency("US").is_err());
    }

    #[test]
    fn custom_currencies_round_trip() {
        for name in ["GOLD", "MYTOKEN", "ABCDEFGHIJKLMNOPQRS", "GOLD0", "x0y0"] {
            let encoded = to_currency(name).unwrap();
            assert_eq!(encoded.len(), 40, "{name}");
            assert!(encoded.starts_with("80"));
            assert_eq!(from_currency(&encoded).unwrap(), name, "{name}");
        }
    }

    #[test]
    fn long_currencies_truncate_to_19_bytes() {
        let encoded = to_currency("ABCDEFGHIJKLMNOPQRSTUVWXYZ").unwrap();
        assert_eq!(from_currency(&encoded).unwrap(), "ABCDEFGHIJKLMNOPQRS");
    }

    #[test]
    fn malformed_currency_fields_are_rejected(){
        assert!(from_currency(&"8".repeat(41)).is_err());
        assert!(from_currency(&format!("70{}", "00".repeat(19))).is_err());
    }

    #[test]
    fn amounts_round_trip_through_fixed_point() {
        for (text, units) in [
            ("1", 100_000_000u64),
            ("0.5", 50_000_000),
            ("123.45678901", 12_345_678_901),
            ("0.00000001", 1),
        ] {
            assert_eq!(amount_to_uint64(text).unwrap(), units, "{text}");
            assert_eq!(uint64_to_amount(units), text, "{units}");
        }
    }

    #[test]
    fn amount_strings_canonicalize_by_trimming_zeros() {
        assert_eq!(canonicalize_amount("1.500000").unwrap(), "1.5");
        assert_eq!(canonicalize_amount("2.000").unwrap(), "2");
        assert_eq!(uint64_to_amount(150_000_000), "1.5");
        assert_eq!(uint64_to_amount(200_000_000), "2");
        assert!(amount_to_uint64("pickles").is_err());
    }

    #[test]
    fn reserve_scales_with_owned_lines() {
        assert_eq!(calculate_reserve(0), 20_000_000);
        assert_eq!(calculate_reserve(2), 30_000_000);
    }

    #[test]
    fn engine_results_map_to_stable_codes() {
        assert_eq!(
            translate_engine_result("tecPATH_DRY"),
            RippleError::InvalidCurrencyOrNoTrustline
        );
        assert_eq!(
            translate_engine_result("tecUNFUNDED_PAYMENT"),
            RippleError::InsufficientXrp
        );
        assert_eq!(
            translate_engine_result("tecNO_DST_INSUF_XRP"),
            RippleError::SubmitErrorFeeLost
        );
        assert_eq!(translate_engine_result("temBAD_FEE"), RippleError::SubmitError);
    }

    #[test]
    fn trust_set_flags_combine_with_or() {
        let flags = TF_FULLY_CANONICAL_SIG | 131_072;
        assert_eq!(flags & TF_FULLY_CANONICAL_SIG, TF_FULLY_CANONICAL_SIG);
        assert_eq!(flags & 131_072, 131_072);
    }

    #[test]
    fn lines_membership_is_case_insensitive_on_currency() {
        let lines = Lines(vec![Line {
            account: "rIssuer".into(),
            currency: "80474f4c44".into(),
            balance: "10".into(),
            ..Line::default()
        }]);
        assert!(lines.contains("rIssuer", "80474F4C44"));
        assert!(!lines.contains("rOther", "80474f4c44"));
    }

    #[test]
    fn payment_tx_serializes_ledger_field_names() {
        let amount = CurrencyAmount {
            value: "1".into(),
            currency: "GOLD".into(),
            issuer: "rZ".into(),
        };
        let tx = PaymentAssetTx {
            transaction_type: "Payment",
            account: "rX".into(),
            destination: "rY".into(),
            amount: amount.clone(),
            send_max: amount,
            flags: TF_FULLY_CANONICAL_SIG,
            fee: DEFAULT_FEE,
            last_ledger_sequence: 1234,
        };
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["TransactionType"], "Payment");
        assert_eq!(value["SendMax"], value["Amount"]);
        assert_eq!(value["LastLedgerSequence"], 1234);
        assert_eq!(value["Fee"], "10000");
    }
}
