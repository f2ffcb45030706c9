//! Bitcoin broadcast-node client.
//!
//! Speaks JSON-RPC to Bitcoin Core (HTTP POST mode, basic auth). Used by the
//! Counterparty backend to broadcast signed transactions and to probe
//! confirmation counts. In the `dev` environment broadcasts are stubbed out
//! with a literal success id so the full flow can run without spending coins.

use serde_json::{Value, json};
use std::time::Duration;

use crate::config::{Config, Env};
use crate::errors::{CounterpartyError, GatewayError};

/// Probe result returned by the dev-mode confirmation stub.
const DEV_STUB_TXID: &str = "success";
const DEV_STUB_CONFIRMATIONS: u64 = 777;

pub const RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct BitcoinClient {
    http: reqwest::Client,
    host: String,
    user: String,
    password: String,
    env: Env,
}

impl BitcoinClient {
    pub fn new(config: &Config, env: Env) -> Self {
        BitcoinClient {
            http: reqwest::Client::new(),
            host: config.btc_host.clone(),
            user: config.btc_user.clone(),
            password: config.btc_password.clone(),
            env,
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let payload = json!({
            "jsonrpc": "1.0",
            "id": "chaingate",
            "method": method,
            "params": params,
        });
        let response = self
            .http
            .post(&self.host)
            .basic_auth(&self.user, Some(&self.password))
            .timeout(RPC_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::from(CounterpartyError::Timeout)
                } else {
                    tracing::error!(method, error = %e, "bitcoin rpc transport failure");
                    GatewayError::from(CounterpartyError::MiscError)
                }
            })?;

        let body: Value = response.json().await.map_err(|e| {
            tracing::error!(method, error = %e, "bitcoin rpc returned unparseable body");
            GatewayError::from(CounterpartyError::MiscError)
        })?;
        if !body["error"].is_null() {
            tracing::error!(method, error = %body["error"], "bitcoin rpc error");
            return Err(CounterpartyError::MiscError.into());
        }
        Ok(body["result"].clone())
    }

    /// Transmits a hex-encoded signed transaction and returns its txid.
    pub async fn send_raw_transaction(&self, tx_hex: &str) -> Result<String, GatewayError> {
        if self.env.is_dev() {
            return Ok(DEV_STUB_TXID.to_string());
        }
        let result = self
            .rpc("sendrawtransaction", json!([tx_hex]))
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CounterpartyError::MiscError.into())
    }

    /// Confirmation count for a broadcast transaction, 0 while unconfirmed.
    pub async fn get_confirmations(&self, txid: &str) -> Result<u64, GatewayError> {
        if txid == DEV_STUB_TXID {
            return Ok(DEV_STUB_CONFIRMATIONS);
        }
        let result = self
            .rpc("getrawtransaction", json!([txid, 1]))
            .await?;
        Ok(result["confirmations"].as_u64().unwrap_or(0))
    }

    pub async fn get_block_count(&self) -> Result<i64, GatewayError> {
        let result = self.rpc("getblockcount", json!([])).await?;
        result
            .as_i64()
            .ok_or_else(|| CounterpartyError::MiscError.into())
    }

    /// Asks the node's wallet for a fresh receiving address.
    pub async fn get_new_address(&self) -> Result<String, GatewayError> {
        let result = self.rpc("getnewaddress", json!([""])).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CounterpartyError::MiscError.into())
    }

    /// Total BTC held by an address in satoshis.
    ///
    /// The broadcast node does not index arbitrary addresses, so this scans
    /// the UTXO set for the address descriptor.
    pub async fn get_balance(&self, address: &str) -> Result<u64, GatewayError> {
        let descriptor = format!("addr({address})");
        let result = self
            .rpc("scantxoutset", json!(["start", [descriptor]]))
            .await?;
        let total_btc = result["total_amount"].as_f64().unwrap_or(0.0);
        Ok((total_btc * crate::chain::counterparty::SATOSHI as f64) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_client() -> BitcoinClient {
        BitcoinClient {
            http: reqwest::Client::new(),
            host: "http://127.0.0.1:0".into(),
            user: "rpc".into(),
            password: "rpc".into(),
            env: Env::Dev,
        }
    }

    #[tokio::test]
    async fn dev_mode_stubs_broadcast() {
        let client = dev_client();
        let txid = client.send_raw_transaction("deadbeef").await.unwrap();
        assert_eq!(txid, "success");
    }

    #[tokio::test]
    async fn dev_stub_txid_reports_as_deeply_confirmed() {
        let client = dev_client();
        assert_eq!(client.get_confirmations("success").await.unwrap(), 777);
    }
}
