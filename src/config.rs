//! Configuration for the gateway.
//!
//! A single JSON file is read at startup; the path comes from `--config` or
//! the `CONFIG` environment variable. The `ENV` environment variable selects
//! the runtime environment: `dev` stubs out broadcasts and skews fee
//! constants downward so the full flow can run against test nodes.

use clap::Parser;
use serde::Deserialize;
use std::env;
use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;

/// CLI arguments for the gateway server.
#[derive(Parser, Debug)]
#[command(name = "chaingate")]
#[command(about = "Asset gateway HTTP server")]
struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "chaingate.json")]
    config: PathBuf,
}

/// Runtime environment selected by the `ENV` variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Env {
    Dev,
    Production,
}

impl Env {
    pub fn from_env() -> Self {
        match env::var("ENV").as_deref() {
            Ok("dev") | Err(_) => Env::Dev,
            Ok(_) => Env::Production,
        }
    }

    pub fn is_dev(self) -> bool {
        matches!(self, Env::Dev)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Env::Dev => "dev",
            Env::Production => "production",
        }
    }
}

/// An internal funding wallet used to activate client addresses.
#[derive(Debug, Clone, Deserialize)]
pub struct MasterWallet {
    pub address: String,
    pub passphrase: String,
}

/// Server configuration, deserialized from the JSON configuration file.
///
/// Key names match the historical configuration file format, hence the
/// per-field renames rather than a single rename_all rule.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "config_defaults::host")]
    pub host: IpAddr,
    #[serde(default = "config_defaults::port")]
    pub port: u16,

    // Gateway store
    #[serde(rename = "dburl")]
    pub db_url: String,
    pub schema: String,
    #[serde(rename = "dbuser")]
    pub db_user: String,
    #[serde(rename = "dbpassword")]
    pub db_password: String,

    // Bitcoin broadcast node
    #[serde(rename = "btchost")]
    pub btc_host: String,
    #[serde(rename = "btcuser")]
    pub btc_user: String,
    #[serde(rename = "btcpassword")]
    pub btc_password: String,

    // Counterparty composition node
    #[serde(rename = "counterpartyhost")]
    pub counterparty_host: String,
    #[serde(rename = "counterpartyuser")]
    pub counterparty_user: String,
    #[serde(rename = "counterpartypassword")]
    pub counterparty_password: String,
    /// Transaction encoding requested from the composition node: "auto",
    /// "multisig" or "opreturn".
    #[serde(rename = "counterpartytransactionencoding")]
    pub counterparty_transaction_encoding: String,
    /// Direct path to the composition node's backing SQLite database, used
    /// for read-only fallback when the RPC interface is unavailable.
    #[serde(rename = "counterpartydblocation")]
    pub counterparty_db_location: String,
    #[serde(rename = "counterpartyWallets", default)]
    pub counterparty_wallets: Vec<MasterWallet>,

    // Ripple node
    #[serde(rename = "rippleHost")]
    pub ripple_host: String,
    /// Offset added to the current validated ledger index to form
    /// `LastLedgerSequence` so abandoned transactions definitively expire.
    #[serde(rename = "rippleLastLedgerSequenceOffset")]
    pub ripple_last_ledger_sequence_offset: u64,
    #[serde(rename = "rippleWallets", default)]
    pub ripple_wallets: Vec<MasterWallet>,

    // Telemetry forwarder
    #[serde(rename = "fluentHost")]
    pub fluent_host: String,
}

mod config_defaults {
    use std::net::{IpAddr, Ipv4Addr};

    pub fn host() -> IpAddr {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    }

    pub fn port() -> u16 {
        8081
    }
}

impl Config {
    /// Loads configuration from the path given by `--config` / `CONFIG`.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let args = CliArgs::parse();
        Self::load_from(&args.config)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("unable to read configuration file {}: {e}", path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|e| format!("unable to parse configuration file {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Connection URL for the gateway's Postgres store.
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}/{}",
            self.db_user, self.db_password, self.db_url, self.schema
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "dburl": "db.internal:5432",
        "schema": "gateway",
        "dbuser": "gw",
        "dbpassword": "pw",
        "btchost": "http://btc.internal:8332",
        "btcuser": "rpc",
        "btcpassword": "rpcpw",
        "counterpartyhost": "http://cp.internal:4000/api/",
        "counterpartyuser": "rpc",
        "counterpartypassword": "rpcpw",
        "counterpartytransactionencoding": "multisig",
        "counterpartydblocation": "/var/lib/counterparty/counterparty.db",
        "counterpartyWallets": [
            {"address": "1E5YgFkC4HNHwWTF5iUdDbKpzry1SRLv8e", "passphrase": "one two three four five six seven eight nine ten eleven twelve"}
        ],
        "rippleHost": "http://ripple.internal:5005",
        "rippleLastLedgerSequenceOffset": 10,
        "rippleWallets": [
            {"address": "rpu8gxvRzQ2JLQMN7Goxs6x9zffH3sjQBd", "passphrase": "one two three four five six seven eight nine ten eleven twelve"}
        ],
        "fluentHost": "http://fluent.internal:8888"
    }"#;

    #[test]
    fn parses_the_full_configuration_file() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.counterparty_transaction_encoding, "multisig");
        assert_eq!(config.ripple_last_ledger_sequence_offset, 10);
        assert_eq!(config.ripple_wallets.len(), 1);
        assert_eq!(
            config.database_url(),
            "postgres://gw:pw@db.internal:5432/gateway"
        );
    }

    #[test]
    fn bind_address_can_be_overridden() {
        let mut value: serde_json::Value = serde_json::from_str(SAMPLE).unwrap();
        value["host"] = serde_json::json!("127.0.0.1");
        value["port"] = serde_json::json!(9099);
        let config: Config = serde_json::from_value(value).unwrap();
        assert_eq!(config.host.to_string(), "127.0.0.1");
        assert_eq!(config.port, 9099);
    }
}
