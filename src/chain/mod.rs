//! Backend adapters.
//!
//! One adapter per supported blockchain ecosystem. Adapters expose the same
//! conceptual operations (compose, sign, broadcast, balance and history
//! queries, confirmation probes) and translate remote-node failures into the
//! closed error taxonomy at this boundary.

pub mod bitcoin;
pub mod counterparty;
pub mod ripple;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A supported blockchain backend.
///
/// The architecture admits more; resolution order for an inbound request is
/// body `blockchainId`, then the first path segment, then the access key's
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    Counterparty,
    Ripple,
}

impl BackendId {
    pub const fn as_str(self) -> &'static str {
        match self {
            BackendId::Counterparty => "counterparty",
            BackendId::Ripple => "ripple",
        }
    }

    pub const fn variants() -> &'static [BackendId] {
        &[BackendId::Counterparty, BackendId::Ripple]
    }
}

impl Display for BackendId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackendId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counterparty" => Ok(BackendId::Counterparty),
            "ripple" => Ok(BackendId::Ripple),
            _ => Err(()),
        }
    }
}

/// A (address, asset, quantity) balance row returned by balance queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub address: String,
    pub asset: String,
    pub quantity: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_ids_round_trip() {
        for backend in BackendId::variants() {
            assert_eq!(backend.as_str().parse::<BackendId>(), Ok(*backend));
        }
        assert!("coloredcoins".parse::<BackendId>().is_err());
    }

    #[test]
    fn backend_id_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(BackendId::Counterparty).unwrap(),
            serde_json::json!("counterparty")
        );
    }
}
