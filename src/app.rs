//! Shared application state threaded through every handler.

use crate::chain::bitcoin::BitcoinClient;
use crate::chain::counterparty::CounterpartyClient;
use crate::chain::ripple::RippleClient;
use crate::config::{Config, Env};
use crate::fluent::FluentSink;
use crate::locks::AddressLocks;
use crate::store::Store;

/// Everything a handler needs: configuration, the store, one client per
/// remote node, the per-backend address locks and the telemetry sink.
/// Constructed once at startup; all fields are read-only or internally
/// synchronized afterwards.
pub struct AppState {
    pub config: Config,
    pub env: Env,
    pub store: Store,
    pub bitcoin: BitcoinClient,
    pub counterparty: CounterpartyClient,
    pub ripple: RippleClient,
    pub counterparty_locks: AddressLocks,
    pub ripple_locks: AddressLocks,
    pub fluent: FluentSink,
}

impl AppState {
    pub async fn new(config: Config, env: Env) -> Result<Self, Box<dyn std::error::Error>> {
        let store = Store::connect(&config).await?;
        let bitcoin = BitcoinClient::new(&config, env);
        let counterparty = CounterpartyClient::new(&config, env);
        let ripple = RippleClient::new(&config, env);
        let fluent = FluentSink::new(&config, env);
        Ok(AppState {
            config,
            env,
            store,
            bitcoin,
            counterparty,
            ripple,
            counterparty_locks: AddressLocks::new(),
            ripple_locks: AddressLocks::new(),
            fluent,
        })
    }
}
