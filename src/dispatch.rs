//! Two-level request dispatch.
//!
//! A `(backend, request type)` pair selects exactly one handler. The table
//! is static; a missing entry means the function is not available on the
//! selected backend and yields 404 with the corresponding taxonomy code.

use futures_util::future::BoxFuture;
use axum::response::Response;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::app::AppState;
use crate::chain::BackendId;
use crate::errors::{self, GenericError};
use crate::handlers::{counterparty, general, ripple};
use crate::pipeline::RequestContext;

/// The operation a route resolves to, independent of backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    Address,
    WalletCreate,
    WalletPayment,
    WalletBalance,
    ActivateAddress,
    Asset,
    GetAsset,
    Dividend,
    GetDividend,
    Issuances,
    Ledger,
    SimplePayment,
    PaymentRetry,
    GetPayment,
    PaymentsByAddress,
    Blocks,
}

impl RequestType {
    pub const fn as_str(self) -> &'static str {
        match self {
            RequestType::Address => "address",
            RequestType::WalletCreate => "walletCreate",
            RequestType::WalletPayment => "walletPayment",
            RequestType::WalletBalance => "walletBalance",
            RequestType::ActivateAddress => "activateaddress",
            RequestType::Asset => "asset",
            RequestType::GetAsset => "getasset",
            RequestType::Dividend => "dividend",
            RequestType::GetDividend => "getdividend",
            RequestType::Issuances => "issuances",
            RequestType::Ledger => "ledger",
            RequestType::SimplePayment => "simplepayment",
            RequestType::PaymentRetry => "paymentretry",
            RequestType::GetPayment => "getpayment",
            RequestType::PaymentsByAddress => "paymentbyaddress",
            RequestType::Blocks => "blocks",
        }
    }
}

/// Parsed body and path captures handed to a dispatched handler.
#[derive(Debug, Clone)]
pub struct HandlerArgs {
    pub body: Value,
    pub path_param: Option<String>,
}

pub type HandlerFuture = BoxFuture<'static, Response>;
pub type HandlerFn = fn(Arc<AppState>, RequestContext, HandlerArgs) -> HandlerFuture;

/// The function to call for each respective backend and request type.
static DISPATCH_TABLE: Lazy<HashMap<(BackendId, RequestType), HandlerFn>> = Lazy::new(|| {
    use BackendId::{Counterparty, Ripple};
    let mut table: HashMap<(BackendId, RequestType), HandlerFn> = HashMap::new();

    // Address and wallet handlers
    table.insert((Counterparty, RequestType::Address), counterparty::address_create);
    table.insert((Counterparty, RequestType::WalletCreate), counterparty::wallet_create);
    table.insert((Counterparty, RequestType::WalletPayment), counterparty::wallet_send);
    table.insert((Counterparty, RequestType::WalletBalance), counterparty::wallet_balance);
    table.insert((Counterparty, RequestType::ActivateAddress), counterparty::activate_address);

    // Asset handlers
    table.insert((Counterparty, RequestType::Asset), counterparty::asset_create);
    table.insert((Counterparty, RequestType::GetAsset), general::get_asset);
    table.insert((Counterparty, RequestType::Dividend), counterparty::dividend_create);
    table.insert((Counterparty, RequestType::GetDividend), counterparty::get_dividend);
    table.insert((Counterparty, RequestType::Issuances), counterparty::asset_issuances);
    table.insert((Counterparty, RequestType::Ledger), counterparty::asset_ledger);

    // Payment handlers
    table.insert((Counterparty, RequestType::SimplePayment), general::payment_create);
    table.insert((Counterparty, RequestType::PaymentRetry), general::payment_retry);
    table.insert((Counterparty, RequestType::GetPayment), general::get_payment);
    table.insert((Counterparty, RequestType::PaymentsByAddress), general::get_payments_by_address);
    table.insert((Counterparty, RequestType::Blocks), general::get_blocks);

    table.insert((Ripple, RequestType::WalletCreate), ripple::wallet_create);
    table.insert((Ripple, RequestType::WalletPayment), ripple::wallet_send);
    table.insert((Ripple, RequestType::WalletBalance), ripple::wallet_balance);
    table.insert((Ripple, RequestType::ActivateAddress), ripple::activate_address);

    table.insert((Ripple, RequestType::Asset), ripple::asset_create);
    table.insert((Ripple, RequestType::GetAsset), general::get_asset);

    table.insert((Ripple, RequestType::SimplePayment), general::payment_create);
    table.insert((Ripple, RequestType::PaymentRetry), general::payment_retry);
    table.insert((Ripple, RequestType::GetPayment), general::get_payment);
    table.insert((Ripple, RequestType::PaymentsByAddress), general::get_payments_by_address);
    table.insert((Ripple, RequestType::Blocks), general::get_blocks);

    table
});

/// Fires the handler registered for the resolved backend and request type.
pub async fn dispatch(
    state: Arc<AppState>,
    ctx: RequestContext,
    request_type: RequestType,
    args: HandlerArgs,
) -> Response {
    tracing::info!(
        request_id = %ctx.request_id,
        backend = %ctx.backend,
        request_type = request_type.as_str(),
        "dispatching"
    );

    let Some(handler) = DISPATCH_TABLE.get(&(ctx.backend, request_type)) else {
        tracing::info!(
            backend = %ctx.backend,
            request_type = request_type.as_str(),
            "no handler registered"
        );
        return errors::not_found(
            &ctx.request_id,
            GenericError::FunctionNotAvailable.code(),
            GenericError::FunctionNotAvailable.description().to_string(),
        );
    };
    handler(state, ctx, args).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_counterparty_operation_is_registered() {
        for request_type in [
            RequestType::Address,
            RequestType::WalletCreate,
            RequestType::WalletPayment,
            RequestType::WalletBalance,
            RequestType::ActivateAddress,
            RequestType::Asset,
            RequestType::GetAsset,
            RequestType::Dividend,
            RequestType::GetDividend,
            RequestType::Issuances,
            RequestType::Ledger,
            RequestType::SimplePayment,
            RequestType::PaymentRetry,
            RequestType::GetPayment,
            RequestType::PaymentsByAddress,
        ] {
            assert!(
                DISPATCH_TABLE.contains_key(&(BackendId::Counterparty, request_type)),
                "{request_type:?}"
            );
        }
    }

    #[test]
    fn ripple_omits_counterparty_only_operations() {
        // Dividends and numeric issuance history have no ledger counterpart.
        assert!(!DISPATCH_TABLE.contains_key(&(BackendId::Ripple, RequestType::Dividend)));
        assert!(!DISPATCH_TABLE.contains_key(&(BackendId::Ripple, RequestType::Issuances)));
        assert!(!DISPATCH_TABLE.contains_key(&(BackendId::Ripple, RequestType::Ledger)));
        assert!(!DISPATCH_TABLE.contains_key(&(BackendId::Ripple, RequestType::Address)));
        // But the shared operations are present.
        assert!(DISPATCH_TABLE.contains_key(&(BackendId::Ripple, RequestType::WalletPayment)));
        assert!(DISPATCH_TABLE.contains_key(&(BackendId::Ripple, RequestType::GetPayment)));
    }
}
