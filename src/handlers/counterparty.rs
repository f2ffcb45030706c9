//! Orchestrator handlers for the Bitcoin-based meta-protocol backend.
//!
//! Background flows serialize per source address, sleep a mempool-settle
//! interval after taking the address lock, then run compose → sign →
//! broadcast, persisting the outcome of each stage. Composition happens on
//! the remote node, signing is local, broadcast goes through the Bitcoin
//! node.

use std::sync::Arc;
use std::time::Duration;

use crate::app::AppState;
use crate::chain::counterparty::{
    self, BACKEND_POLL_RATE_MS, DIVISIBLE_DIVISIBILITY, signer, wallet,
};
use crate::dispatch::{HandlerArgs, HandlerFuture};
use crate::errors::{self, CounterpartyError, GatewayError, GenericError};
use crate::fluent::{SEVERITY_ERROR, SEVERITY_EVENT};
use crate::ids;
use crate::pipeline::RequestContext;
use crate::types::{
    Activation, AddressAmount, AddressBalances, AddressReply, Amount, Asset, AssetBalances,
    AssetIssuances, Dividend, Issuance, RequestStatus, Wallet, WalletPayment,
};

use super::general::probe_confirmations;
use super::{created, ok};

/// Number of transactions an address is activated for when unspecified.
const DEFAULT_ACTIVATION_AMOUNT: u64 = 100;

/// Mempool-settle interval before composing a send.
const SEND_SETTLE_MS: u64 = BACKEND_POLL_RATE_MS + 10_000;
/// Mempool-settle interval before composing an issuance or dividend.
const ISSUANCE_SETTLE_MS: u64 = BACKEND_POLL_RATE_MS + 3_000;

/// `POST /wallet`: offline generation of a new HD wallet. Nothing touches
/// the chain and no secret is persisted.
pub fn wallet_create(
    _state: Arc<AppState>,
    ctx: RequestContext,
    args: HandlerArgs,
) -> HandlerFuture {
    Box::pin(async move {
        let number_of_addresses = args.body["numberOfAddresses"].as_u64().unwrap_or(0) as usize;

        let hd_wallet = match wallet::create_wallet(number_of_addresses) {
            Ok(hd_wallet) => hd_wallet,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "wallet generation failed");
                return errors::server_error(&ctx.request_id);
            }
        };
        tracing::info!(
            request_id = %ctx.request_id,
            first_address = hd_wallet.addresses[0],
            access_key = ctx.access_key,
            "created a new wallet"
        );

        created(&Wallet {
            passphrase: hd_wallet.passphrase,
            hex_seed: hd_wallet.hex_seed,
            addresses: hd_wallet.addresses,
            blockchain_id: ctx.backend.to_string(),
            request_id: ctx.request_id.to_string(),
            ..Wallet::default()
        })
    })
}

/// `POST /payment/address`: derives a fresh address from the broadcast
/// node's wallet and attaches it to the caller's access key.
pub fn address_create(
    state: Arc<AppState>,
    ctx: RequestContext,
    _args: HandlerArgs,
) -> HandlerFuture {
    Box::pin(async move {
        let new_address = match state.bitcoin.get_new_address().await {
            Ok(address) => address,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "unable to create address");
                return errors::server_error(&ctx.request_id);
            }
        };

        if let Err(e) = state
            .store
            .create_secondary_address(&ctx.access_key, &new_address)
            .await
        {
            tracing::error!(request_id = %ctx.request_id, error = %e, "unable to persist new address");
            return errors::server_error(&ctx.request_id);
        }
        tracing::info!(
            request_id = %ctx.request_id,
            address = new_address,
            access_key = ctx.access_key,
            "created secondary address"
        );

        created(&AddressReply {
            value: new_address,
            request_id: ctx.request_id.to_string(),
            ..AddressReply::default()
        })
    })
}

/// `POST /wallet/payment`: accepts an asset send, persists the payment row
/// and schedules the on-chain work.
pub fn wallet_send(state: Arc<AppState>, ctx: RequestContext, args: HandlerArgs) -> HandlerFuture {
    Box::pin(async move {
        let body = &args.body;
        let passphrase = body["passphrase"].as_str().unwrap_or_default().to_string();
        let source_address = body["sourceAddress"].as_str().unwrap_or_default().to_string();
        let destination_address = body["destinationAddress"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let asset = body["asset"].as_str().unwrap_or_default().to_string();
        let quantity = body["quantity"].as_u64().unwrap_or(0);
        let payment_tag = body["paymentTag"].as_str().map(str::to_string);

        let payment_id = ids::generate_payment_id();
        tracing::info!(
            request_id = %ctx.request_id,
            payment_id,
            source_address,
            destination_address,
            asset,
            quantity,
            "wallet send accepted"
        );

        if let Err(e) = state
            .store
            .insert_payment(
                &ctx.access_key,
                ctx.backend.as_str(),
                &payment_id,
                &source_address,
                &destination_address,
                &asset,
                "",
                quantity,
                RequestStatus::Valid,
                counterparty::DEFAULT_TX_FEE,
                payment_tag.as_deref(),
            )
            .await
        {
            tracing::error!(request_id = %ctx.request_id, error = %e, "payment insert failed");
            return errors::server_error(&ctx.request_id);
        }

        let snapshot = WalletPayment {
            payment_id: payment_id.clone(),
            source_address: source_address.clone(),
            destination_address: destination_address.clone(),
            asset: asset.clone(),
            quantity,
            payment_tag: payment_tag.unwrap_or_default(),
            request_id: ctx.request_id.to_string(),
        };
        let response = created(&snapshot);

        tokio::spawn(delegated_send(
            state,
            ctx,
            passphrase,
            source_address,
            destination_address,
            asset,
            quantity,
            payment_id,
        ));

        response
    })
}

/// Background send: compose → sign → broadcast under the source-address
/// lock. The payment row must already exist; each failure point records its
/// taxonomy code and terminates the flow.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn delegated_send(
    state: Arc<AppState>,
    ctx: RequestContext,
    passphrase: String,
    source_address: String,
    destination_address: String,
    asset: String,
    quantity: u64,
    payment_id: String,
) -> Result<String, GatewayError> {
    let public_key = match wallet::get_public_key(&passphrase, &source_address) {
        Ok(public_key) => public_key,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "public key derivation failed");
            record_payment_error(
                &state,
                &ctx,
                &payment_id,
                GenericError::InvalidPassphrase.code(),
                GenericError::InvalidPassphrase.description(),
            )
            .await;
            return Err(CounterpartyError::SigningError.into());
        }
    };

    let lock = state.counterparty_locks.for_address(&source_address);
    let _guard = lock.lock().await;
    tracing::info!(request_id = %ctx.request_id, source_address, "address locked");

    // Let any prior transaction from this address reach the composition
    // node's mempool view before composing against its UTXO set.
    tokio::time::sleep(Duration::from_millis(SEND_SETTLE_MS)).await;

    let unsigned = match state
        .counterparty
        .create_send(&source_address, &destination_address, &asset, quantity, &public_key)
        .await
    {
        Ok(unsigned) => unsigned,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "compose failed");
            record_payment_error(&state, &ctx, &payment_id, e.code(), e.description()).await;
            return Err(e);
        }
    };
    tracing::info!(request_id = %ctx.request_id, quantity, asset, "composed send");

    let signed = match signer::sign_raw_transaction(&passphrase, &unsigned) {
        Ok(signed) => signed,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "signing failed");
            let err = CounterpartyError::SigningError;
            record_payment_error(&state, &ctx, &payment_id, err.code(), err.description()).await;
            return Err(err.into());
        }
    };

    // Keep the signed transaction so a failed broadcast can be retried
    // without signing again.
    if let Err(e) = state
        .store
        .update_payment_signed_raw_tx(&ctx.access_key, &payment_id, &signed)
        .await
    {
        tracing::error!(request_id = %ctx.request_id, error = %e, "signed tx persist failed");
    }

    let broadcast_tx_id = match state.bitcoin.send_raw_transaction(&signed).await {
        Ok(txid) => txid,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "broadcast failed");
            let err = CounterpartyError::BroadcastError;
            record_payment_error(&state, &ctx, &payment_id, err.code(), err.description()).await;
            return Err(err.into());
        }
    };

    if let Err(e) = state
        .store
        .update_payment_complete(&ctx.access_key, &payment_id, &broadcast_tx_id)
        .await
    {
        tracing::error!(request_id = %ctx.request_id, error = %e, "completion update failed");
    }
    state
        .fluent
        .log_context(SEVERITY_EVENT, &ctx, "payment broadcast complete");
    tracing::info!(request_id = %ctx.request_id, broadcast_tx_id, "send complete");

    Ok(broadcast_tx_id)
}

async fn record_payment_error(
    state: &Arc<AppState>,
    ctx: &RequestContext,
    payment_id: &str,
    code: i64,
    description: &str,
) {
    if let Err(e) = state
        .store
        .update_payment_with_error(&ctx.access_key, payment_id, code, description)
        .await
    {
        tracing::error!(request_id = %ctx.request_id, error = %e, "error update failed");
    }
    state.fluent.log_context(SEVERITY_ERROR, ctx, description);
}

/// `GET /wallet/balances/{address}`: asset balances plus the BTC balance
/// and the number of transactions that BTC can fund.
pub fn wallet_balance(
    state: Arc<AppState>,
    ctx: RequestContext,
    args: HandlerArgs,
) -> HandlerFuture {
    Box::pin(async move {
        let address = args.path_param.unwrap_or_default();
        if address.len() != 34 {
            tracing::error!(request_id = %ctx.request_id, address, "invalid address");
            return errors::bad_request(
                &ctx.request_id,
                GenericError::InvalidAddress.code(),
                GenericError::InvalidAddress.description().to_string(),
            );
        }

        let result = match state.counterparty.get_balances_by_address(&address).await {
            Ok(result) => result,
            Err(e) => {
                return errors::server_error_with(
                    &ctx.request_id,
                    e.code(),
                    e.description().to_string(),
                );
            }
        };

        let mut balances: Vec<Amount> = result
            .into_iter()
            .map(|balance| Amount {
                asset: balance.asset,
                quantity: balance.quantity,
                ..Amount::default()
            })
            .collect();

        let btc_balance = match state.bitcoin.get_balance(&address).await {
            Ok(btc_balance) => btc_balance,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "BTC balance probe failed");
                0
            }
        };
        balances.push(Amount {
            asset: "BTC".to_string(),
            quantity: btc_balance,
            ..Amount::default()
        });

        ok(&AddressBalances {
            address,
            blockchain_id: ctx.backend.to_string(),
            number_of_transactions: state.counterparty.calculate_number_of_transactions(btc_balance),
            balances,
            request_id: ctx.request_id.to_string(),
        })
    })
}

/// `POST /wallet/activate/address/{address}`: funds an address with enough
/// BTC for `amount` future transactions from an internal wallet.
pub fn activate_address(
    state: Arc<AppState>,
    ctx: RequestContext,
    args: HandlerArgs,
) -> HandlerFuture {
    Box::pin(async move {
        let address = args.path_param.unwrap_or_default();
        if address.is_empty() {
            return errors::bad_request(
                &ctx.request_id,
                GenericError::InvalidAddress.code(),
                GenericError::InvalidAddress.description().to_string(),
            );
        }

        let amount = args.body["amount"].as_u64().unwrap_or(DEFAULT_ACTIVATION_AMOUNT);
        let activation_id = ids::generate_activation_id();
        tracing::info!(
            request_id = %ctx.request_id,
            activation_id,
            address,
            amount,
            "activation accepted"
        );

        if let Err(e) = state
            .store
            .insert_activation(&ctx.access_key, &activation_id, ctx.backend.as_str(), &address, amount)
            .await
        {
            tracing::error!(request_id = %ctx.request_id, error = %e, "activation insert failed");
            return errors::server_error(&ctx.request_id);
        }

        let snapshot = Activation {
            address: address.clone(),
            amount,
            activation_id: activation_id.clone(),
            status: RequestStatus::Valid.to_string(),
            request_id: ctx.request_id.to_string(),
            ..Activation::default()
        };
        let response = created(&snapshot);

        tokio::spawn(delegated_activate_address(state, ctx, address, amount, activation_id));

        response
    })
}

/// Background activation: sends `amount × (dust + fee)` BTC from an
/// internal wallet to the target address. The funding payment shares the
/// activation's identifier.
async fn delegated_activate_address(
    state: Arc<AppState>,
    ctx: RequestContext,
    address_to_activate: String,
    amount: u64,
    activation_id: String,
) -> Result<String, GatewayError> {
    let Some(funding_wallet) = state.config.counterparty_wallets.first().cloned() else {
        tracing::error!(request_id = %ctx.request_id, "no internal wallet configured");
        return Err(CounterpartyError::MiscError.into());
    };

    let (quantity, asset) = state.counterparty.calculate_fee_amount(amount);
    tracing::info!(
        request_id = %ctx.request_id,
        activation_id,
        quantity,
        "funding activation"
    );

    if let Err(e) = state
        .store
        .insert_payment(
            &ctx.access_key,
            ctx.backend.as_str(),
            &activation_id,
            &funding_wallet.address,
            &address_to_activate,
            asset,
            "",
            quantity,
            RequestStatus::Valid,
            counterparty::DEFAULT_TX_FEE,
            None,
        )
        .await
    {
        tracing::error!(request_id = %ctx.request_id, error = %e, "activation payment insert failed");
        return Err(CounterpartyError::MiscError.into());
    }

    match delegated_send(
        state.clone(),
        ctx.clone(),
        funding_wallet.passphrase,
        funding_wallet.address,
        address_to_activate,
        asset.to_string(),
        quantity,
        activation_id.clone(),
    )
    .await
    {
        Ok(txid) => {
            state
                .fluent
                .log_context(SEVERITY_EVENT, &ctx, "address activation complete");
            Ok(txid)
        }
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "activation send failed");
            Err(e)
        }
    }
}

/// `POST /asset`: issues a new asset under a generated numeric name. The
/// supplied name is retained as the asset's description.
pub fn asset_create(state: Arc<AppState>, ctx: RequestContext, args: HandlerArgs) -> HandlerFuture {
    Box::pin(async move {
        let body = &args.body;
        let passphrase = body["passphrase"].as_str().unwrap_or_default().to_string();
        let source_address = body["sourceAddress"].as_str().unwrap_or_default().to_string();
        let asset_description = body["asset"].as_str().unwrap_or_default().to_string();
        let quantity = body["quantity"].as_u64().unwrap_or(0);
        let divisible = body["divisible"].as_bool().unwrap_or(false);

        tracing::info!(
            request_id = %ctx.request_id,
            source_address,
            asset = asset_description,
            quantity,
            divisible,
            "asset issuance accepted"
        );

        let asset_name = match state.counterparty.generate_random_asset_name().await {
            Ok(asset_name) => asset_name,
            Err(e) => {
                return errors::server_error_with(
                    &ctx.request_id,
                    e.code(),
                    e.description().to_string(),
                );
            }
        };

        let asset_id = ids::generate_asset_id();
        tracing::info!(request_id = %ctx.request_id, asset_id, asset_name, "generated assetId");

        if let Err(e) = state
            .store
            .insert_asset(
                &ctx.access_key,
                ctx.backend.as_str(),
                &asset_id,
                &source_address,
                "",
                &asset_name,
                &asset_description,
                quantity,
                divisible,
                RequestStatus::Valid,
            )
            .await
        {
            tracing::error!(request_id = %ctx.request_id, error = %e, "asset insert failed");
            return errors::server_error(&ctx.request_id);
        }

        let snapshot = Asset {
            asset_id: asset_id.clone(),
            asset: asset_name.clone(),
            description: asset_description.clone(),
            quantity,
            divisible,
            source_address: source_address.clone(),
            status: RequestStatus::Valid.to_string(),
            request_id: ctx.request_id.to_string(),
            ..Asset::default()
        };
        let response = created(&snapshot);

        tokio::spawn(delegated_create_issuance(
            state,
            ctx,
            passphrase,
            source_address,
            asset_id,
            asset_name,
            asset_description,
            quantity,
            divisible,
        ));

        response
    })
}

/// Background issuance: compose → sign → broadcast under the source-address
/// lock.
#[allow(clippy::too_many_arguments)]
async fn delegated_create_issuance(
    state: Arc<AppState>,
    ctx: RequestContext,
    passphrase: String,
    source_address: String,
    asset_id: String,
    asset_name: String,
    asset_description: String,
    quantity: u64,
    divisible: bool,
) -> Result<String, GatewayError> {
    let public_key = match wallet::get_public_key(&passphrase, &source_address) {
        Ok(public_key) => public_key,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "public key derivation failed");
            record_asset_error(
                &state,
                &ctx,
                &asset_id,
                GenericError::InvalidPassphrase.code(),
                GenericError::InvalidPassphrase.description(),
            )
            .await;
            return Err(GenericError::InvalidPassphrase.into());
        }
    };

    let lock = state.counterparty_locks.for_address(&source_address);
    let _guard = lock.lock().await;
    tracing::info!(request_id = %ctx.request_id, source_address, "address locked");

    tokio::time::sleep(Duration::from_millis(ISSUANCE_SETTLE_MS)).await;

    let unsigned = match state
        .counterparty
        .create_issuance(
            &source_address,
            &asset_name,
            &asset_description,
            quantity,
            divisible,
            &public_key,
        )
        .await
    {
        Ok(unsigned) => unsigned,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "issuance compose failed");
            record_asset_error(&state, &ctx, &asset_id, e.code(), e.description()).await;
            return Err(e);
        }
    };
    tracing::info!(
        request_id = %ctx.request_id,
        quantity,
        asset_name,
        source_address,
        "composed issuance"
    );

    let signed = match signer::sign_raw_transaction(&passphrase, &unsigned) {
        Ok(signed) => signed,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "signing failed");
            let err = CounterpartyError::SigningError;
            record_asset_error(&state, &ctx, &asset_id, err.code(), err.description()).await;
            return Err(err.into());
        }
    };

    let broadcast_tx_id = match state.bitcoin.send_raw_transaction(&signed).await {
        Ok(txid) => txid,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "broadcast failed");
            let err = CounterpartyError::BroadcastError;
            record_asset_error(&state, &ctx, &asset_id, err.code(), err.description()).await;
            return Err(err.into());
        }
    };

    if let Err(e) = state
        .store
        .update_asset_complete(&ctx.access_key, &asset_id, &broadcast_tx_id)
        .await
    {
        tracing::error!(request_id = %ctx.request_id, error = %e, "completion update failed");
    }
    state
        .fluent
        .log_context(SEVERITY_EVENT, &ctx, "asset issuance complete");

    Ok(broadcast_tx_id)
}

async fn record_asset_error(
    state: &Arc<AppState>,
    ctx: &RequestContext,
    asset_id: &str,
    code: i64,
    description: &str,
) {
    if let Err(e) = state
        .store
        .update_asset_with_error(&ctx.access_key, asset_id, code, description)
        .await
    {
        tracing::error!(request_id = %ctx.request_id, error = %e, "error update failed");
    }
    state.fluent.log_context(SEVERITY_ERROR, ctx, description);
}

/// `POST /asset/dividend`: pays `quantityPerUnit` of the payout asset to
/// every holder of the base asset.
pub fn dividend_create(
    state: Arc<AppState>,
    ctx: RequestContext,
    args: HandlerArgs,
) -> HandlerFuture {
    Box::pin(async move {
        let body = &args.body;
        let passphrase = body["passphrase"].as_str().unwrap_or_default().to_string();
        let source_address = body["sourceAddress"].as_str().unwrap_or_default().to_string();
        let asset = body["asset"].as_str().unwrap_or_default().to_string();
        let dividend_asset = body["dividendAsset"].as_str().unwrap_or_default().to_string();
        let quantity_per_unit = body["quantityPerUnit"].as_u64().unwrap_or(0);

        tracing::info!(
            request_id = %ctx.request_id,
            source_address,
            asset,
            dividend_asset,
            quantity_per_unit,
            "dividend accepted"
        );

        let dividend_id = ids::generate_dividend_id();
        tracing::info!(request_id = %ctx.request_id, dividend_id, "generated dividendId");

        if let Err(e) = state
            .store
            .insert_dividend(
                &ctx.access_key,
                &dividend_id,
                &source_address,
                &asset,
                &dividend_asset,
                quantity_per_unit,
                RequestStatus::Valid,
            )
            .await
        {
            tracing::error!(request_id = %ctx.request_id, error = %e, "dividend insert failed");
            return errors::server_error(&ctx.request_id);
        }

        let snapshot = Dividend {
            dividend_id: dividend_id.clone(),
            source_address: source_address.clone(),
            asset: asset.clone(),
            dividend_asset: dividend_asset.clone(),
            quantity_per_unit,
            status: RequestStatus::Valid.to_string(),
            request_id: ctx.request_id.to_string(),
            ..Dividend::default()
        };
        let response = created(&snapshot);

        tokio::spawn(delegated_create_dividend(
            state,
            ctx,
            passphrase,
            dividend_id,
            source_address,
            asset,
            dividend_asset,
            quantity_per_unit,
        ));

        response
    })
}

/// Background dividend: compose → sign → broadcast under the source-address
/// lock.
#[allow(clippy::too_many_arguments)]
async fn delegated_create_dividend(
    state: Arc<AppState>,
    ctx: RequestContext,
    passphrase: String,
    dividend_id: String,
    source_address: String,
    asset: String,
    dividend_asset: String,
    quantity_per_unit: u64,
) -> Result<String, GatewayError> {
    let public_key = match wallet::get_public_key(&passphrase, &source_address) {
        Ok(public_key) => public_key,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "public key derivation failed");
            record_dividend_error(
                &state,
                &ctx,
                &dividend_id,
                GenericError::InvalidPassphrase.code(),
                GenericError::InvalidPassphrase.description(),
            )
            .await;
            return Err(GenericError::InvalidPassphrase.into());
        }
    };

    let lock = state.counterparty_locks.for_address(&source_address);
    let _guard = lock.lock().await;
    tracing::info!(request_id = %ctx.request_id, source_address, "address locked");

    tokio::time::sleep(Duration::from_millis(ISSUANCE_SETTLE_MS)).await;

    let unsigned = match state
        .counterparty
        .create_dividend(&source_address, &asset, &dividend_asset, quantity_per_unit, &public_key)
        .await
    {
        Ok(unsigned) => unsigned,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "dividend compose failed");
            record_dividend_error(&state, &ctx, &dividend_id, e.code(), e.description()).await;
            return Err(e);
        }
    };
    tracing::info!(
        request_id = %ctx.request_id,
        quantity_per_unit,
        dividend_asset,
        asset,
        "composed dividend"
    );

    let signed = match signer::sign_raw_transaction(&passphrase, &unsigned) {
        Ok(signed) => signed,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "signing failed");
            let err = CounterpartyError::SigningError;
            record_dividend_error(&state, &ctx, &dividend_id, err.code(), err.description()).await;
            return Err(err.into());
        }
    };

    let broadcast_tx_id = match state.bitcoin.send_raw_transaction(&signed).await {
        Ok(txid) => txid,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "broadcast failed");
            let err = CounterpartyError::BroadcastError;
            record_dividend_error(&state, &ctx, &dividend_id, err.code(), err.description()).await;
            return Err(err.into());
        }
    };

    if let Err(e) = state
        .store
        .update_dividend_complete(&ctx.access_key, &dividend_id, &broadcast_tx_id)
        .await
    {
        tracing::error!(request_id = %ctx.request_id, error = %e, "completion update failed");
    }
    state
        .fluent
        .log_context(SEVERITY_EVENT, &ctx, "dividend broadcast complete");

    Ok(broadcast_tx_id)
}

async fn record_dividend_error(
    state: &Arc<AppState>,
    ctx: &RequestContext,
    dividend_id: &str,
    code: i64,
    description: &str,
) {
    if let Err(e) = state
        .store
        .update_dividend_with_error(&ctx.access_key, dividend_id, code, description)
        .await
    {
        tracing::error!(request_id = %ctx.request_id, error = %e, "error update failed");
    }
    state.fluent.log_context(SEVERITY_ERROR, ctx, description);
}

/// `GET /asset/dividend/{dividendId}`: the persisted state of a dividend
/// request plus a live confirmation probe.
pub fn get_dividend(state: Arc<AppState>, ctx: RequestContext, args: HandlerArgs) -> HandlerFuture {
    Box::pin(async move {
        let dividend_id = args.path_param.unwrap_or_default();
        if dividend_id.len() < 16 {
            tracing::error!(request_id = %ctx.request_id, dividend_id, "invalid dividendId");
            return errors::bad_request(
                &ctx.request_id,
                GenericError::InvalidDividendId.code(),
                GenericError::InvalidDividendId.description().to_string(),
            );
        }

        let mut dividend = match state
            .store
            .get_dividend_by_dividend_id(&ctx.access_key, &dividend_id)
            .await
        {
            Ok(Some(dividend)) => dividend,
            Ok(None) => Dividend {
                dividend_id: dividend_id.clone(),
                status: RequestStatus::NotFound.to_string(),
                ..Dividend::default()
            },
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "dividend lookup failed");
                return errors::server_error(&ctx.request_id);
            }
        };

        let (status, confirmations) = probe_confirmations(
            &state,
            crate::chain::BackendId::Counterparty.as_str(),
            &dividend.broadcast_tx_id,
        )
        .await;
        dividend.blockchain_status = status;
        dividend.blockchain_confirmations = confirmations;
        dividend.request_id = ctx.request_id.to_string();

        ok(&dividend)
    })
}

/// `GET /asset/issuances/{asset}`: the issuance history of an asset. The
/// first valid issuance defines divisibility; any locking issuance locks the
/// supply; the newest description wins.
pub fn asset_issuances(
    state: Arc<AppState>,
    ctx: RequestContext,
    args: HandlerArgs,
) -> HandlerFuture {
    Box::pin(async move {
        let asset = args.path_param.unwrap_or_default();
        if asset.len() < 5 {
            tracing::error!(request_id = %ctx.request_id, asset, "invalid asset");
            return errors::bad_request(
                &ctx.request_id,
                GenericError::InvalidAsset.code(),
                GenericError::InvalidAsset.description().to_string(),
            );
        }

        let result = match state.counterparty.get_issuances(&asset).await {
            Ok(result) => result,
            Err(e) => {
                return errors::server_error_with(
                    &ctx.request_id,
                    e.code(),
                    e.description().to_string(),
                );
            }
        };

        let mut reply = AssetIssuances {
            asset,
            request_id: ctx.request_id.to_string(),
            ..AssetIssuances::default()
        };

        if let Some(first) = result.first() {
            reply.divisible = first.divisible;
            reply.divisibility = if first.divisible { DIVISIBLE_DIVISIBILITY } else { 0 };
            reply.locked = result.iter().any(|issuance| issuance.locked);
            reply.description = result[result.len() - 1].description.clone();
        }
        reply.issuances = result
            .into_iter()
            .map(|issuance| Issuance {
                block_index: issuance.block_index,
                issuer: issuance.issuer,
                quantity: issuance.quantity,
                transfer: issuance.transfer,
            })
            .collect();

        ok(&reply)
    })
}

/// `GET /asset/ledger/{asset}`: the current holders of an asset with their
/// percentage of total supply.
pub fn asset_ledger(state: Arc<AppState>, ctx: RequestContext, args: HandlerArgs) -> HandlerFuture {
    Box::pin(async move {
        let asset = args.path_param.unwrap_or_default();
        if asset.len() < 5 {
            tracing::error!(request_id = %ctx.request_id, asset, "invalid asset");
            return errors::bad_request(
                &ctx.request_id,
                GenericError::InvalidAsset.code(),
                GenericError::InvalidAsset.description().to_string(),
            );
        }

        let holders = match state.counterparty.get_balances_by_asset(&asset).await {
            Ok(holders) => holders,
            Err(e) => {
                return errors::server_error_with(
                    &ctx.request_id,
                    e.code(),
                    e.description().to_string(),
                );
            }
        };
        let issuances = match state.counterparty.get_issuances(&asset).await {
            Ok(issuances) => issuances,
            Err(e) => {
                return errors::server_error_with(
                    &ctx.request_id,
                    e.code(),
                    e.description().to_string(),
                );
            }
        };

        let mut reply = AssetBalances {
            asset,
            request_id: ctx.request_id.to_string(),
            ..AssetBalances::default()
        };
        reply.supply = issuances.iter().map(|issuance| issuance.quantity).sum();
        if let Some(first) = issuances.first() {
            reply.divisible = first.divisible;
            reply.divisibility = if first.divisible { DIVISIBLE_DIVISIBILITY } else { 1 };
            reply.locked = issuances.iter().any(|issuance| issuance.locked);
            reply.description = issuances[issuances.len() - 1].description.clone();
        }
        reply.balances = holders
            .into_iter()
            .map(|holder| AddressAmount {
                percentage_holding: if reply.supply > 0 {
                    holder.quantity as f64 / reply.supply as f64 * 100.0
                } else {
                    0.0
                },
                address: holder.address,
                quantity: holder.quantity,
            })
            .collect();

        ok(&reply)
    })
}
