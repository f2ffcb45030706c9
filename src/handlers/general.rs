//! Backend-independent handlers: payment records, payment reads, retry,
//! asset reads and block listings. These run synchronously; the only
//! outbound calls are store reads and the confirmation probe.

use std::sync::Arc;

use crate::app::AppState;
use crate::chain::BackendId;
use crate::dispatch::{HandlerArgs, HandlerFuture};
use crate::errors::{self, GenericError};
use crate::fluent::SEVERITY_INFO;
use crate::ids;
use crate::pipeline::RequestContext;
use crate::types::{Asset, Blocks, BlockchainStatus, Payment, RequestStatus};

use super::{created, ok};

/// Populates the live blockchain status of a row that carries a broadcast
/// tx id on the Bitcoin-based backend. A probe failure or a zero
/// confirmation count reads as unconfirmed; the probe never fails the read.
pub(crate) async fn probe_confirmations(
    state: &Arc<AppState>,
    blockchain_id: &str,
    broadcast_tx_id: &str,
) -> (Option<BlockchainStatus>, u64) {
    if broadcast_tx_id.is_empty() || blockchain_id != BackendId::Counterparty.as_str() {
        return (None, 0);
    }
    match state.bitcoin.get_confirmations(broadcast_tx_id).await {
        Ok(confirmations) if confirmations > 0 => {
            (Some(BlockchainStatus::Confirmed), confirmations)
        }
        Ok(_) => (Some(BlockchainStatus::Unconfirmed), 0),
        Err(e) => {
            tracing::info!(broadcast_tx_id, error = %e, "confirmation probe failed");
            (Some(BlockchainStatus::Unconfirmed), 0)
        }
    }
}

/// `POST /payment`: records a payment request without any on-chain action.
/// The row starts in `authorized` and is driven by later retries.
pub fn payment_create(
    state: Arc<AppState>,
    ctx: RequestContext,
    args: HandlerArgs,
) -> HandlerFuture {
    Box::pin(async move {
        let body = &args.body;
        let source_address = body["sourceAddress"].as_str().unwrap_or_default().to_string();
        let destination_address = body["destinationAddress"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let asset = body["asset"].as_str().unwrap_or_default().to_string();
        let amount = body["amount"].as_u64().unwrap_or(0);
        let tx_fee = body["txFee"].as_u64().unwrap_or(0);
        let payment_tag = body["paymentTag"].as_str().map(str::to_string);

        let payment_id = match body["paymentId"].as_str() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = ids::generate_payment_id();
                tracing::info!(request_id = %ctx.request_id, payment_id = id, "generated paymentId");
                id
            }
        };

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
                amount,
                RequestStatus::Authorized,
                tx_fee,
                payment_tag.as_deref(),
            )
            .await
        {
            tracing::error!(request_id = %ctx.request_id, error = %e, "payment insert failed");
            return errors::server_error(&ctx.request_id);
        }

        let snapshot = Payment {
            payment_id,
            source_address,
            destination_address,
            asset,
            amount,
            tx_fee: tx_fee as i64,
            payment_tag: payment_tag.unwrap_or_default(),
            status: RequestStatus::Authorized.to_string(),
            request_id: ctx.request_id.to_string(),
            ..Payment::default()
        };
        created(&snapshot)
    })
}

/// `GET /payment/{paymentId}`: the persisted state of a payment plus a live
/// confirmation probe.
pub fn get_payment(state: Arc<AppState>, ctx: RequestContext, args: HandlerArgs) -> HandlerFuture {
    Box::pin(async move {
        let payment_id = args.path_param.unwrap_or_default();
        if payment_id.len() < 16 {
            tracing::error!(request_id = %ctx.request_id, payment_id, "invalid paymentId");
            return errors::bad_request(
                &ctx.request_id,
                GenericError::InvalidPaymentId.code(),
                GenericError::InvalidPaymentId.description().to_string(),
            );
        }

        tracing::info!(
            request_id = %ctx.request_id,
            payment_id,
            access_key = ctx.access_key,
            "get payment"
        );

        let mut payment = match state
            .store
            .get_payment_by_payment_id(&ctx.access_key, &payment_id)
            .await
        {
            Ok(Some(payment)) => payment,
            Ok(None) => Payment {
                payment_id: payment_id.clone(),
                status: RequestStatus::NotFound.to_string(),
                ..Payment::default()
            },
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "payment lookup failed");
                return errors::server_error(&ctx.request_id);
            }
        };

        let (status, confirmations) =
            probe_confirmations(&state, &payment.blockchain_id, &payment.broadcast_tx_id).await;
        payment.blockchain_status = status;
        payment.blockchain_confirmations = confirmations;
        payment.request_id = ctx.request_id.to_string();

        ok(&payment)
    })
}

/// `GET /payment/address/{address}`: payments where the address appears as
/// source or destination.
pub fn get_payments_by_address(
    state: Arc<AppState>,
    ctx: RequestContext,
    args: HandlerArgs,
) -> HandlerFuture {
    Box::pin(async move {
        let address = args.path_param.unwrap_or_default();
        if address.is_empty() {
            tracing::error!(request_id = %ctx.request_id, "invalid address");
            return errors::bad_request(
                &ctx.request_id,
                GenericError::InvalidAddress.code(),
                GenericError::InvalidAddress.description().to_string(),
            );
        }

        let mut payments = match state
            .store
            .get_payments_by_address(&ctx.access_key, &address)
            .await
        {
            Ok(payments) => payments,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "payment listing failed");
                return errors::server_error(&ctx.request_id);
            }
        };

        for payment in payments.iter_mut() {
            let (status, confirmations) =
                probe_confirmations(&state, &payment.blockchain_id, &payment.broadcast_tx_id).await;
            payment.blockchain_status = status;
            payment.blockchain_confirmations = confirmations;
            payment.request_id = ctx.request_id.to_string();
        }

        ok(&payments)
    })
}

/// `POST /payment/status/{paymentId}`: re-enters a failed or manual payment
/// into the pipeline by flipping it back to `authorized`. The only path out
/// of a terminal error state, and it is caller-initiated.
pub fn payment_retry(
    state: Arc<AppState>,
    ctx: RequestContext,
    args: HandlerArgs,
) -> HandlerFuture {
    Box::pin(async move {
        let payment_id = args.path_param.unwrap_or_default();
        tracing::info!(request_id = %ctx.request_id, payment_id, "payment retry");

        let payment = match state
            .store
            .get_payment_by_payment_id(&ctx.access_key, &payment_id)
            .await
        {
            Ok(Some(payment)) => payment,
            Ok(None) => {
                return errors::not_found(
                    &ctx.request_id,
                    GenericError::NotFound.code(),
                    format!("PaymentId: {payment_id} not found"),
                );
            }
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "payment lookup failed");
                return errors::server_error(&ctx.request_id);
            }
        };

        let status = payment.status.parse::<RequestStatus>();
        if !matches!(status, Ok(RequestStatus::Error) | Ok(RequestStatus::Manual)) {
            return errors::not_found(
                &ctx.request_id,
                GenericError::NotFound.code(),
                format!(
                    "PaymentId: {payment_id} is not in an 'error' or 'manual' state. It is in '{}' state.",
                    payment.status
                ),
            );
        }

        if let Err(e) = state
            .store
            .update_payment_status(&ctx.access_key, &payment_id, RequestStatus::Authorized)
            .await
        {
            tracing::error!(request_id = %ctx.request_id, error = %e, "retry status update failed");
            return errors::server_error(&ctx.request_id);
        }
        state
            .fluent
            .log_context(SEVERITY_INFO, &ctx, "payment re-entered the pipeline");

        let mut payment = payment;
        payment.request_id = ctx.request_id.to_string();
        ok(&payment)
    })
}

/// `GET /asset/{assetId}`: the persisted state of an issuance request.
pub fn get_asset(state: Arc<AppState>, ctx: RequestContext, args: HandlerArgs) -> HandlerFuture {
    Box::pin(async move {
        let asset_id = args.path_param.unwrap_or_default();
        if asset_id.len() < 16 {
            tracing::error!(request_id = %ctx.request_id, asset_id, "invalid assetId");
            return errors::unprocessable_entity(
                &ctx.request_id,
                GenericError::InvalidAssetId.code(),
                GenericError::InvalidAssetId.description().to_string(),
            );
        }

        tracing::info!(
            request_id = %ctx.request_id,
            asset_id,
            access_key = ctx.access_key,
            "get asset"
        );

        let mut asset = match state
            .store
            .get_asset_by_asset_id(&ctx.access_key, &asset_id)
            .await
        {
            Ok(Some(asset)) => asset,
            Ok(None) => Asset {
                asset_id: asset_id.clone(),
                status: RequestStatus::NotFound.to_string(),
                ..Asset::default()
            },
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "asset lookup failed");
                return errors::server_error(&ctx.request_id);
            }
        };

        // On the consensus ledger the issuing address is the issuer.
        if asset.blockchain_id == BackendId::Ripple.as_str() {
            asset.issuer = asset.source_address.clone();
        }

        let (status, confirmations) =
            probe_confirmations(&state, &asset.blockchain_id, &asset.broadcast_tx_id).await;
        asset.blockchain_status = status;
        asset.blockchain_confirmations = confirmations;
        asset.request_id = ctx.request_id.to_string();

        ok(&asset)
    })
}

/// `GET /blocks`: the ten most recently observed blocks.
pub fn get_blocks(state: Arc<AppState>, ctx: RequestContext, _args: HandlerArgs) -> HandlerFuture {
    Box::pin(async move {
        let blocks = match state.store.get_recent_blocks(10).await {
            Ok(blocks) => blocks,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "block listing failed");
                return errors::server_error(&ctx.request_id);
            }
        };
        ok(&Blocks {
            blocks,
            request_id: ctx.request_id.to_string(),
        })
    })
}
