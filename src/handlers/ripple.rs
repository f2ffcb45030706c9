//! Orchestrator handlers for the consensus-ledger backend.
//!
//! Payments are composed and signed against the validator-adjacent node and
//! submitted with a ledger-sequence deadline. Asset creation runs the issuer
//! gateway bootstrap: default-ripple flag, distribution wallet, activation
//! with a trust line, then the issuing payment. All background work for one
//! source address is serialized by the per-address lock.

use std::sync::Arc;
use std::time::Duration;

use crate::app::AppState;
use crate::chain::ripple::{
    self, ASF_DEFAULT_RIPPLE, BACKEND_POLL_RATE_MS, DEFAULT_AMOUNT_TO_TRUST, DEFAULT_FEE_DROPS,
    LSF_DEFAULT_RIPPLE, calculate_reserve,
};
use crate::dispatch::{HandlerArgs, HandlerFuture};
use crate::errors::{self, GatewayError, GenericError, RippleError};
use crate::fluent::{SEVERITY_ERROR, SEVERITY_EVENT};
use crate::ids;
use crate::pipeline::RequestContext;
use crate::types::{
    Activation, AddressBalances, Amount, Asset, RequestStatus, TrustAsset, Wallet, WalletPayment,
};

use super::{created, ok};

/// Number of transactions an address is activated for when unspecified.
const DEFAULT_ACTIVATION_AMOUNT: u64 = 100;

/// Settle interval before composing: most transactions enter a ledger
/// within one close cycle.
const SEND_SETTLE_MS: u64 = BACKEND_POLL_RATE_MS + 1000;

/// Wait after funding an address before its reserve is usable.
const ACTIVATION_SETTLE: Duration = Duration::from_secs(10);

/// `POST /wallet`: proposes a new ledger account via the node. The hex seed
/// maps to the same 12-word passphrase scheme used by the other backend, so
/// one passphrase controls a wallet on either chain.
pub fn wallet_create(
    state: Arc<AppState>,
    ctx: RequestContext,
    _args: HandlerArgs,
) -> HandlerFuture {
    Box::pin(async move {
        let proposal = match state.ripple.create_wallet().await {
            Ok(proposal) => proposal,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "wallet proposal failed");
                return errors::server_error_with(
                    &ctx.request_id,
                    e.code(),
                    e.description().to_string(),
                );
            }
        };
        tracing::info!(
            request_id = %ctx.request_id,
            address = proposal.account_id,
            access_key = ctx.access_key,
            "created a new wallet"
        );

        let passphrase = match ripple::crypto::mnemonic_from_hex_seed(&proposal.master_seed_hex) {
            Ok(passphrase) => passphrase,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "seed translation failed");
                return errors::server_error(&ctx.request_id);
            }
        };

        created(&Wallet {
            passphrase,
            hex_seed: proposal.master_seed_hex.clone(),
            addresses: vec![proposal.account_id],
            blockchain_id: ctx.backend.to_string(),
            key_type: proposal.key_type,
            master_seed: proposal.master_seed,
            master_seed_hex: proposal.master_seed_hex,
            public_key: proposal.public_key,
            public_key_hex: proposal.public_key_hex,
            request_id: ctx.request_id.to_string(),
        })
    })
}

/// `POST /wallet/payment`: accepts an asset or XRP send. Custom currencies
/// are gateway-scoped, so a non-XRP asset requires its issuer.
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
        let issuer = body["issuer"].as_str().unwrap_or_default().to_string();
        let payment_tag = body["paymentTag"].as_str().map(str::to_string);

        if !asset.eq_ignore_ascii_case("XRP") && issuer.is_empty() {
            tracing::error!(request_id = %ctx.request_id, asset, "issuer missing for custom currency");
            return errors::bad_request(
                &ctx.request_id,
                RippleError::IssuerMustBeGiven.code(),
                RippleError::IssuerMustBeGiven.description().to_string(),
            );
        }

        let payment_id = ids::generate_payment_id();
        tracing::info!(
            request_id = %ctx.request_id,
            payment_id,
            source_address,
            destination_address,
            asset,
            issuer,
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
                &issuer,
                quantity,
                RequestStatus::Valid,
                DEFAULT_FEE_DROPS,
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
            issuer,
            quantity,
            payment_id,
        ));

        response
    })
}

/// Background send: convert units, sign with the secret derived from the
/// passphrase, submit (polling through `terQUEUED`), and persist the
/// outcome. The payment row must already exist.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn delegated_send(
    state: Arc<AppState>,
    ctx: RequestContext,
    passphrase: String,
    source_address: String,
    destination_address: String,
    asset: String,
    issuer: String,
    quantity: u64,
    payment_id: String,
) -> Result<String, GatewayError> {
    let lock = state.ripple_locks.for_address(&source_address);
    let _guard = lock.lock().await;
    tracing::info!(request_id = %ctx.request_id, source_address, "address locked");

    tokio::time::sleep(Duration::from_millis(SEND_SETTLE_MS)).await;

    // Wire quantities are satoshi-style (×10⁸); the ledger wants drops
    // (×10⁶) for XRP and decimal strings for issued currencies.
    let amount = if asset.eq_ignore_ascii_case("XRP") {
        (quantity / 100).to_string()
    } else {
        ripple::uint64_to_amount(quantity)
    };

    let currency = match ripple::to_currency(&asset) {
        Ok(currency) => currency,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, asset, error = %e, "currency encoding failed");
            record_payment_error(&state, &ctx, &payment_id, e.code(), e.description()).await;
            return Err(e);
        }
    };

    let secret = match ripple::crypto::passphrase_to_secret(&passphrase) {
        Ok(secret) => secret,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "secret derivation failed");
            let err = GenericError::InvalidPassphrase;
            record_payment_error(&state, &ctx, &payment_id, err.code(), err.description()).await;
            return Err(err.into());
        }
    };

    let signed = match state
        .ripple
        .create_payment(
            &source_address,
            &destination_address,
            &amount,
            &currency,
            &issuer,
            &secret,
        )
        .await
    {
        Ok(signed) => signed,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "payment compose failed");
            record_payment_error(&state, &ctx, &payment_id, e.code(), e.description()).await;
            return Err(e);
        }
    };

    let tx_hash = match state.ripple.submit(&signed).await {
        Ok(tx_hash) => tx_hash,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "submit failed");
            record_payment_error(&state, &ctx, &payment_id, e.code(), e.description()).await;
            return Err(e);
        }
    };

    if let Err(e) = state
        .store
        .update_payment_complete(&ctx.access_key, &payment_id, &tx_hash)
        .await
    {
        tracing::error!(request_id = %ctx.request_id, error = %e, "completion update failed");
    }
    state
        .fluent
        .log_context(SEVERITY_EVENT, &ctx, "ledger payment complete");
    tracing::info!(request_id = %ctx.request_id, tx_hash, "send complete");

    Ok(tx_hash)
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

/// `GET /wallet/balances/{address}`: trust-line balances plus the XRP
/// balance and the number of transactions the spare XRP can fund above the
/// reserve.
pub fn wallet_balance(
    state: Arc<AppState>,
    ctx: RequestContext,
    args: HandlerArgs,
) -> HandlerFuture {
    Box::pin(async move {
        let address = args.path_param.unwrap_or_default();
        if address.len() != 34 {
            return errors::bad_request(
                &ctx.request_id,
                GenericError::InvalidAddress.code(),
                GenericError::InvalidAddress.description().to_string(),
            );
        }

        let account_balances = match state.ripple.get_account_balances(&address).await {
            Ok(account_balances) => account_balances,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "balance query failed");
                return errors::server_error(&ctx.request_id);
            }
        };

        let mut balances = Vec::with_capacity(account_balances.len());
        let mut xrp_balance: u64 = 0;
        for item in account_balances {
            let asset = match ripple::from_currency(&item.currency) {
                Ok(asset) => asset,
                Err(e) => {
                    tracing::error!(request_id = %ctx.request_id, error = %e, "currency decode failed");
                    return errors::server_error(&ctx.request_id);
                }
            };
            let quantity = match ripple::amount_to_uint64(&item.value) {
                Ok(quantity) => quantity,
                Err(e) => {
                    tracing::error!(request_id = %ctx.request_id, error = %e, "amount decode failed");
                    return errors::server_error(&ctx.request_id);
                }
            };
            if asset.eq_ignore_ascii_case("XRP") {
                xrp_balance = quantity;
            }
            balances.push(Amount {
                asset,
                quantity,
                issuer: item.counterparty,
            });
        }

        let lines = match state.ripple.get_account_lines(&address).await {
            Ok(lines) => lines,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "trust line query failed");
                return errors::server_error(&ctx.request_id);
            }
        };

        // The wire balance is ×10⁸; reserve arithmetic runs in drops.
        let xrp_drops = xrp_balance / 100;
        let spendable = xrp_drops.saturating_sub(calculate_reserve(lines.len() as u64));
        let number_of_transactions = state.ripple.calculate_number_of_transactions(spendable);

        ok(&AddressBalances {
            address,
            blockchain_id: ctx.backend.to_string(),
            number_of_transactions,
            balances,
            request_id: ctx.request_id.to_string(),
        })
    })
}

/// `POST /wallet/activate/address/{address}`: funds an address to meet its
/// reserve (including requested trust lines) plus fees for `amount` future
/// transactions, then establishes the missing trust lines.
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

        let body = &args.body;
        let amount = body["amount"].as_u64().unwrap_or(DEFAULT_ACTIVATION_AMOUNT);
        let passphrase = body["passphrase"].as_str().unwrap_or_default().to_string();
        let assets: Vec<TrustAsset> = body["assets"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        let activation_id = ids::generate_activation_id();
        tracing::info!(
            request_id = %ctx.request_id,
            activation_id,
            address,
            amount,
            trust_lines = assets.len(),
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
            assets: assets.clone(),
            activation_id: activation_id.clone(),
            status: RequestStatus::Valid.to_string(),
            request_id: ctx.request_id.to_string(),
            ..Activation::default()
        };
        let response = created(&snapshot);

        tokio::spawn(delegated_activate_address(
            state,
            ctx,
            address,
            passphrase,
            amount,
            assets,
            activation_id,
        ));

        response
    })
}

/// Background activation. Reserve arithmetic:
/// `target = base_reserve + (existing + new trust lines) × owner_reserve`;
/// the amount sent is the shortfall plus fees for the requested transaction
/// count. Trust lines the address already holds are not re-established.
pub(crate) async fn delegated_activate_address(
    state: Arc<AppState>,
    ctx: RequestContext,
    address_to_activate: String,
    passphrase: String,
    amount: u64,
    assets: Vec<TrustAsset>,
    activation_id: String,
) -> Result<(), GatewayError> {
    tracing::info!(
        request_id = %ctx.request_id,
        trust_lines = assets.len(),
        "activating address"
    );

    let Some(funding_wallet) = state.config.ripple_wallets.first().cloned() else {
        tracing::error!(request_id = %ctx.request_id, "no internal wallet configured");
        record_activation_failure(&state, &ctx, &activation_id, RippleError::MiscError).await;
        return Err(RippleError::MiscError.into());
    };

    let account_info = match state.ripple.get_account_info(&address_to_activate).await {
        Ok(account_info) => account_info,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "account info failed");
            record_activation_failure(&state, &ctx, &activation_id, RippleError::MiscError).await;
            return Err(RippleError::MiscError.into());
        }
    };
    let current_balance: u64 = if account_info.balance.is_empty() {
        0
    } else {
        match account_info.balance.parse() {
            Ok(balance) => balance,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "unparseable balance");
                record_activation_failure(&state, &ctx, &activation_id, RippleError::MiscError).await;
                return Err(RippleError::MiscError.into());
            }
        }
    };
    tracing::info!(request_id = %ctx.request_id, current_balance, "wallet balance read");

    let lines = match state.ripple.get_account_lines(&address_to_activate).await {
        Ok(lines) => lines,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "trust line query failed");
            record_activation_failure(&state, &ctx, &activation_id, RippleError::MiscError).await;
            return Err(RippleError::MiscError.into());
        }
    };

    // Trust lines requested but not yet established.
    let mut lines_required: Vec<TrustAsset> = Vec::new();
    for asset in &assets {
        let ledger_currency = ripple::to_currency(&asset.currency).unwrap_or_default();
        if !lines.contains(&asset.issuer, &ledger_currency) {
            lines_required.push(asset.clone());
        }
    }
    tracing::info!(
        request_id = %ctx.request_id,
        required = lines_required.len(),
        "trust lines to be added"
    );

    let mut target_reserve =
        calculate_reserve(lines.len() as u64 + lines_required.len() as u64);
    if current_balance >= target_reserve {
        target_reserve = current_balance;
    }
    let (fee_drops, _) = state.ripple.calculate_fee_amount(amount);
    let drops_to_send = (target_reserve - current_balance) + fee_drops;
    tracing::info!(
        request_id = %ctx.request_id,
        drops_to_send,
        fee_drops,
        "funding requirement computed"
    );

    if let Err(e) = state
        .store
        .insert_payment(
            &ctx.access_key,
            ctx.backend.as_str(),
            &activation_id,
            &funding_wallet.address,
            &address_to_activate,
            "XRP",
            "",
            drops_to_send * 100,
            RequestStatus::Valid,
            DEFAULT_FEE_DROPS,
            None,
        )
        .await
    {
        tracing::error!(request_id = %ctx.request_id, error = %e, "activation payment insert failed");
    }

    // Wire quantities are ×10⁸, drops are ×10⁶.
    delegated_send(
        state.clone(),
        ctx.clone(),
        funding_wallet.passphrase,
        funding_wallet.address,
        address_to_activate.clone(),
        "XRP".to_string(),
        String::new(),
        drops_to_send * 100,
        activation_id.clone(),
    )
    .await?;

    // If the reserve was short the funding payment must settle before the
    // account can pay for its own trust lines.
    if current_balance < target_reserve {
        tracing::info!(request_id = %ctx.request_id, "waiting for funding to settle");
        tokio::time::sleep(ACTIVATION_SETTLE).await;
    }

    if !lines_required.is_empty() && passphrase.is_empty() {
        tracing::error!(request_id = %ctx.request_id, "trust lines requested without a passphrase");
        record_activation_failure(&state, &ctx, &activation_id, RippleError::MiscError).await;
        return Err(GenericError::InvalidPassphrase.into());
    }

    for line in &lines_required {
        if let Err(e) = state
            .store
            .insert_trust_asset(
                &ctx.access_key,
                &activation_id,
                ctx.backend.as_str(),
                &line.currency,
                &line.issuer,
                DEFAULT_AMOUNT_TO_TRUST,
            )
            .await
        {
            tracing::error!(request_id = %ctx.request_id, error = %e, "trust asset insert failed");
        }

        let trust_amount = ripple::uint64_to_amount(DEFAULT_AMOUNT_TO_TRUST);
        let currency = match ripple::to_currency(&line.currency) {
            Ok(currency) => currency,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "currency encoding failed");
                continue;
            }
        };
        let secret = match ripple::crypto::passphrase_to_secret(&passphrase) {
            Ok(secret) => secret,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "secret derivation failed");
                continue;
            }
        };

        tracing::info!(
            request_id = %ctx.request_id,
            currency = line.currency,
            issuer = line.issuer,
            "creating trust line"
        );
        if let Err(e) = state
            .ripple
            .trust_set(
                &address_to_activate,
                &currency,
                &trust_amount,
                &line.issuer,
                0,
                &secret,
            )
            .await
        {
            tracing::error!(request_id = %ctx.request_id, error = %e, "trust set failed");
        }
    }

    state
        .fluent
        .log_context(SEVERITY_EVENT, &ctx, "address activation complete");
    tracing::info!(request_id = %ctx.request_id, "activation complete");
    Ok(())
}

/// Makes a pre-funding failure observable through the activation's payment
/// row even though no funding payment was attempted yet.
async fn record_activation_failure(
    state: &Arc<AppState>,
    ctx: &RequestContext,
    activation_id: &str,
    error: RippleError,
) {
    let existing = state
        .store
        .get_payment_by_payment_id(&ctx.access_key, activation_id)
        .await;
    if matches!(existing, Ok(None)) {
        if let Err(e) = state
            .store
            .insert_payment(
                &ctx.access_key,
                ctx.backend.as_str(),
                activation_id,
                "",
                "",
                "XRP",
                "",
                0,
                RequestStatus::Valid,
                DEFAULT_FEE_DROPS,
                None,
            )
            .await
        {
            tracing::error!(request_id = %ctx.request_id, error = %e, "failure row insert failed");
        }
    }
    if let Err(e) = state
        .store
        .update_payment_with_error(&ctx.access_key, activation_id, error.code(), error.description())
        .await
    {
        tracing::error!(request_id = %ctx.request_id, error = %e, "error update failed");
    }
    state.fluent.log_context(SEVERITY_ERROR, ctx, error.description());
}

/// `POST /asset`: issues a custom currency. The issuer account is prepared
/// as a gateway, a distribution wallet is generated when the caller did not
/// supply one, and the supply is paid from issuer to distribution.
pub fn asset_create(state: Arc<AppState>, ctx: RequestContext, args: HandlerArgs) -> HandlerFuture {
    Box::pin(async move {
        let body = &args.body;
        let source_address = body["sourceAddress"].as_str().unwrap_or_default().to_string();
        let passphrase = body["passphrase"].as_str().unwrap_or_default().to_string();
        let mut distribution_address = body["distributionAddress"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let mut distribution_passphrase = body["distributionPassphrase"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let asset = body["asset"].as_str().unwrap_or_default().to_string();
        let quantity = body["quantity"].as_u64().unwrap_or(0);

        tracing::info!(
            request_id = %ctx.request_id,
            source_address,
            asset,
            quantity,
            distribution_address,
            "asset creation accepted"
        );

        let ledger_asset = match ripple::to_currency(&asset) {
            Ok(ledger_asset) => ledger_asset,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, asset, error = %e, "currency encoding failed");
                return errors::bad_request(&ctx.request_id, e.code(), e.description().to_string());
            }
        };

        if !distribution_address.is_empty() && distribution_passphrase.is_empty() {
            return errors::bad_request(
                &ctx.request_id,
                RippleError::DistributionPassphraseMissing.code(),
                RippleError::DistributionPassphraseMissing.description().to_string(),
            );
        }

        // No distribution wallet supplied: generate one and hand it back in
        // the synchronous response. This is the only time its passphrase is
        // ever emitted.
        let mut generated_distribution = false;
        if distribution_address.is_empty() {
            let proposal = match state.ripple.create_wallet().await {
                Ok(proposal) => proposal,
                Err(e) => {
                    tracing::error!(request_id = %ctx.request_id, error = %e, "wallet proposal failed");
                    return errors::server_error_with(
                        &ctx.request_id,
                        e.code(),
                        e.description().to_string(),
                    );
                }
            };
            distribution_passphrase =
                match ripple::crypto::mnemonic_from_hex_seed(&proposal.master_seed_hex) {
                    Ok(passphrase) => passphrase,
                    Err(e) => {
                        tracing::error!(request_id = %ctx.request_id, error = %e, "seed translation failed");
                        return errors::server_error(&ctx.request_id);
                    }
                };
            distribution_address = proposal.account_id;
            generated_distribution = true;
        }

        let asset_id = ids::generate_asset_id();
        tracing::info!(request_id = %ctx.request_id, asset_id, "generated assetId");

        if let Err(e) = state
            .store
            .insert_asset(
                &ctx.access_key,
                ctx.backend.as_str(),
                &asset_id,
                &source_address,
                &distribution_address,
                &ledger_asset,
                &asset,
                quantity,
                true,
                RequestStatus::Valid,
            )
            .await
        {
            tracing::error!(request_id = %ctx.request_id, error = %e, "asset insert failed");
            return errors::server_error(&ctx.request_id);
        }

        let snapshot = Asset {
            asset_id: asset_id.clone(),
            asset: ledger_asset,
            issuer: source_address.clone(),
            description: asset.clone(),
            quantity,
            divisible: true,
            source_address: source_address.clone(),
            distribution_address: if generated_distribution {
                distribution_address.clone()
            } else {
                String::new()
            },
            distribution_passphrase: if generated_distribution {
                distribution_passphrase.clone()
            } else {
                String::new()
            },
            blockchain_id: ctx.backend.to_string(),
            status: RequestStatus::Valid.to_string(),
            request_id: ctx.request_id.to_string(),
            ..Asset::default()
        };
        let response = created(&snapshot);

        tokio::spawn(delegated_asset_create(
            state,
            ctx,
            source_address,
            passphrase,
            distribution_address,
            distribution_passphrase,
            asset,
            quantity,
            asset_id,
        ));

        response
    })
}

/// Issuer gateway bootstrap, run in the background:
/// 1. ensure the issuer's default-ripple flag is set;
/// 2. activate the distribution address with a trust line for the asset;
/// 3. verify the trust line exists;
/// 4. pay the issued supply from issuer to distribution.
/// Any stage failure terminates the flow with its taxonomy code.
#[allow(clippy::too_many_arguments)]
async fn delegated_asset_create(
    state: Arc<AppState>,
    ctx: RequestContext,
    issuing_address: String,
    issuing_passphrase: String,
    distribution_address: String,
    distribution_passphrase: String,
    asset: String,
    quantity: u64,
    asset_id: String,
) -> Result<(), GatewayError> {
    let ledger_asset = match ripple::to_currency(&asset) {
        Ok(ledger_asset) => ledger_asset,
        Err(e) => {
            record_asset_error(&state, &ctx, &asset_id, e.code(), e.description()).await;
            return Err(e);
        }
    };

    // Stage 1: the issuer must ripple by default to act as a gateway.
    let account_info = match state.ripple.get_account_info(&issuing_address).await {
        Ok(account_info) => account_info,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "issuer account info failed");
            let err = RippleError::MiscError;
            record_asset_error(&state, &ctx, &asset_id, err.code(), err.description()).await;
            return Err(err.into());
        }
    };

    if account_info.flags & LSF_DEFAULT_RIPPLE != LSF_DEFAULT_RIPPLE {
        tracing::info!(
            request_id = %ctx.request_id,
            issuing_address,
            "setting default-ripple on the issuer"
        );
        let secret = match ripple::crypto::passphrase_to_secret(&issuing_passphrase) {
            Ok(secret) => secret,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "secret derivation failed");
                let err = GenericError::InvalidPassphrase;
                record_asset_error(&state, &ctx, &asset_id, err.code(), err.description()).await;
                return Err(err.into());
            }
        };
        match state
            .ripple
            .account_set_flag(&issuing_address, ASF_DEFAULT_RIPPLE, &secret)
            .await
        {
            Ok(tx_hash) => {
                tracing::info!(request_id = %ctx.request_id, tx_hash, "default-ripple set");
            }
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "account set failed");
                record_asset_error(&state, &ctx, &asset_id, e.code(), e.description()).await;
                return Err(e);
            }
        }
    } else {
        tracing::info!(
            request_id = %ctx.request_id,
            issuing_address,
            "default-ripple already set"
        );
    }

    // Stage 2: activate the distribution wallet with a trust line for the
    // asset toward the issuer. The bootstrap activation shares the asset's
    // identifier.
    if let Err(e) = state
        .store
        .insert_activation(
            &ctx.access_key,
            &asset_id,
            ctx.backend.as_str(),
            &distribution_address,
            1,
        )
        .await
    {
        tracing::error!(request_id = %ctx.request_id, error = %e, "activation insert failed");
    }
    let trust_assets = vec![TrustAsset {
        currency: asset.clone(),
        issuer: issuing_address.clone(),
    }];
    if let Err(e) = delegated_activate_address(
        state.clone(),
        ctx.clone(),
        distribution_address.clone(),
        distribution_passphrase,
        1,
        trust_assets,
        asset_id.clone(),
    )
    .await
    {
        tracing::error!(request_id = %ctx.request_id, error = %e, "distribution activation failed");
        record_asset_error(&state, &ctx, &asset_id, e.code(), e.description()).await;
        return Err(e);
    }

    tracing::info!(request_id = %ctx.request_id, "waiting for activation to settle");
    tokio::time::sleep(ACTIVATION_SETTLE).await;

    // Stage 3: the trust line must exist before the supply can move.
    let lines = match state.ripple.get_account_lines(&distribution_address).await {
        Ok(lines) => lines,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "trust line query failed");
            let err = RippleError::MiscError;
            record_asset_error(&state, &ctx, &asset_id, err.code(), err.description()).await;
            return Err(err.into());
        }
    };
    if !lines.contains(&issuing_address, &ledger_asset) {
        tracing::error!(
            request_id = %ctx.request_id,
            distribution_address,
            issuing_address,
            "trust line from distribution to issuer does not exist"
        );
        let err = RippleError::InvalidCurrencyOrNoTrustline;
        record_asset_error(&state, &ctx, &asset_id, err.code(), err.description()).await;
        return Err(err.into());
    }

    // Stage 4: pay the supply from the issuer to the distribution wallet.
    let pay_tx_id = match delegated_send(
        state.clone(),
        ctx.clone(),
        issuing_passphrase,
        issuing_address.clone(),
        distribution_address,
        asset,
        issuing_address,
        quantity,
        asset_id.clone(),
    )
    .await
    {
        Ok(pay_tx_id) => pay_tx_id,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "issuing payment failed");
            record_asset_error(&state, &ctx, &asset_id, e.code(), e.description()).await;
            return Err(e);
        }
    };

    if let Err(e) = state
        .store
        .update_asset_complete(&ctx.access_key, &asset_id, &pay_tx_id)
        .await
    {
        tracing::error!(request_id = %ctx.request_id, error = %e, "completion update failed");
    }
    state
        .fluent
        .log_context(SEVERITY_EVENT, &ctx, "asset creation complete");

    Ok(())
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
