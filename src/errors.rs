//! Closed error taxonomy with stable integer codes.
//!
//! Codes are grouped by origin: generic pipeline failures (1-99), the
//! Counterparty backend (1000-1099) and the Ripple backend (2000-2099).
//! Adapters translate remote failures into these variants at the adapter
//! boundary; the orchestrator records the first failure on the request row
//! and stops. Every error reaching a client is serialized as
//! `{"requestId": ..., "code": ..., "description": ...}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::ids::RequestId;

/// Failures raised by the request pipeline itself, independent of backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericError {
    InvalidDocument,
    InvalidDividendId,
    UnsupportedBlockchain,
    HeadersIncorrect,
    UnknownAccessKey,
    InvalidSignature,
    InvalidNonce,
    NotFound,
    FunctionNotAvailable,
    InvalidPassphrase,
    InvalidAssetId,
    InvalidPaymentId,
    GeneralError,
    InvalidAddress,
    InvalidAsset,
    AccessKeyDisabled,
}

impl GenericError {
    pub const fn code(self) -> i64 {
        match self {
            GenericError::InvalidDocument => 1,
            GenericError::InvalidDividendId => 2,
            GenericError::UnsupportedBlockchain => 3,
            GenericError::HeadersIncorrect => 4,
            GenericError::UnknownAccessKey => 5,
            GenericError::InvalidSignature => 6,
            GenericError::InvalidNonce => 7,
            GenericError::NotFound => 8,
            GenericError::FunctionNotAvailable => 9,
            GenericError::InvalidPassphrase => 10,
            GenericError::InvalidAssetId => 11,
            GenericError::InvalidPaymentId => 12,
            GenericError::GeneralError => 13,
            GenericError::InvalidAddress => 14,
            GenericError::InvalidAsset => 15,
            GenericError::AccessKeyDisabled => 16,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            GenericError::InvalidDocument => {
                "There was a problem with the parameters in your JSON request. Please correct the request."
            }
            GenericError::InvalidDividendId => "The specified dividend id is invalid.",
            GenericError::UnsupportedBlockchain => "The specified blockchain is not supported.",
            GenericError::HeadersIncorrect => {
                "Request headers were not set correctly ensure the following headers are set: accessKey and signature."
            }
            GenericError::UnknownAccessKey => "Attempt to access API with unknown user key",
            GenericError::InvalidSignature => "Could not verify HMAC signature",
            GenericError::InvalidNonce => "Invalid nonce",
            GenericError::NotFound => "Not found",
            GenericError::FunctionNotAvailable => {
                "The function is not available on the selected blockchain."
            }
            GenericError::InvalidPassphrase => "The passphrase provided is not valid.",
            GenericError::InvalidAssetId => "The specified asset id is invalid.",
            GenericError::InvalidPaymentId => {
                "The specified paymentId is invalid. Please correct the paymentId and resubmit."
            }
            GenericError::GeneralError => "Misc error. Please contact support.",
            GenericError::InvalidAddress => {
                "The specified address is invalid. Please correct the address and resubmit."
            }
            GenericError::InvalidAsset => {
                "The specified asset is invalid. Please correct the asset and resubmit."
            }
            GenericError::AccessKeyDisabled => {
                "The specified API key is valid. However it has been disabled by an administrator."
            }
        }
    }
}

/// Failures originating from the Counterparty composition node, the local
/// signer or the Bitcoin broadcast node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterpartyError {
    MiscError,
    Timeout,
    ReparsingOrUnavailable,
    SigningError,
    BroadcastError,
    InsufficientFees,
    DividendNotFound,
    ComposeError,
    InsufficientFunds,
    MalformedAddress,
    OnlyIssuerCanPayDividends,
    NoSuchAsset,
}

impl CounterpartyError {
    pub const fn code(self) -> i64 {
        match self {
            CounterpartyError::MiscError => 1000,
            CounterpartyError::Timeout => 1001,
            CounterpartyError::ReparsingOrUnavailable => 1002,
            CounterpartyError::SigningError => 1003,
            CounterpartyError::BroadcastError => 1004,
            CounterpartyError::InsufficientFees => 1005,
            CounterpartyError::DividendNotFound => 1007,
            CounterpartyError::ComposeError => 1008,
            CounterpartyError::InsufficientFunds => 1009,
            CounterpartyError::MalformedAddress => 1010,
            CounterpartyError::OnlyIssuerCanPayDividends => 1011,
            CounterpartyError::NoSuchAsset => 1012,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            CounterpartyError::MiscError => {
                "Misc error when contacting Counterparty. Please contact support."
            }
            CounterpartyError::Timeout => {
                "Timeout when contacting Counterparty. Please try again later."
            }
            CounterpartyError::ReparsingOrUnavailable => {
                "Counterparty Blockchain temporarily unavailable. Please try again later."
            }
            CounterpartyError::SigningError => {
                "Unable to sign transaction. Is your passphrase correct?"
            }
            CounterpartyError::BroadcastError => {
                "Unable to broadcast transaction to the blockchain. Please try the transaction again."
            }
            CounterpartyError::InsufficientFees => {
                "Insufficient BTC in address to perform transaction. Please use the Activate() call to add more BTC."
            }
            CounterpartyError::DividendNotFound => "The dividend could not be found.",
            CounterpartyError::ComposeError => "Unable to create the blockchain transaction.",
            CounterpartyError::InsufficientFunds => "Insufficient asset in this address.",
            CounterpartyError::MalformedAddress => {
                "One of the addresses provided was not correct. Please check the addresses involved in the transaction."
            }
            CounterpartyError::OnlyIssuerCanPayDividends => "Only the issuer may pay dividends.",
            CounterpartyError::NoSuchAsset => {
                "The asset specified is incorrect or doesn't exist."
            }
        }
    }
}

/// Failures originating from the Ripple validator-adjacent node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RippleError {
    MiscError,
    Timeout,
    InvalidAmount,
    InvalidCurrency,
    SubmitError,
    IssuerMustBeGiven,
    SigningError,
    SubmitErrorFeeLost,
    InvalidCurrencyOrNoTrustline,
    InvalidSource,
    InvalidDestination,
    DistributionPassphraseMissing,
    DistributionInsufficientFunds,
    InsufficientXrp,
    UnableToGetLatestLedger,
    QueuedNotAccepted,
}

impl RippleError {
    pub const fn code(self) -> i64 {
        match self {
            RippleError::MiscError => 2000,
            RippleError::Timeout => 2001,
            RippleError::InvalidAmount => 2002,
            RippleError::InvalidCurrency => 2003,
            RippleError::SubmitError => 2004,
            RippleError::IssuerMustBeGiven => 2005,
            RippleError::SigningError => 2006,
            RippleError::SubmitErrorFeeLost => 2007,
            RippleError::InvalidCurrencyOrNoTrustline => 2008,
            RippleError::InvalidSource => 2009,
            RippleError::InvalidDestination => 2010,
            RippleError::DistributionPassphraseMissing => 2011,
            RippleError::DistributionInsufficientFunds => 2012,
            RippleError::InsufficientXrp => 2013,
            RippleError::UnableToGetLatestLedger => 2014,
            RippleError::QueuedNotAccepted => 2015,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            RippleError::MiscError => {
                "Misc error when contacting Ripple. Please contact support."
            }
            RippleError::Timeout => "Timeout when contacting Ripple. Please try again later.",
            RippleError::InvalidAmount => "The amount specified is not a valid amount.",
            RippleError::InvalidCurrency => {
                "The currency is invalid. Ripple currencies must be 3 characters or longer."
            }
            RippleError::SubmitError => {
                "The Ripple node rejected the transaction submission. Please try again."
            }
            RippleError::IssuerMustBeGiven => {
                "If the currency is not XRP the issuer must be provided."
            }
            RippleError::SigningError => {
                "Unable to sign transaction. Is your passphrase correct?"
            }
            RippleError::SubmitErrorFeeLost => {
                "The transaction was submitted to the Ripple network but was invalid."
            }
            RippleError::InvalidCurrencyOrNoTrustline => {
                "The specified asset is invalid or you must activate the destination wallet to accept the asset."
            }
            RippleError::InvalidSource => "The specified source address is invalid.",
            RippleError::InvalidDestination => "The specified destination address is invalid.",
            RippleError::DistributionPassphraseMissing => {
                "If a distribution address is specified the passphrase for the distribution address must be given."
            }
            RippleError::DistributionInsufficientFunds => {
                "The specified distribution address does not contain sufficient funds. Please activate the address and try again."
            }
            RippleError::InsufficientXrp => {
                "There was insufficient XRP in the address to perform the payment. Please activate the address and try again."
            }
            RippleError::UnableToGetLatestLedger => {
                "Unable to retrieve the latest validated ledger. Please try again later."
            }
            RippleError::QueuedNotAccepted => {
                "The transaction was queued by the Ripple network but was not accepted into a validated ledger."
            }
        }
    }
}

/// Any taxonomy error, tagged by origin family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("{}", .0.description())]
    Generic(GenericError),
    #[error("{}", .0.description())]
    Counterparty(CounterpartyError),
    #[error("{}", .0.description())]
    Ripple(RippleError),
}

impl GatewayError {
    pub const fn code(&self) -> i64 {
        match self {
            GatewayError::Generic(e) => e.code(),
            GatewayError::Counterparty(e) => e.code(),
            GatewayError::Ripple(e) => e.code(),
        }
    }

    pub const fn description(&self) -> &'static str {
        match self {
            GatewayError::Generic(e) => e.description(),
            GatewayError::Counterparty(e) => e.description(),
            GatewayError::Ripple(e) => e.description(),
        }
    }
}

impl From<GenericError> for GatewayError {
    fn from(e: GenericError) -> Self {
        GatewayError::Generic(e)
    }
}

impl From<CounterpartyError> for GatewayError {
    fn from(e: CounterpartyError) -> Self {
        GatewayError::Counterparty(e)
    }
}

impl From<RippleError> for GatewayError {
    fn from(e: RippleError) -> Self {
        GatewayError::Ripple(e)
    }
}

/// The uniform JSON error body returned by every failing stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnCode {
    pub request_id: String,
    pub code: i64,
    pub description: String,
}

fn reply(request_id: &RequestId, status: StatusCode, code: i64, description: String) -> Response {
    let body = ReturnCode {
        request_id: request_id.to_string(),
        code,
        description,
    };
    (status, Json(body)).into_response()
}

pub fn forbidden(request_id: &RequestId, error: GenericError) -> Response {
    reply(
        request_id,
        StatusCode::FORBIDDEN,
        error.code(),
        error.description().to_string(),
    )
}

pub fn bad_request(request_id: &RequestId, code: i64, description: String) -> Response {
    reply(request_id, StatusCode::BAD_REQUEST, code, description)
}

pub fn unprocessable_entity(request_id: &RequestId, code: i64, description: String) -> Response {
    reply(request_id, StatusCode::UNPROCESSABLE_ENTITY, code, description)
}

pub fn not_found(request_id: &RequestId, code: i64, description: String) -> Response {
    reply(request_id, StatusCode::NOT_FOUND, code, description)
}

pub fn server_error(request_id: &RequestId) -> Response {
    reply(
        request_id,
        StatusCode::INTERNAL_SERVER_ERROR,
        GenericError::GeneralError.code(),
        GenericError::GeneralError.description().to_string(),
    )
}

pub fn server_error_with(request_id: &RequestId, code: i64, description: String) -> Response {
    reply(request_id, StatusCode::INTERNAL_SERVER_ERROR, code, description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_codes_are_stable() {
        assert_eq!(GenericError::InvalidDocument.code(), 1);
        assert_eq!(GenericError::InvalidSignature.code(), 6);
        assert_eq!(GenericError::InvalidNonce.code(), 7);
        assert_eq!(GenericError::FunctionNotAvailable.code(), 9);
        assert_eq!(GenericError::AccessKeyDisabled.code(), 16);
    }

    #[test]
    fn backend_codes_live_in_their_bands() {
        for e in [
            CounterpartyError::MiscError,
            CounterpartyError::Timeout,
            CounterpartyError::ReparsingOrUnavailable,
            CounterpartyError::SigningError,
            CounterpartyError::BroadcastError,
            CounterpartyError::InsufficientFees,
            CounterpartyError::DividendNotFound,
            CounterpartyError::ComposeError,
            CounterpartyError::InsufficientFunds,
            CounterpartyError::MalformedAddress,
            CounterpartyError::OnlyIssuerCanPayDividends,
            CounterpartyError::NoSuchAsset,
        ] {
            assert!((1000..1100).contains(&e.code()));
            assert!(!e.description().is_empty());
        }
        for e in [
            RippleError::MiscError,
            RippleError::SubmitErrorFeeLost,
            RippleError::UnableToGetLatestLedger,
            RippleError::QueuedNotAccepted,
        ] {
            assert!((2000..2100).contains(&e.code()));
            assert!(!e.description().is_empty());
        }
    }

    #[test]
    fn gateway_error_display_matches_description() {
        let e = GatewayError::from(RippleError::QueuedNotAccepted);
        assert_eq!(e.to_string(), RippleError::QueuedNotAccepted.description());
        assert_eq!(e.code(), 2015);
    }

    #[test]
    fn return_code_serializes_camel_case() {
        let body = ReturnCode {
            request_id: "abc".into(),
            code: 7,
            description: "Invalid nonce".into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["requestId"], "abc");
        assert_eq!(json["code"], 7);
    }
}
