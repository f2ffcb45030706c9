//! HTTP route table.
//!
//! Every authenticated route funnels through the pipeline and the dispatch
//! table; backend-qualified variants of the whole surface live under
//! `/counterparty` and `/ripple`, where the leading segment pins the
//! backend. `GET /` and `GET /serverinfo` are unauthenticated liveness
//! endpoints.

use axum::Router;
use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use rand::Rng;
use serde_json::json;
use std::sync::Arc;

use crate::app::AppState;
use crate::dispatch::{self, HandlerArgs, RequestType};
use crate::pipeline;

const QUOTES: &[&str] = &[
    "Only dead fish go with the flow.",
    "A ledger never forgets; a mempool always does.",
    "Seven times down, eight times up.",
    "Be yourself; everyone else is already taken.",
];

/// `GET /`: liveness probe answered with a random quote.
async fn index() -> Response {
    let number = rand::rng().random_range(0..QUOTES.len());
    (StatusCode::OK, format!("{}\n", QUOTES[number])).into_response()
}

/// `GET /serverinfo`: version and environment.
async fn serverinfo() -> Response {
    let env = std::env::var("ENV").unwrap_or_else(|_| "unspecified".to_string());
    let body = json!({
        "env": env,
        "version": {
            "full": env!("CARGO_PKG_VERSION"),
            "major": env!("CARGO_PKG_VERSION_MAJOR").parse::<u32>().unwrap_or(0),
            "minor": env!("CARGO_PKG_VERSION_MINOR").parse::<u32>().unwrap_or(0),
            "patch": env!("CARGO_PKG_VERSION_PATCH").parse::<u32>().unwrap_or(0),
        },
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json; charset=UTF-8")],
        body.to_string(),
    )
        .into_response()
}

/// Runs the pipeline and dispatches on success.
async fn handle(
    state: Arc<AppState>,
    path: String,
    headers: HeaderMap,
    path_param: Option<String>,
    body: Bytes,
    request_type: RequestType,
) -> Response {
    match pipeline::authenticate(&state, &path, &headers, &body, request_type).await {
        Ok((ctx, parsed)) => {
            dispatch::dispatch(
                state,
                ctx,
                request_type,
                HandlerArgs {
                    body: parsed,
                    path_param,
                },
            )
            .await
        }
        Err(response) => response,
    }
}

macro_rules! plain_route {
    ($request_type:expr) => {
        move |State(state): State<Arc<AppState>>,
              OriginalUri(uri): OriginalUri,
              headers: HeaderMap,
              body: Bytes| async move {
            handle(state, uri.path().to_string(), headers, None, body, $request_type).await
        }
    };
}

macro_rules! param_route {
    ($request_type:expr) => {
        move |State(state): State<Arc<AppState>>,
              OriginalUri(uri): OriginalUri,
              Path(param): Path<String>,
              headers: HeaderMap,
              body: Bytes| async move {
            handle(
                state,
                uri.path().to_string(),
                headers,
                Some(param),
                body,
                $request_type,
            )
            .await
        }
    };
}

/// The authenticated surface, mounted at the root and under each
/// backend-qualified prefix.
fn gateway_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payment", post(plain_route!(RequestType::SimplePayment)))
        .route("/payment/address", post(plain_route!(RequestType::Address)))
        .route(
            "/payment/address/{address}",
            get(param_route!(RequestType::PaymentsByAddress)),
        )
        .route("/payment/{paymentId}", get(param_route!(RequestType::GetPayment)))
        .route(
            "/payment/status/{paymentId}",
            post(param_route!(RequestType::PaymentRetry)),
        )
        .route("/asset", post(plain_route!(RequestType::Asset)))
        .route("/asset/{assetId}", get(param_route!(RequestType::GetAsset)))
        .route("/asset/dividend", post(plain_route!(RequestType::Dividend)))
        .route(
            "/asset/dividend/{dividendId}",
            get(param_route!(RequestType::GetDividend)),
        )
        .route(
            "/asset/issuances/{asset}",
            get(param_route!(RequestType::Issuances)),
        )
        .route("/asset/ledger/{asset}", get(param_route!(RequestType::Ledger)))
        .route("/wallet", post(plain_route!(RequestType::WalletCreate)))
        .route(
            "/wallet/balances/{address}",
            get(param_route!(RequestType::WalletBalance)),
        )
        .route("/wallet/payment", post(plain_route!(RequestType::WalletPayment)))
        .route(
            "/wallet/payment/{paymentId}",
            get(param_route!(RequestType::GetPayment)),
        )
        .route(
            "/wallet/activate/address/{address}",
            post(param_route!(RequestType::ActivateAddress)),
        )
        .route("/blocks", get(plain_route!(RequestType::Blocks)))
}

/// Stamps the documented charset onto JSON replies.
async fn set_json_charset(mut response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value == "application/json")
        .unwrap_or(false);
    if is_json {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json; charset=UTF-8"),
        );
    }
    response
}

/// The complete route table.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/serverinfo", get(serverinfo))
        .merge(gateway_routes())
        .nest("/counterparty", gateway_routes())
        .nest("/ripple", gateway_routes())
        .layer(axum::middleware::map_response(set_json_charset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn index_serves_a_quote() {
        let response = index().await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn serverinfo_reports_the_package_version() {
        let response = serverinfo().await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["version"]["full"], env!("CARGO_PKG_VERSION"));
        assert!(body["env"].is_string());
    }
}
