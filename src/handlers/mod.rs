//! Orchestrator handlers.
//!
//! Mutating handlers respond `201 Created` with the generated correlation id
//! and a snapshot of the request, then schedule the on-chain work on a
//! background task. Read handlers run synchronously and attach a live
//! confirmation probe where the backend supports one. Handlers are plain
//! function pointers so the dispatch table stays a static map.

pub mod counterparty;
pub mod general;
pub mod ripple;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// 201 reply with the request snapshot for accepted asynchronous work.
pub(crate) fn created<T: Serialize>(body: &T) -> Response {
    (StatusCode::CREATED, Json(body)).into_response()
}

/// 200 reply for synchronous reads.
pub(crate) fn ok<T: Serialize>(body: &T) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}
