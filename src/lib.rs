//! chaingate: an authenticated HTTP gateway for issuing, transferring and
//! inspecting digital assets on heterogeneous blockchain backends.
//!
//! Clients speak JSON over a single REST surface; the gateway authenticates
//! each request with an API-key/HMAC-SHA-512 scheme with replay-resistant
//! nonces, validates the body against per-backend JSON schemas, dispatches
//! to the resolved backend and answers asynchronous work with a correlation
//! id while the on-chain flow completes in the background.
//!
//! # Modules
//!
//! - [`pipeline`] — request authentication: HMAC verification, nonce check,
//!   backend resolution, schema validation, context propagation.
//! - [`dispatch`] — the static `(backend, request type) → handler` table.
//! - [`handlers`] — the orchestrator: per-source-address serialized
//!   compose → sign → broadcast flows, wallet activation and the issuer
//!   gateway bootstrap.
//! - [`chain`] — backend adapters for the Bitcoin-based meta-protocol and
//!   the consensus ledger, plus the Bitcoin broadcast node.
//! - [`store`] — the persistent store facade over the gateway's relations.
//! - [`errors`] — the closed error taxonomy with stable integer codes.
//! - [`schema`] — static JSON schema table for request validation.
//! - [`ids`] — opaque identifiers and the HMAC primitives.
//! - [`locks`] — the per-source-address mutex map.
//! - [`fluent`] — fire-and-forget structured log forwarding.
//! - [`telemetry`] — tracing and OpenTelemetry initialization.

pub mod app;
pub mod chain;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod fluent;
pub mod handlers;
pub mod ids;
pub mod locks;
pub mod pipeline;
pub mod routes;
pub mod schema;
pub mod sig_down;
pub mod store;
pub mod telemetry;
pub mod types;
