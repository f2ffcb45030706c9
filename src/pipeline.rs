//! Request authentication and validation pipeline.
//!
//! Transforms an inbound HTTP request into a validated [`RequestContext`]
//! plus parsed body, or a terminal error response. Stages run in a fixed
//! order and each failure is fatal: request-id assignment, header presence,
//! access-key lookup, body cap, HMAC verification, nonce check, backend
//! resolution, schema validation. Dispatch (stage 9) lives in
//! [`crate::dispatch`].

use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::response::Response;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

use crate::app::AppState;
use crate::chain::BackendId;
use crate::config::Env;
use crate::dispatch::RequestType;
use crate::errors::{self, GenericError};
use crate::ids::{self, RequestId};
use crate::schema;
use crate::store::{ACCESS_KEY_DISABLED, ACCESS_KEY_VALID};

/// Upper bound on request bodies: 512 KiB.
pub const MAX_BODY_BYTES: usize = 512 * 1024;

/// Validated identity and routing facts for one request, pinned before any
/// handler runs and carried through logging and background work.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub access_key: String,
    pub backend: BackendId,
    pub env: Env,
}

/// Runs stages 1-8 of the pipeline. On success the parsed body (an empty
/// body reads as `{}`) and the pinned context come back; on failure the
/// terminal error response is already written.
pub async fn authenticate(
    state: &Arc<AppState>,
    path: &str,
    headers: &HeaderMap,
    body: &Bytes,
    request_type: RequestType,
) -> Result<(RequestContext, Value), Response> {
    // Stage 1: request-id assignment.
    let request_id = RequestId::generate();
    tracing::info!(request_id = %request_id, path, "request entered");

    // Stage 2: header presence.
    let access_key = header_value(headers, "AccessKey");
    let signature = header_value(headers, "Signature");
    let (Some(access_key), Some(signature)) = (access_key, signature) else {
        tracing::error!(request_id = %request_id, "accessKey or signature header missing");
        state.fluent.log_auth_failure(&request_id, "", "headers incorrect");
        return Err(errors::forbidden(&request_id, GenericError::HeadersIncorrect));
    };

    // Stage 3: access-key existence and status.
    match state.store.get_status_by_user_key(&access_key).await {
        Ok(Some(status)) if status == ACCESS_KEY_VALID => {}
        Ok(Some(status)) if status == ACCESS_KEY_DISABLED => {
            tracing::error!(request_id = %request_id, access_key, "disabled access key");
            state.fluent.log_auth_failure(&request_id, &access_key, "access key disabled");
            return Err(errors::forbidden(&request_id, GenericError::AccessKeyDisabled));
        }
        Ok(Some(_)) | Ok(None) => {
            tracing::error!(request_id = %request_id, access_key, "unknown or revoked access key");
            state.fluent.log_auth_failure(&request_id, &access_key, "unknown access key");
            return Err(errors::forbidden(&request_id, GenericError::UnknownAccessKey));
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "access key lookup failed");
            return Err(errors::server_error(&request_id));
        }
    }

    // Stage 4: body length cap. The router hands us the complete body, so a
    // body over the cap is rejected rather than silently truncated.
    if body.len() > MAX_BODY_BYTES {
        tracing::error!(request_id = %request_id, length = body.len(), "request body exceeds cap");
        return Err(errors::bad_request(
            &request_id,
            GenericError::InvalidDocument.code(),
            format!(
                "Request body exceeds the {MAX_BODY_BYTES} byte limit and was not processed."
            ),
        ));
    }

    // Stage 5: HMAC over the exact bytes received.
    let secret = match state.store.get_secret_by_access_key(&access_key).await {
        Ok(Some(secret)) => secret,
        Ok(None) => {
            tracing::error!(request_id = %request_id, access_key, "no secret for access key");
            return Err(errors::forbidden(&request_id, GenericError::UnknownAccessKey));
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "secret lookup failed");
            return Err(errors::server_error(&request_id));
        }
    };
    if !ids::verify_hmac512(body, &secret, &signature) {
        tracing::error!(request_id = %request_id, access_key, "HMAC signature mismatch");
        state.fluent.log_auth_failure(&request_id, &access_key, "invalid signature");
        return Err(errors::forbidden(&request_id, GenericError::InvalidSignature));
    }

    // Parse the body; empty reads as the empty object.
    let parsed: Value = if body.is_empty() {
        Value::Object(serde_json::Map::new())
    } else {
        match serde_json::from_slice(body) {
            Ok(Value::Object(map)) => Value::Object(map),
            Ok(_) | Err(_) => {
                tracing::info!(request_id = %request_id, "malformed request body");
                return Err(errors::bad_request(
                    &request_id,
                    GenericError::InvalidDocument.code(),
                    "The request did not contain a valid JSON object".to_string(),
                ));
            }
        }
    };

    // Stage 6: nonce check. Callers who omit the nonce opt out of replay
    // protection for that call.
    if let Some(nonce) = parsed.get("nonce").and_then(Value::as_i64) {
        if nonce > 0 {
            let stored = match state.store.get_nonce_by_access_key(&access_key).await {
                Ok(stored) => stored,
                Err(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "nonce lookup failed");
                    return Err(errors::server_error(&request_id));
                }
            };
            if nonce <= stored {
                tracing::error!(
                    request_id = %request_id,
                    access_key,
                    nonce,
                    stored,
                    "nonce is not greater than the stored nonce"
                );
                state.fluent.log_auth_failure(&request_id, &access_key, "invalid nonce");
                return Err(errors::forbidden(&request_id, GenericError::InvalidNonce));
            }
            if let Err(e) = state.store.update_nonce(&access_key, nonce).await {
                tracing::error!(request_id = %request_id, error = %e, "nonce update failed");
                return Err(errors::server_error(&request_id));
            }
        }
    }

    // Stage 7: backend resolution. Precedence: body > path > key default.
    let backend = match resolve_backend(state, &request_id, &access_key, path, &parsed).await {
        Ok(backend) => backend,
        Err(response) => return Err(response),
    };

    // Stage 8: schema validation for the (backend, request type) pair.
    if let Err(messages) = schema::validate(backend, request_type, &parsed) {
        tracing::error!(request_id = %request_id, backend = %backend, "schema validation failed");
        return Err(errors::unprocessable_entity(
            &request_id,
            GenericError::InvalidDocument.code(),
            messages,
        ));
    }

    tracing::info!(request_id = %request_id, backend = %backend, "parameters validated");
    Ok((
        RequestContext {
            request_id,
            access_key,
            backend,
            env: state.env,
        },
        parsed,
    ))
}

async fn resolve_backend(
    state: &Arc<AppState>,
    request_id: &RequestId,
    access_key: &str,
    path: &str,
    body: &Value,
) -> Result<BackendId, Response> {
    // Explicit blockchainId in the body wins, and an unsupported explicit
    // value is an error rather than a fallthrough.
    if let Some(requested) = body.get("blockchainId").and_then(Value::as_str) {
        if !requested.is_empty() {
            return BackendId::from_str(requested).map_err(|_| {
                tracing::error!(request_id = %request_id, requested, "unsupported blockchain in body");
                errors::bad_request(
                    request_id,
                    GenericError::UnsupportedBlockchain.code(),
                    format!(
                        "{} Given: {requested}",
                        GenericError::UnsupportedBlockchain.description()
                    ),
                )
            });
        }
    }

    // A leading path segment naming a backend pins it explicitly.
    if let Some(segment) = path.trim_start_matches('/').split('/').next() {
        if let Ok(backend) = BackendId::from_str(segment) {
            return Ok(backend);
        }
    }

    // Otherwise fall back to the access key's default.
    let default = state
        .store
        .get_blockchain_id_by_user_key(access_key)
        .await
        .map_err(|e| {
            tracing::error!(request_id = %request_id, error = %e, "default backend lookup failed");
            errors::server_error(request_id)
        })?;
    if let Some(default) = default {
        if let Ok(backend) = BackendId::from_str(&default) {
            return Ok(backend);
        }
    }

    let valid = BackendId::variants()
        .iter()
        .map(|b| b.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    tracing::error!(request_id = %request_id, "no valid backend for request");
    Err(errors::bad_request(
        request_id,
        GenericError::UnsupportedBlockchain.code(),
        format!("Unsupported blockchain. Valid values: {valid}"),
    ))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?.to_string();
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_cap_is_exactly_512_kib() {
        assert_eq!(MAX_BODY_BYTES, 524_288);
    }

    #[test]
    fn missing_headers_read_as_absent() {
        let headers = HeaderMap::new();
        assert!(header_value(&headers, "AccessKey").is_none());

        let mut headers = HeaderMap::new();
        headers.insert("AccessKey", "".parse().unwrap());
        assert!(header_value(&headers, "AccessKey").is_none());

        headers.insert("AccessKey", "abc123".parse().unwrap());
        assert_eq!(header_value(&headers, "AccessKey").as_deref(), Some("abc123"));
    }
}
