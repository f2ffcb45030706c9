//! Structured log forwarding.
//!
//! Fire-and-forget POSTs of `{tag, errorString, object}` records to a
//! Fluent-style HTTP collector. The object carries the request id, backend,
//! access id, caller location and severity, and is flattened to dotted keys
//! before emission. Sends never block a caller and a delivery failure never
//! propagates.

use serde_json::{Map, Value, json};
use std::panic::Location;

use crate::config::{Config, Env};
use crate::ids::RequestId;
use crate::pipeline::RequestContext;

pub const SEVERITY_INFO: &str = "INFO";
pub const SEVERITY_ERROR: &str = "ERROR";
/// Something occurred which impacts the caller's account, e.g. an address
/// activation or the completion of an asynchronous flow.
pub const SEVERITY_EVENT: &str = "EVENT";

#[derive(Debug, Clone)]
pub struct FluentSink {
    http: reqwest::Client,
    host: String,
    tag: String,
}

impl FluentSink {
    pub fn new(config: &Config, env: Env) -> Self {
        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
        FluentSink {
            http: reqwest::Client::new(),
            host: config.fluent_host.clone(),
            tag: format!("chaingate.{}.{}", env.as_str(), hostname),
        }
    }

    /// Forwards one structured record. Returns immediately; delivery happens
    /// on a detached task.
    #[track_caller]
    pub fn log(
        &self,
        severity: &str,
        request_id: &str,
        backend: &str,
        access_id: &str,
        message: &str,
    ) {
        let caller = Location::caller();
        let record = json!({
            "tag": self.tag,
            "errorString": message,
            "Object": {
                "requestId": request_id,
                "blockchainId": backend,
                "accessId": access_id,
                "caller": caller.file(),
                "lineNumber": caller.line(),
                "errorLevel": severity,
            },
        });
        self.emit(record);
    }

    /// Convenience for orchestrator code holding a full request context.
    #[track_caller]
    pub fn log_context(&self, severity: &str, ctx: &RequestContext, message: &str) {
        let caller = Location::caller();
        let record = json!({
            "tag": self.tag,
            "errorString": message,
            "Object": {
                "requestId": ctx.request_id.as_str(),
                "blockchainId": ctx.backend.as_str(),
                "accessId": ctx.access_key,
                "caller": caller.file(),
                "lineNumber": caller.line(),
                "errorLevel": severity,
            },
        });
        self.emit(record);
    }

    #[track_caller]
    pub fn log_auth_failure(&self, request_id: &RequestId, access_id: &str, message: &str) {
        let caller = Location::caller();
        let record = json!({
            "tag": self.tag,
            "errorString": message,
            "Object": {
                "requestId": request_id.as_str(),
                "blockchainId": "",
                "accessId": access_id,
                "caller": caller.file(),
                "lineNumber": caller.line(),
                "errorLevel": SEVERITY_ERROR,
            },
        });
        self.emit(record);
    }

    fn emit(&self, record: Value) {
        let flattened = flatten(&record, ".");
        let url = format!("{}/{}", self.host, self.tag);
        let http = self.http.clone();
        tokio::spawn(async move {
            if let Err(e) = http.post(&url).json(&flattened).send().await {
                // Telemetry delivery failures must never surface to callers.
                tracing::debug!(error = %e, "fluent forward failed");
            }
        });
    }
}

/// Flattens nested objects and arrays into a single level of dotted keys:
/// `{"a": {"b": 1}, "c": [2]}` becomes `{"a.b": 1, "c.0": 2}`.
pub fn flatten(value: &Value, separator: &str) -> Value {
    let mut out = Map::new();
    flatten_into(&mut out, value, String::new(), separator);
    Value::Object(out)
}

fn flatten_into(out: &mut Map<String, Value>, value: &Value, prefix: String, separator: &str) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}{separator}{key}")
                };
                flatten_into(out, child, child_key, separator);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let child_key = if prefix.is_empty() {
                    index.to_string()
                } else {
                    format!("{prefix}{separator}{index}")
                };
                flatten_into(out, child, child_key, separator);
            }
        }
        other => {
            out.insert(prefix, other.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_objects_flatten_to_dotted_keys() {
        let record = json!({
            "tag": "chaingate.dev.host",
            "errorString": "boom",
            "Object": {
                "requestId": "abc",
                "lineNumber": 12,
            },
        });
        let flat = flatten(&record, ".");
        assert_eq!(flat["tag"], "chaingate.dev.host");
        assert_eq!(flat["Object.requestId"], "abc");
        assert_eq!(flat["Object.lineNumber"], 12);
        assert!(flat.get("Object").is_none());
    }

    #[test]
    fn arrays_flatten_with_index_keys() {
        let record = json!({"balances": [{"asset": "GOLD"}, {"asset": "XRP"}]});
        let flat = flatten(&record, ".");
        assert_eq!(flat["balances.0.asset"], "GOLD");
        assert_eq!(flat["balances.1.asset"], "XRP");
    }

    #[test]
    fn scalars_keep_their_key() {
        let flat = flatten(&json!({"a": 1}), ".");
        assert_eq!(flat, json!({"a": 1}));
    }
}
