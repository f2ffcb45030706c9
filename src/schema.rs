//! Static JSON schema table for request body validation.
//!
//! A `(backend, request type)` pair selects one schema. Request types with
//! no entry skip structural validation (their handlers validate path
//! captures instead). Validation failures aggregate every validator message
//! into a single description.

use jsonschema::Validator;
use once_cell::sync::Lazy;
use serde_json::{Value, json};
use std::collections::HashMap;

use crate::chain::BackendId;
use crate::dispatch::RequestType;

fn compile(schema: Value) -> Validator {
    jsonschema::validator_for(&schema).expect("static schema compiles")
}

static SCHEMAS: Lazy<HashMap<(BackendId, RequestType), Validator>> = Lazy::new(|| {
    use BackendId::{Counterparty, Ripple};
    let mut table = HashMap::new();

    table.insert(
        (Counterparty, RequestType::Asset),
        compile(json!({
            "properties": {
                "blockchainId": {"type": "string"},
                "sourceAddress": {"type": "string", "minLength": 34, "maxLength": 34},
                "passphrase": {"type": "string"},
                "distributionAddress": {"type": "string", "minLength": 34, "maxLength": 34},
                "distributionPassphrase": {"type": "string"},
                "description": {"type": "string"},
                "asset": {"type": "string", "minLength": 4},
                "quantity": {"type": "integer"},
                "divisible": {"type": "boolean"},
                "nonce": {"type": "integer"}
            },
            "required": ["sourceAddress", "passphrase", "asset", "quantity", "divisible"]
        })),
    );
    table.insert(
        (Counterparty, RequestType::Dividend),
        compile(json!({
            "properties": {
                "blockchainId": {"type": "string"},
                "sourceAddress": {"type": "string", "minLength": 34, "maxLength": 34},
                "passphrase": {"type": "string"},
                "asset": {"type": "string", "minLength": 4},
                "dividendAsset": {"type": "string"},
                "quantityPerUnit": {"type": "integer"},
                "nonce": {"type": "integer"}
            },
            "required": ["sourceAddress", "asset", "dividendAsset", "quantityPerUnit"]
        })),
    );
    table.insert(
        (Counterparty, RequestType::WalletCreate),
        compile(json!({
            "properties": {
                "blockchainId": {"type": "string"},
                "numberOfAddresses": {"type": "number", "minimum": 1, "maximum": 100},
                "nonce": {"type": "integer"}
            }
        })),
    );
    table.insert(
        (Counterparty, RequestType::WalletPayment),
        compile(json!({
            "properties": {
                "blockchainId": {"type": "string"},
                "sourceAddress": {"type": "string", "minLength": 34, "maxLength": 34},
                "destinationAddress": {"type": "string", "minLength": 34, "maxLength": 34},
                "passphrase": {"type": "string"},
                "asset": {"type": "string", "minLength": 4},
                "quantity": {"type": "integer"},
                "paymentTag": {"type": "string"},
                "nonce": {"type": "integer"}
            },
            "required": ["sourceAddress", "asset", "quantity", "destinationAddress"]
        })),
    );
    table.insert(
        (Counterparty, RequestType::SimplePayment),
        compile(json!({
            "properties": {
                "sourceAddress": {"type": "string", "minLength": 34, "maxLength": 34},
                "destinationAddress": {"type": "string", "minLength": 34, "maxLength": 34},
                "asset": {"type": "string", "minLength": 4},
                "amount": {"type": "integer"},
                "txFee": {"type": "integer"},
                "paymentTag": {"type": "string"},
                "nonce": {"type": "integer"}
            },
            "required": ["sourceAddress", "destinationAddress", "asset", "amount"]
        })),
    );
    table.insert(
        (Counterparty, RequestType::ActivateAddress),
        compile(json!({
            "properties": {
                "blockchainId": {"type": "string"},
                "address": {"type": "string", "minLength": 34, "maxLength": 34},
                "amount": {"type": "integer"},
                "nonce": {"type": "integer"}
            },
            "required": ["amount"]
        })),
    );

    table.insert(
        (Ripple, RequestType::Asset),
        compile(json!({
            "properties": {
                "blockchainId": {"type": "string"},
                "sourceAddress": {"type": "string"},
                "passphrase": {"type": "string"},
                "distributionAddress": {"type": "string"},
                "distributionPassphrase": {"type": "string"},
                "description": {"type": "string"},
                "asset": {"type": "string", "minLength": 4},
                "quantity": {"type": "integer"},
                "divisible": {"type": "boolean"},
                "nonce": {"type": "integer"}
            },
            "required": ["sourceAddress", "passphrase", "asset", "quantity", "divisible"]
        })),
    );
    table.insert(
        (Ripple, RequestType::WalletCreate),
        compile(json!({
            "properties": {
                "blockchainId": {"type": "string"},
                "nonce": {"type": "integer"}
            }
        })),
    );
    table.insert(
        (Ripple, RequestType::WalletPayment),
        compile(json!({
            "properties": {
                "blockchainId": {"type": "string"},
                "sourceAddress": {"type": "string"},
                "destinationAddress": {"type": "string"},
                "passphrase": {"type": "string"},
                "asset": {"type": "string", "minLength": 3},
                "issuer": {"type": "string"},
                "quantity": {"type": "integer"},
                "paymentTag": {"type": "string"},
                "nonce": {"type": "integer"}
            },
            "required": ["sourceAddress", "asset", "quantity", "destinationAddress"]
        })),
    );
    table.insert(
        (Ripple, RequestType::ActivateAddress),
        compile(json!({
            "properties": {
                "blockchainId": {"type": "string"},
                "address": {"type": "string"},
                "passphrase": {"type": "string"},
                "amount": {"type": "integer"},
                "assets": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "currency": {"type": "string"},
                            "issuer": {"type": "string"}
                        }
                    }
                },
                "nonce": {"type": "integer"}
            },
            "required": ["amount"]
        })),
    );

    table
});

/// Validates `body` against the schema registered for the pair, if any.
/// Returns the aggregated validator messages on failure.
pub fn validate(
    backend: BackendId,
    request_type: RequestType,
    body: &Value,
) -> Result<(), String> {
    let Some(validator) = SCHEMAS.get(&(backend, request_type)) else {
        return Ok(());
    };
    let messages: Vec<String> = validator
        .iter_errors(body)
        .map(|error| format!("{error}. "))
        .collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "There was a problem with the parameters in your JSON request. Please correct these errors : {}",
            messages.concat()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuance_request_from_the_public_docs_validates() {
        let body = json!({
            "sourceAddress": "1CipmbDRHn89cgqs6XbjswkrDxvCKA8Tfb",
            "passphrase": "attention stranger fate plain huge poetry view precious drug world try age",
            "asset": "ENUTEST",
            "quantity": 100000,
            "divisible": false
        });
        assert!(validate(BackendId::Counterparty, RequestType::Asset, &body).is_ok());
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        let body = json!({"asset": "ENUTEST"});
        let err = validate(BackendId::Counterparty, RequestType::Asset, &body).unwrap_err();
        assert!(err.contains("sourceAddress"), "{err}");
        assert!(err.contains("passphrase"), "{err}");
        assert!(err.contains("quantity"), "{err}");
    }

    #[test]
    fn address_length_is_enforced_for_the_bitcoin_family() {
        let body = json!({
            "sourceAddress": "tooshort",
            "destinationAddress": "1KgUFkLpypNbNsJJKsTN5qjwq76gKWsH7d",
            "asset": "GOLD1",
            "quantity": 5
        });
        assert!(validate(BackendId::Counterparty, RequestType::WalletPayment, &body).is_err());
    }

    #[test]
    fn ripple_payment_accepts_three_char_assets() {
        let body = json!({
            "sourceAddress": "rEXAMPLEsource",
            "destinationAddress": "rEXAMPLEdest",
            "asset": "XRP",
            "quantity": 1000000
        });
        assert!(validate(BackendId::Ripple, RequestType::WalletPayment, &body).is_ok());
    }

    #[test]
    fn unregistered_pairs_skip_validation() {
        let body = json!({"whatever": true});
        assert!(validate(BackendId::Ripple, RequestType::GetPayment, &body).is_ok());
    }

    #[test]
    fn quantity_must_be_an_integer() {
        let body = json!({
            "sourceAddress": "1CipmbDRHn89cgqs6XbjswkrDxvCKA8Tfb",
            "passphrase": "a b c",
            "asset": "ENUTEST",
            "quantity": "lots",
            "divisible": true
        });
        let err = validate(BackendId::Counterparty, RequestType::Asset, &body).unwrap_err();
        assert!(err.contains("quantity") || err.contains("lots"), "{err}");
    }
}
