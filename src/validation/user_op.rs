// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! UserOperation extraction from JSON-RPC params.
//!
//! Sponsorship methods share the layout
//! `[userOperation, entryPoint, chainId?, context?]`. Only the fields the
//! gateway validates are parsed; the request body itself is forwarded
//! untouched.

use alloy::primitives::{Address, Bytes};
use serde::Deserialize;
use serde_json::Value;

use super::catalog::PolicyCatalog;

/// The subset of a UserOperation the gateway inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserOperation {
    pub sender: Address,
    pub call_data: Bytes,
    /// v0.6 `initCode`, or v0.7 `factory ++ factoryData`.
    pub init_code: Option<Bytes>,
}

/// A UserOperation together with where it is headed.
#[derive(Debug, Clone)]
pub struct SponsorshipTarget {
    pub user_op: UserOperation,
    pub entry_point: Address,
    pub chain_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUserOperation {
    sender: Address,
    call_data: Bytes,
    #[serde(default)]
    init_code: Option<Bytes>,
    #[serde(default)]
    factory: Option<Address>,
    #[serde(default)]
    factory_data: Option<Bytes>,
}

impl RawUserOperation {
    fn into_user_op(self) -> Result<UserOperation, UserOpError> {
        if self.call_data.is_empty() {
            return Err(UserOpError::InvalidParams("callData is empty".to_string()));
        }

        let init_code = match (self.init_code, self.factory) {
            (Some(_), Some(_)) => {
                return Err(UserOpError::InvalidParams(
                    "both initCode and factory are set".to_string(),
                ))
            }
            (Some(code), None) => Some(code),
            (None, Some(factory)) => {
                let mut code = factory.to_vec();
                if let Some(data) = &self.factory_data {
                    code.extend_from_slice(data);
                }
                Some(Bytes::from(code))
            }
            (None, None) => None,
        }
        .filter(|code| !code.is_empty());

        Ok(UserOperation {
            sender: self.sender,
            call_data: self.call_data,
            init_code,
        })
    }
}

/// Parse and scope-check the params of a sponsorship method.
pub fn extract_target(
    params: &Value,
    catalog: &PolicyCatalog,
    expected_chain_id: u64,
) -> Result<SponsorshipTarget, UserOpError> {
    let params = params
        .as_array()
        .ok_or_else(|| UserOpError::InvalidParams("params must be an array".to_string()))?;

    let raw_op = params
        .first()
        .ok_or_else(|| UserOpError::InvalidParams("missing userOperation".to_string()))?;
    let user_op = RawUserOperation::deserialize(raw_op)
        .map_err(|e| UserOpError::InvalidParams(format!("userOperation: {e}")))?
        .into_user_op()?;

    let entry_point = params
        .get(1)
        .ok_or_else(|| UserOpError::InvalidParams("missing entryPoint".to_string()))
        .and_then(|v| {
            Address::deserialize(v)
                .map_err(|e| UserOpError::InvalidParams(format!("entryPoint: {e}")))
        })?;
    if !catalog.is_supported_entry_point(entry_point) {
        return Err(UserOpError::UnsupportedEntryPoint(entry_point));
    }

    let chain_id = match params.get(2) {
        None | Some(Value::Null) => None,
        Some(v) => Some(parse_chain_id(v)?),
    };
    if let Some(id) = chain_id {
        if id != expected_chain_id {
            return Err(UserOpError::UnsupportedChain(id));
        }
    }

    Ok(SponsorshipTarget {
        user_op,
        entry_point,
        chain_id,
    })
}

/// Chain ids arrive as `"0x2105"`, `"8453"` or `8453`.
fn parse_chain_id(value: &Value) -> Result<u64, UserOpError> {
    let invalid = || UserOpError::InvalidParams(format!("invalid chainId: {value}"));
    match value {
        Value::Number(n) => n.as_u64().ok_or_else(invalid),
        Value::String(s) => match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).map_err(|_| invalid()),
            None => s.parse().map_err(|_| invalid()),
        },
        _ => Err(invalid()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserOpError {
    #[error("{0}")]
    InvalidParams(String),

    #[error("entry point {0} is not supported")]
    UnsupportedEntryPoint(Address),

    #[error("chain {0} is not supported")]
    UnsupportedChain(u64),
}
