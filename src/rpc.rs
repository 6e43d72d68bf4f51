// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC 2.0 envelope parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{GatewayError, RpcFailure};

pub const JSONRPC_VERSION: &str = "2.0";

/// One JSON-RPC call as sent to the sponsor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SponsorshipRequest {
    /// Must be `"2.0"`
    #[schema(example = "2.0")]
    pub jsonrpc: String,
    /// Bundler or paymaster method name
    #[schema(example = "pm_sponsorUserOperation")]
    pub method: String,
    /// Method params, `[userOperation, entryPoint, chainId?, context?]` for
    /// sponsorship methods
    #[serde(default)]
    #[schema(value_type = Object)]
    pub params: Value,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub id: Value,
}

/// The inbound body: a single call or a non-empty batch.
#[derive(Debug, Clone)]
pub enum RpcBody {
    Single(SponsorshipRequest),
    Batch(Vec<SponsorshipRequest>),
}

impl RpcBody {
    /// Parse raw body bytes. Failures carry the id of the offending call
    /// when one can be read.
    pub fn parse(bytes: &[u8]) -> Result<Self, RpcFailure> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| RpcFailure::new(Value::Null, GatewayError::ParseError(e.to_string())))?;

        match value {
            Value::Array(items) if items.is_empty() => Err(RpcFailure::new(
                Value::Null,
                GatewayError::InvalidRequest("empty batch".to_string()),
            )),
            Value::Array(items) => items
                .into_iter()
                .map(parse_request)
                .collect::<Result<Vec<_>, _>>()
                .map(RpcBody::Batch),
            value @ Value::Object(_) => parse_request(value).map(RpcBody::Single),
            _ => Err(RpcFailure::new(
                Value::Null,
                GatewayError::InvalidRequest("body must be an object or an array".to_string()),
            )),
        }
    }

    /// Calls in body order.
    pub fn requests(&self) -> &[SponsorshipRequest] {
        match self {
            RpcBody::Single(request) => std::slice::from_ref(request),
            RpcBody::Batch(requests) => requests,
        }
    }

    /// Id to report for failures that concern the body as a whole.
    pub fn body_id(&self) -> Value {
        match self {
            RpcBody::Single(request) => request.id.clone(),
            RpcBody::Batch(_) => Value::Null,
        }
    }
}

fn parse_request(value: Value) -> Result<SponsorshipRequest, RpcFailure> {
    let id = value.get("id").cloned().unwrap_or(Value::Null);

    let request = SponsorshipRequest::deserialize(value)
        .map_err(|e| RpcFailure::new(id.clone(), GatewayError::InvalidRequest(e.to_string())))?;

    if request.jsonrpc != JSONRPC_VERSION {
        return Err(RpcFailure::new(
            id,
            GatewayError::InvalidRequest(format!("unsupported jsonrpc version {:?}", request.jsonrpc)),
        ));
    }

    Ok(request)
}
