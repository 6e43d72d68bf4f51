// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gateway rejections and their JSON-RPC error responses.

use alloy::primitives::Address;
use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::allowlist::AllowlistError;
use crate::auth::SessionError;
use crate::ratelimit::RateLimited;
use crate::rpc::JSONRPC_VERSION;
use crate::upstream::UpstreamError;
use crate::validation::{
    decoder::DecodeError, inner_calls::PolicyError, ownership::OwnershipError,
    user_op::UserOpError,
};

/// Every way the gateway can refuse or fail a request.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Only POST is supported")]
    HttpMethodNotAllowed,

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Request not authenticated")]
    Unauthenticated(SessionError),

    #[error("Rate limit exceeded")]
    RateLimited(RateLimited),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Unsupported target: {0}")]
    UnsupportedEntryPointOrChain(UserOpError),

    #[error("Invalid callData: {0}")]
    Decode(#[from] DecodeError),

    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] OwnershipError),

    #[error("Address {0} is not allowlisted for sponsorship")]
    AllowlistDenied(Address),

    #[error("Allowlist temporarily unavailable")]
    AllowlistUnavailable(#[from] AllowlistError),

    #[error("Call not allowed: {0}")]
    Policy(#[from] PolicyError),

    #[error("Upstream error")]
    Upstream(#[from] UpstreamError),
}

impl From<UserOpError> for GatewayError {
    fn from(e: UserOpError) -> Self {
        match e {
            UserOpError::InvalidParams(msg) => GatewayError::InvalidParams(msg),
            other => GatewayError::UnsupportedEntryPointOrChain(other),
        }
    }
}

impl From<SessionError> for GatewayError {
    fn from(e: SessionError) -> Self {
        GatewayError::Unauthenticated(e)
    }
}

impl From<RateLimited> for GatewayError {
    fn from(e: RateLimited) -> Self {
        GatewayError::RateLimited(e)
    }
}

impl GatewayError {
    /// JSON-RPC `error.code`.
    pub fn rpc_code(&self) -> i64 {
        match self {
            GatewayError::ParseError(_) => -32700,
            GatewayError::InvalidRequest(_) | GatewayError::HttpMethodNotAllowed => -32600,
            GatewayError::MethodNotAllowed(_) => -32601,
            GatewayError::InvalidParams(_)
            | GatewayError::UnsupportedEntryPointOrChain(_)
            | GatewayError::Decode(_) => -32602,
            GatewayError::AllowlistUnavailable(_) | GatewayError::Upstream(_) => -32603,
            GatewayError::Unauthorized(_)
            | GatewayError::AllowlistDenied(_)
            | GatewayError::Policy(_) => -32001,
            GatewayError::Unauthenticated(_) => -32002,
            GatewayError::RateLimited(_) => -32005,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::ParseError(_)
            | GatewayError::InvalidRequest(_)
            | GatewayError::InvalidParams(_)
            | GatewayError::UnsupportedEntryPointOrChain(_)
            | GatewayError::Decode(_) => StatusCode::BAD_REQUEST,
            GatewayError::HttpMethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            GatewayError::MethodNotAllowed(_)
            | GatewayError::Unauthorized(_)
            | GatewayError::AllowlistDenied(_)
            | GatewayError::Policy(_) => StatusCode::FORBIDDEN,
            GatewayError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::AllowlistUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable machine-readable code, sent as `error.data.reason`.
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayError::ParseError(_) => "parse_error",
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::HttpMethodNotAllowed => "http_method_not_allowed",
            GatewayError::MethodNotAllowed(_) => "method_not_allowed",
            GatewayError::Unauthenticated(e) => e.reason(),
            GatewayError::RateLimited(_) => "rate_limited",
            GatewayError::InvalidParams(_) => "invalid_params",
            GatewayError::UnsupportedEntryPointOrChain(UserOpError::UnsupportedChain(_)) => {
                "unsupported_chain"
            }
            GatewayError::UnsupportedEntryPointOrChain(_) => "unsupported_entry_point",
            GatewayError::Decode(e) => e.reason(),
            GatewayError::Unauthorized(e) => e.reason(),
            GatewayError::AllowlistDenied(_) => "not_allowlisted",
            GatewayError::AllowlistUnavailable(_) => "allowlist_unavailable",
            GatewayError::Policy(e) => e.reason(),
            GatewayError::Upstream(e) => e.reason(),
        }
    }

    /// Pipeline stage that produced the error, for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            GatewayError::ParseError(_)
            | GatewayError::InvalidRequest(_)
            | GatewayError::HttpMethodNotAllowed => "received",
            GatewayError::MethodNotAllowed(_) => "method_filter",
            GatewayError::Unauthenticated(_) => "authenticate",
            GatewayError::RateLimited(_) => "rate_check",
            GatewayError::InvalidParams(_) | GatewayError::UnsupportedEntryPointOrChain(_) => {
                "extract"
            }
            GatewayError::Decode(_) => "decode",
            GatewayError::Unauthorized(_) => "ownership",
            GatewayError::AllowlistDenied(_) | GatewayError::AllowlistUnavailable(_) => {
                "allowlist"
            }
            GatewayError::Policy(_) => "inner_calls",
            GatewayError::Upstream(_) => "forward",
        }
    }

    /// Client-facing message. RPC transport detail stays in the logs.
    fn message(&self) -> String {
        match self {
            GatewayError::Unauthorized(OwnershipError::ChainUnavailable(_)) => {
                "Unauthorized: account ownership could not be verified".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// A [`GatewayError`] attributed to a JSON-RPC call.
#[derive(Debug)]
pub struct RpcFailure {
    pub id: Value,
    pub method: Option<String>,
    pub error: GatewayError,
}

impl RpcFailure {
    pub fn new(id: Value, error: impl Into<GatewayError>) -> Self {
        Self {
            id,
            method: None,
            error: error.into(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    jsonrpc: &'static str,
    id: &'a Value,
    error: ErrorObject,
}

#[derive(Serialize)]
struct ErrorObject {
    code: i64,
    message: String,
    data: ErrorData,
}

#[derive(Serialize)]
struct ErrorData {
    reason: &'static str,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for RpcFailure {
    fn into_response(self) -> Response {
        let retry_after = match &self.error {
            GatewayError::RateLimited(limited) => Some(limited.retry_after_secs),
            _ => None,
        };

        let body = Json(ErrorEnvelope {
            jsonrpc: JSONRPC_VERSION,
            id: &self.id,
            error: ErrorObject {
                code: self.error.rpc_code(),
                message: self.error.message(),
                data: ErrorData {
                    reason: self.error.reason(),
                    retry_after,
                },
            },
        });

        let mut response = (self.error.status_code(), body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
