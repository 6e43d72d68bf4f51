// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for raw session credentials.
//!
//! Extraction never rejects: whether a session is required depends on the
//! methods in the body, which the gateway only knows after parsing it. The
//! token is verified later, and only when needed.
//!
//! The client address comes from the socket peer. `X-Forwarded-For` and
//! `X-Real-IP` are honored only when the gateway is configured to trust
//! them, i.e. when it runs behind a proxy that overwrites those headers.
//!
//! ```rust,ignore
//! async fn handler(credentials: SessionCredentials, body: Bytes) -> Response {
//!     let token = credentials.token()?;
//! }
//! ```

use std::{
    convert::Infallible,
    net::{IpAddr, SocketAddr},
};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap,
    },
};

use super::SessionError;
use crate::ratelimit::RateKey;
use crate::state::AppState;

/// Session token and client identity as presented by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    token: Result<String, SessionError>,
    client_ip: Option<String>,
}

impl SessionCredentials {
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Self {
        Self {
            token: session_token(headers, cookie_name),
            client_ip: None,
        }
    }

    pub fn with_client_ip(mut self, ip: Option<String>) -> Self {
        self.client_ip = ip;
        self
    }

    /// The presented token, or why none could be read.
    pub fn token(&self) -> Result<&str, SessionError> {
        self.token.as_deref().map_err(Clone::clone)
    }

    /// Rate-limit key for callers without a session.
    pub fn anonymous_key(&self) -> RateKey {
        match &self.client_ip {
            Some(ip) => RateKey::Anonymous(format!("anon:{ip}")),
            None => RateKey::Anonymous("anon".to_string()),
        }
    }
}

impl FromRequestParts<AppState> for SessionCredentials {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let ip = client_ip(&parts.headers, peer, state.trust_forwarded_for);
        Ok(Self::from_headers(&parts.headers, &state.session_cookie).with_client_ip(ip))
    }
}

/// Bearer header first, then the session cookie.
fn session_token(headers: &HeaderMap, cookie_name: &str) -> Result<String, SessionError> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        let value = value.to_str().map_err(|_| SessionError::InvalidAuthHeader)?;
        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::InvalidAuthHeader)?;
        return Ok(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
        .ok_or(SessionError::MissingToken)
}

/// Socket peer, unless forwarding headers are trusted and present.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_forwarded: bool) -> Option<String> {
    let forwarded = trust_forwarded.then(|| forwarded_ip(headers)).flatten();
    forwarded.or_else(|| peer.map(|ip| ip.to_string()))
}

/// Left-most `X-Forwarded-For` entry, else `X-Real-IP`.
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        })
        .map(str::to_string)
}
