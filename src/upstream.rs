// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Upstream paymaster/bundler forwarding.
//!
//! The validated request body is relayed byte for byte and the upstream
//! status and body come back unmodified. The upstream URL usually embeds an
//! API key, so it is never logged.

use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
};

/// What the sponsor answered.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

#[async_trait]
pub trait Upstream: Send + Sync {
    /// POST `body` to the sponsor.
    async fn forward(&self, body: Bytes) -> Result<UpstreamResponse, UpstreamError>;
}

/// reqwest-backed [`Upstream`].
pub struct HttpUpstream {
    url: url::Url,
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let url = url::Url::parse(url).map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Unreachable(e.to_string()))?;

        Ok(Self { url, client })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward(&self, body: Bytes) -> Result<UpstreamResponse, UpstreamError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout
                } else {
                    // Strip the URL, it may carry credentials.
                    UpstreamError::Unreachable(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.without_url().to_string()))?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("invalid upstream URL: {0}")]
    InvalidUrl(String),

    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("upstream timed out")]
    Timeout,

    #[error("upstream response could not be read: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    pub fn reason(&self) -> &'static str {
        match self {
            UpstreamError::InvalidUrl(_) => "upstream_misconfigured",
            UpstreamError::Unreachable(_) => "upstream_unreachable",
            UpstreamError::Timeout => "upstream_timeout",
            UpstreamError::InvalidResponse(_) => "upstream_invalid_response",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_url() {
        assert!(matches!(
            HttpUpstream::new("paymaster", Duration::from_secs(1)),
            Err(UpstreamError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_an_error() {
        let upstream =
            HttpUpstream::new("http://127.0.0.1:9/rpc?apikey=secret", Duration::from_millis(500))
                .unwrap();
        let err = upstream
            .forward(Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UpstreamError::Unreachable(_) | UpstreamError::Timeout
        ));
        assert!(!err.to_string().contains("secret"));
    }
}
