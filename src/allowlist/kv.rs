// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! KV REST (Upstash / Vercel KV) backed allowlist.
//!
//! Membership is `SISMEMBER {set_key} {lowercase address}` issued through the
//! REST command interface.

use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;

use super::postgrest::lowercase_hex;
use super::{AllowlistError, AllowlistStore};

pub struct KvAllowlist {
    base_url: url::Url,
    token: String,
    set_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct KvResponse {
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

impl KvAllowlist {
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        set_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AllowlistError> {
        let base_url = url::Url::parse(base_url)
            .map_err(|e| AllowlistError::InvalidConfig(format!("KV URL: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AllowlistError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            base_url,
            token: token.into(),
            set_key: set_key.into(),
            client,
        })
    }

    /// `{base}/sismember/{set_key}/{addr}` with each segment percent-encoded.
    fn lookup_url(&self, address: Address) -> Result<url::Url, AllowlistError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AllowlistError::InvalidConfig("KV URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["sismember", self.set_key.as_str(), &lowercase_hex(address)]);
        Ok(url)
    }
}

#[async_trait]
impl AllowlistStore for KvAllowlist {
    fn name(&self) -> &'static str {
        "kv"
    }

    async fn lookup(&self, address: Address) -> Result<bool, AllowlistError> {
        let response = self
            .client
            .get(self.lookup_url(address)?)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| AllowlistError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AllowlistError::Unavailable(format!(
                "HTTP {} from KV store",
                response.status()
            )));
        }

        let body: KvResponse = response
            .json()
            .await
            .map_err(|e| AllowlistError::Unavailable(e.to_string()))?;

        parse_membership(body)
    }
}

fn parse_membership(body: KvResponse) -> Result<bool, AllowlistError> {
    if let Some(error) = body.error {
        return Err(AllowlistError::Unavailable(error));
    }
    match body.result {
        Some(serde_json::Value::Number(n)) => Ok(n.as_u64() == Some(1)),
        Some(serde_json::Value::Bool(b)) => Ok(b),
        other => Err(AllowlistError::Unavailable(format!(
            "unexpected SISMEMBER result: {other:?}"
        ))),
    }
}
