// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! PostgREST (Supabase) backed allowlist.
//!
//! Membership is a row in `{table}` whose `address` column holds the
//! lowercase hex address.

use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;

use super::{AllowlistError, AllowlistStore};

pub struct PostgrestAllowlist {
    base_url: url::Url,
    api_key: String,
    table: String,
    client: reqwest::Client,
}

impl PostgrestAllowlist {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        table: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AllowlistError> {
        let base_url = url::Url::parse(base_url)
            .map_err(|e| AllowlistError::InvalidConfig(format!("PostgREST URL: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AllowlistError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            base_url,
            api_key: api_key.into(),
            table: table.into(),
            client,
        })
    }

    /// `{base}/rest/v1/{table}?select=address&address=eq.{addr}&limit=1`
    fn lookup_url(&self, address: Address) -> Result<url::Url, AllowlistError> {
        let mut url = self
            .base_url
            .join(&format!("rest/v1/{}", self.table))
            .map_err(|e| AllowlistError::InvalidConfig(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("select", "address")
            .append_pair("address", &format!("eq.{}", lowercase_hex(address)))
            .append_pair("limit", "1");
        Ok(url)
    }
}

#[async_trait]
impl AllowlistStore for PostgrestAllowlist {
    fn name(&self) -> &'static str {
        "postgrest"
    }

    async fn lookup(&self, address: Address) -> Result<bool, AllowlistError> {
        let response = self
            .client
            .get(self.lookup_url(address)?)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AllowlistError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AllowlistError::Unavailable(format!(
                "HTTP {} from PostgREST",
                response.status()
            )));
        }

        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| AllowlistError::Unavailable(e.to_string()))?;

        Ok(!rows.is_empty())
    }
}

pub(crate) fn lowercase_hex(address: Address) -> String {
    format!("0x{}", alloy::hex::encode(address))
}
