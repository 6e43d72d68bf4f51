// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Allowlist Authority
//!
//! Decides whether a session address may receive sponsorship.
//!
//! ## Store Precedence
//!
//! 1. PostgREST table (structured query store)
//! 2. KV REST set (key-value store)
//! 3. Static list from `ALLOWLIST_ADDRESSES`
//!
//! Only configured stores take part. The first store that answers decides.
//! A store that cannot be reached is skipped with a warning; if none of the
//! configured stores answers, the lookup fails closed. With no store
//! configured at all the authority runs in [`AllowlistMode::Disabled`] and
//! every session passes.

pub mod kv;
pub mod postgrest;

use std::collections::HashSet;
use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;

pub use kv::KvAllowlist;
pub use postgrest::PostgrestAllowlist;

/// Read-only membership lookup against one backing store.
#[async_trait]
pub trait AllowlistStore: Send + Sync {
    /// Short store name for logs.
    fn name(&self) -> &'static str;

    /// Whether `address` is on the list.
    async fn lookup(&self, address: Address) -> Result<bool, AllowlistError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowlistMode {
    Enforced,
    Disabled,
}

impl AllowlistMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AllowlistMode::Enforced => "enforced",
            AllowlistMode::Disabled => "disabled",
        }
    }
}

/// Outcome of an allowlist lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowlistDecision {
    pub mode: AllowlistMode,
    pub allowed: bool,
    /// Store that decided, `None` when disabled.
    pub source: Option<&'static str>,
}

/// Ordered set of allowlist stores.
pub struct AllowlistAuthority {
    stores: Vec<Arc<dyn AllowlistStore>>,
}

impl AllowlistAuthority {
    /// Stores are consulted in the given order.
    pub fn new(stores: Vec<Arc<dyn AllowlistStore>>) -> Self {
        Self { stores }
    }

    /// Authority with no stores: every session passes.
    pub fn disabled() -> Self {
        Self::new(Vec::new())
    }

    pub fn mode(&self) -> AllowlistMode {
        if self.stores.is_empty() {
            AllowlistMode::Disabled
        } else {
            AllowlistMode::Enforced
        }
    }

    pub async fn is_allowed(&self, address: Address) -> Result<AllowlistDecision, AllowlistError> {
        if self.stores.is_empty() {
            return Ok(AllowlistDecision {
                mode: AllowlistMode::Disabled,
                allowed: true,
                source: None,
            });
        }

        let mut last_error = None;
        for store in &self.stores {
            match store.lookup(address).await {
                Ok(allowed) => {
                    tracing::debug!(store = store.name(), %address, allowed, "Allowlist lookup");
                    return Ok(AllowlistDecision {
                        mode: AllowlistMode::Enforced,
                        allowed,
                        source: Some(store.name()),
                    });
                }
                Err(e) => {
                    tracing::warn!(store = store.name(), error = %e, "Allowlist store unavailable");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AllowlistError::Unavailable("no store answered".into())))
    }
}

/// Fixed in-memory list, typically from the environment.
#[derive(Debug, Clone, Default)]
pub struct StaticAllowlist {
    addresses: HashSet<Address>,
}

impl StaticAllowlist {
    pub fn new(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

#[async_trait]
impl AllowlistStore for StaticAllowlist {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn lookup(&self, address: Address) -> Result<bool, AllowlistError> {
        Ok(self.addresses.contains(&address))
    }
}

/// Allowlist lookup failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AllowlistError {
    #[error("allowlist store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid allowlist store configuration: {0}")]
    InvalidConfig(String),
}
