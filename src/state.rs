// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use crate::allowlist::{
    AllowlistAuthority, AllowlistStore, KvAllowlist, PostgrestAllowlist, StaticAllowlist,
};
use crate::auth::{JwksManager, JwtSessionVerifier, SessionVerifier};
use crate::blockchain::{ChainReader, RpcChainClient, BASE_MAINNET_CHAIN_ID};
use crate::config::{self, ConfigError, GatewayConfig, SessionKeySource};
use crate::ratelimit::{RateLimiter, SystemClock};
use crate::upstream::{HttpUpstream, Upstream};
use crate::validation::catalog::PolicyCatalog;

const DEFAULT_SESSION_COOKIE: &str = "session";
const DEFAULT_RATE_LIMIT: u32 = 50;
const DEFAULT_RATE_LIMIT_CAPACITY: usize = 10_000;
const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared, read-mostly collaborators for every request.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<PolicyCatalog>,
    pub chain: Arc<dyn ChainReader>,
    pub chain_id: u64,
    pub allowlist: Arc<AllowlistAuthority>,
    /// `None` rejects every sponsorship request as unauthenticated.
    pub sessions: Option<Arc<dyn SessionVerifier>>,
    pub session_cookie: String,
    pub rate_limiter: Arc<RateLimiter>,
    /// Key anonymous callers by forwarding headers instead of the socket peer.
    pub trust_forwarded_for: bool,
    pub upstream: Arc<dyn Upstream>,
}

impl AppState {
    pub fn new(
        catalog: Arc<PolicyCatalog>,
        chain: Arc<dyn ChainReader>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        Self {
            catalog,
            chain,
            chain_id: BASE_MAINNET_CHAIN_ID,
            allowlist: Arc::new(AllowlistAuthority::disabled()),
            sessions: None,
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            rate_limiter: Arc::new(RateLimiter::new(
                DEFAULT_RATE_LIMIT,
                DEFAULT_RATE_LIMIT_CAPACITY,
                Arc::new(SystemClock),
            )),
            trust_forwarded_for: false,
            upstream,
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_allowlist(mut self, allowlist: AllowlistAuthority) -> Self {
        self.allowlist = Arc::new(allowlist);
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionVerifier>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_session_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Arc::new(limiter);
        self
    }

    pub fn with_trusted_forwarding(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Wire production collaborators from configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let chain = RpcChainClient::new(config.chain.clone()).map_err(|e| ConfigError::Invalid {
            var: config::CHAIN_RPC_URL_ENV,
            reason: e.to_string(),
        })?;
        let upstream = HttpUpstream::new(&config.upstream.url, config.upstream.timeout).map_err(
            |e| ConfigError::Invalid {
                var: config::UPSTREAM_URL_ENV,
                reason: e.to_string(),
            },
        )?;

        let mut state = Self::new(
            Arc::new(PolicyCatalog::new(config.platform.clone())),
            Arc::new(chain),
            Arc::new(upstream),
        )
        .with_chain_id(config.chain.chain_id)
        .with_allowlist(build_allowlist(config)?)
        .with_session_cookie(config.session.cookie_name.clone())
        .with_rate_limiter(RateLimiter::new(
            config.rate_limit.per_minute,
            config.rate_limit.capacity,
            Arc::new(SystemClock),
        ))
        .with_trusted_forwarding(config.rate_limit.trust_forwarded_for);

        if let Some(verifier) = build_session_verifier(config)? {
            state = state.with_sessions(verifier);
        }

        Ok(state)
    }
}

/// Stores are consulted PostgREST first, then KV, then the static list.
fn build_allowlist(config: &GatewayConfig) -> Result<AllowlistAuthority, ConfigError> {
    let settings = &config.allowlist;
    let mut stores: Vec<Arc<dyn AllowlistStore>> = Vec::new();

    if let Some(endpoint) = &settings.postgrest {
        let store = PostgrestAllowlist::new(
            &endpoint.url,
            endpoint.credential.clone(),
            endpoint.collection.clone(),
            settings.timeout,
        )
        .map_err(|e| ConfigError::Invalid {
            var: config::POSTGREST_URL_ENV,
            reason: e.to_string(),
        })?;
        stores.push(Arc::new(store));
    }

    if let Some(endpoint) = &settings.kv {
        let store = KvAllowlist::new(
            &endpoint.url,
            endpoint.credential.clone(),
            endpoint.collection.clone(),
            settings.timeout,
        )
        .map_err(|e| ConfigError::Invalid {
            var: config::KV_URL_ENV,
            reason: e.to_string(),
        })?;
        stores.push(Arc::new(store));
    }

    if !settings.addresses.is_empty() {
        stores.push(Arc::new(StaticAllowlist::new(settings.addresses.iter().copied())));
    }

    Ok(AllowlistAuthority::new(stores))
}

fn build_session_verifier(
    config: &GatewayConfig,
) -> Result<Option<Arc<dyn SessionVerifier>>, ConfigError> {
    let session = &config.session;
    let verifier = match &session.keys {
        None => return Ok(None),
        Some(SessionKeySource::Secret(secret)) => JwtSessionVerifier::with_secret(secret.as_bytes()),
        Some(SessionKeySource::JwksUrl(url)) => {
            let jwks = JwksManager::new(url.clone(), JWKS_FETCH_TIMEOUT).map_err(|e| {
                ConfigError::Invalid {
                    var: config::SESSION_JWKS_URL_ENV,
                    reason: e.to_string(),
                }
            })?;
            JwtSessionVerifier::with_jwks(jwks)
        }
    };

    Ok(Some(Arc::new(
        verifier
            .with_issuer(session.issuer.clone())
            .with_audience(session.audience.clone()),
    )))
}
