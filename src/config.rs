// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup. Empty values
//! count as unset.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `UPSTREAM_URL` / `PAYMASTER_URL` | Sponsor JSON-RPC endpoint | Required |
//! | `UPSTREAM_TIMEOUT_MS` | Upstream request timeout | `15000` |
//! | `CHAIN_RPC_URL` / `RPC_URL` | Chain RPC for ownership reads | `https://mainnet.base.org` |
//! | `CHAIN_ID` | Chain sponsorship is scoped to | `8453` |
//! | `CHAIN_RPC_TIMEOUT_MS` | Chain read timeout | `5000` |
//! | `RATE_LIMIT_PER_MINUTE` | Requests per key per window | `50` |
//! | `RATE_LIMIT_CAPACITY` | Max keys tracked per limiter table | `10000` |
//! | `TRUST_FORWARDED_FOR` | Key anonymous callers by `X-Forwarded-For` / `X-Real-IP` | `false` |
//! | `SESSION_JWT_SECRET` | HS256 session secret (wins over JWKS) | None |
//! | `SESSION_JWKS_URL` | Session JWKS endpoint | None |
//! | `SESSION_ISSUER` | Expected session `iss` | None |
//! | `SESSION_AUDIENCE` | Expected session `aud` | None |
//! | `SESSION_COOKIE_NAME` | Cookie carrying the session token | `session` |
//! | `ALLOWLIST_POSTGREST_URL` / `SUPABASE_URL` | PostgREST allowlist base URL | None |
//! | `ALLOWLIST_POSTGREST_KEY` / `SUPABASE_SERVICE_ROLE_KEY` | PostgREST key | Required with URL |
//! | `ALLOWLIST_POSTGREST_TABLE` | Allowlist table | `sponsor_allowlist` |
//! | `ALLOWLIST_KV_URL` / `KV_REST_API_URL` | KV REST base URL | None |
//! | `ALLOWLIST_KV_TOKEN` / `KV_REST_API_TOKEN` | KV REST token | Required with URL |
//! | `ALLOWLIST_KV_SET` | Allowlist set key | `sponsor:allowlist` |
//! | `ALLOWLIST_ADDRESSES` | Comma-separated static allowlist | None |
//! | `ALLOWLIST_TIMEOUT_MS` | Allowlist store timeout | `3000` |
//! | `DEPLOY_BATCHER_ADDRESS` | Deploy batcher contract | Required |
//! | `ACTIVATION_BATCHER_ADDRESS` | Activation batcher contract | Required |
//! | `PERMIT2_ADDRESS` | Permit contract | Canonical Permit2 |
//! | `ACCOUNT_FACTORY_ADDRESSES` | Comma-separated account factories | Coinbase Smart Wallet factory |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files, TLS when both set | None |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=info` |
//!
//! Where two names are listed, the first wins.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;

use crate::blockchain::{ChainConfig, BASE_MAINNET_CHAIN_ID, BASE_MAINNET_RPC_URL};
use crate::validation::catalog::PlatformContracts;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const UPSTREAM_URL_ENV: &str = "UPSTREAM_URL";
pub const UPSTREAM_URL_FALLBACK_ENV: &str = "PAYMASTER_URL";
pub const UPSTREAM_TIMEOUT_ENV: &str = "UPSTREAM_TIMEOUT_MS";
pub const CHAIN_RPC_URL_ENV: &str = "CHAIN_RPC_URL";
pub const CHAIN_RPC_URL_FALLBACK_ENV: &str = "RPC_URL";
pub const CHAIN_ID_ENV: &str = "CHAIN_ID";
pub const CHAIN_RPC_TIMEOUT_ENV: &str = "CHAIN_RPC_TIMEOUT_MS";
pub const RATE_LIMIT_PER_MINUTE_ENV: &str = "RATE_LIMIT_PER_MINUTE";
pub const RATE_LIMIT_CAPACITY_ENV: &str = "RATE_LIMIT_CAPACITY";
pub const TRUST_FORWARDED_FOR_ENV: &str = "TRUST_FORWARDED_FOR";
pub const SESSION_JWT_SECRET_ENV: &str = "SESSION_JWT_SECRET";
pub const SESSION_JWKS_URL_ENV: &str = "SESSION_JWKS_URL";
pub const SESSION_ISSUER_ENV: &str = "SESSION_ISSUER";
pub const SESSION_AUDIENCE_ENV: &str = "SESSION_AUDIENCE";
pub const SESSION_COOKIE_NAME_ENV: &str = "SESSION_COOKIE_NAME";
pub const POSTGREST_URL_ENV: &str = "ALLOWLIST_POSTGREST_URL";
pub const POSTGREST_URL_FALLBACK_ENV: &str = "SUPABASE_URL";
pub const POSTGREST_KEY_ENV: &str = "ALLOWLIST_POSTGREST_KEY";
pub const POSTGREST_KEY_FALLBACK_ENV: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const POSTGREST_TABLE_ENV: &str = "ALLOWLIST_POSTGREST_TABLE";
pub const KV_URL_ENV: &str = "ALLOWLIST_KV_URL";
pub const KV_URL_FALLBACK_ENV: &str = "KV_REST_API_URL";
pub const KV_TOKEN_ENV: &str = "ALLOWLIST_KV_TOKEN";
pub const KV_TOKEN_FALLBACK_ENV: &str = "KV_REST_API_TOKEN";
pub const KV_SET_ENV: &str = "ALLOWLIST_KV_SET";
pub const ALLOWLIST_ADDRESSES_ENV: &str = "ALLOWLIST_ADDRESSES";
pub const ALLOWLIST_TIMEOUT_ENV: &str = "ALLOWLIST_TIMEOUT_MS";
pub const DEPLOY_BATCHER_ENV: &str = "DEPLOY_BATCHER_ADDRESS";
pub const ACTIVATION_BATCHER_ENV: &str = "ACTIVATION_BATCHER_ADDRESS";
pub const PERMIT2_ENV: &str = "PERMIT2_ADDRESS";
pub const ACCOUNT_FACTORIES_ENV: &str = "ACCOUNT_FACTORY_ADDRESSES";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_CHAIN_RPC_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_ALLOWLIST_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 50;
const DEFAULT_RATE_LIMIT_CAPACITY: usize = 10_000;
const DEFAULT_SESSION_COOKIE: &str = "session";
const DEFAULT_POSTGREST_TABLE: &str = "sponsor_allowlist";
const DEFAULT_KV_SET: &str = "sponsor:allowlist";

/// Everything the gateway needs to start.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub upstream: UpstreamConfig,
    pub chain: ChainConfig,
    pub rate_limit: RateLimitConfig,
    pub session: SessionConfig,
    pub allowlist: AllowlistConfig,
    pub platform: PlatformContracts,
    pub tls: Option<TlsConfig>,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub per_minute: u32,
    pub capacity: usize,
    /// Only safe behind a proxy that overwrites forwarding headers.
    pub trust_forwarded_for: bool,
}

/// Source of session verification keys.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionKeySource {
    Secret(String),
    JwksUrl(String),
}

impl std::fmt::Debug for SessionKeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionKeySource::Secret(_) => f.write_str("Secret(<redacted>)"),
            SessionKeySource::JwksUrl(url) => f.debug_tuple("JwksUrl").field(url).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// `None` means no session can be verified.
    pub keys: Option<SessionKeySource>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub cookie_name: String,
}

/// A store endpoint with its credential.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreEndpoint {
    pub url: String,
    pub credential: String,
    /// Table (PostgREST) or set key (KV)
    pub collection: String,
}

impl std::fmt::Debug for StoreEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEndpoint")
            .field("url", &self.url)
            .field("credential", &"<redacted>")
            .field("collection", &self.collection)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AllowlistConfig {
    pub postgrest: Option<StoreEndpoint>,
    pub kv: Option<StoreEndpoint>,
    pub addresses: Vec<Address>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl GatewayConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| non_empty(lookup(name));

        let upstream_url = resolve_with_fallback(&var, UPSTREAM_URL_ENV, UPSTREAM_URL_FALLBACK_ENV)
            .ok_or(ConfigError::Missing(UPSTREAM_URL_ENV))?;

        let chain = ChainConfig {
            chain_id: parse_or(&var, CHAIN_ID_ENV, BASE_MAINNET_CHAIN_ID)?,
            rpc_url: resolve_with_fallback(&var, CHAIN_RPC_URL_ENV, CHAIN_RPC_URL_FALLBACK_ENV)
                .unwrap_or_else(|| BASE_MAINNET_RPC_URL.to_string()),
            timeout: millis_or(&var, CHAIN_RPC_TIMEOUT_ENV, DEFAULT_CHAIN_RPC_TIMEOUT_MS)?,
        };

        let rate_limit = RateLimitConfig {
            per_minute: parse_or(&var, RATE_LIMIT_PER_MINUTE_ENV, DEFAULT_RATE_LIMIT_PER_MINUTE)?,
            capacity: parse_or(&var, RATE_LIMIT_CAPACITY_ENV, DEFAULT_RATE_LIMIT_CAPACITY)?,
            trust_forwarded_for: parse_or(&var, TRUST_FORWARDED_FOR_ENV, false)?,
        };

        let session = SessionConfig {
            keys: resolve_session_keys(&var),
            issuer: var(SESSION_ISSUER_ENV),
            audience: var(SESSION_AUDIENCE_ENV),
            cookie_name: var(SESSION_COOKIE_NAME_ENV)
                .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string()),
        };

        let allowlist = AllowlistConfig {
            postgrest: resolve_store(
                &var,
                StoreVars {
                    url: (POSTGREST_URL_ENV, POSTGREST_URL_FALLBACK_ENV),
                    credential: (POSTGREST_KEY_ENV, POSTGREST_KEY_FALLBACK_ENV),
                    collection: POSTGREST_TABLE_ENV,
                    default_collection: DEFAULT_POSTGREST_TABLE,
                },
            )?,
            kv: resolve_store(
                &var,
                StoreVars {
                    url: (KV_URL_ENV, KV_URL_FALLBACK_ENV),
                    credential: (KV_TOKEN_ENV, KV_TOKEN_FALLBACK_ENV),
                    collection: KV_SET_ENV,
                    default_collection: DEFAULT_KV_SET,
                },
            )?,
            addresses: address_list(&var, ALLOWLIST_ADDRESSES_ENV)?.unwrap_or_default(),
            timeout: millis_or(&var, ALLOWLIST_TIMEOUT_ENV, DEFAULT_ALLOWLIST_TIMEOUT_MS)?,
        };

        let mut platform = PlatformContracts::new(
            required_address(&var, DEPLOY_BATCHER_ENV)?,
            required_address(&var, ACTIVATION_BATCHER_ENV)?,
        );
        if let Some(permit) = var(PERMIT2_ENV) {
            platform.permit = parse_address(PERMIT2_ENV, &permit)?;
        }
        if let Some(factories) = address_list(&var, ACCOUNT_FACTORIES_ENV)? {
            platform.account_factories = factories;
        }

        Ok(Self {
            host: var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&var, PORT_ENV, DEFAULT_PORT)?,
            upstream: UpstreamConfig {
                url: upstream_url,
                timeout: millis_or(&var, UPSTREAM_TIMEOUT_ENV, DEFAULT_UPSTREAM_TIMEOUT_MS)?,
            },
            chain,
            rate_limit,
            session,
            allowlist,
            platform,
            tls: resolve_tls(&var)?,
            log_format: resolve_log_format(&var)?,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `primary` if set, else `fallback`.
pub fn resolve_with_fallback(
    var: &impl Fn(&str) -> Option<String>,
    primary: &str,
    fallback: &str,
) -> Option<String> {
    var(primary).or_else(|| var(fallback))
}

/// Shared secret wins over JWKS.
pub fn resolve_session_keys(var: &impl Fn(&str) -> Option<String>) -> Option<SessionKeySource> {
    var(SESSION_JWT_SECRET_ENV)
        .map(SessionKeySource::Secret)
        .or_else(|| var(SESSION_JWKS_URL_ENV).map(SessionKeySource::JwksUrl))
}

/// Variable names describing one allowlist store.
pub struct StoreVars {
    pub url: (&'static str, &'static str),
    pub credential: (&'static str, &'static str),
    pub collection: &'static str,
    pub default_collection: &'static str,
}

/// A store is configured when its URL is set; the credential is then
/// mandatory.
pub fn resolve_store(
    var: &impl Fn(&str) -> Option<String>,
    vars: StoreVars,
) -> Result<Option<StoreEndpoint>, ConfigError> {
    let Some(url) = resolve_with_fallback(var, vars.url.0, vars.url.1) else {
        return Ok(None);
    };
    let credential = resolve_with_fallback(var, vars.credential.0, vars.credential.1)
        .ok_or(ConfigError::MissingCredential {
            url_var: vars.url.0,
            credential_var: vars.credential.0,
        })?;

    Ok(Some(StoreEndpoint {
        url,
        credential,
        collection: var(vars.collection).unwrap_or_else(|| vars.default_collection.to_string()),
    }))
}

/// TLS is on when both paths are set and off when neither is.
pub fn resolve_tls(var: &impl Fn(&str) -> Option<String>) -> Result<Option<TlsConfig>, ConfigError> {
    match (var(TLS_CERT_PATH_ENV), var(TLS_KEY_PATH_ENV)) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: cert.into(),
            key_path: key.into(),
        })),
        (None, None) => Ok(None),
        _ => Err(ConfigError::IncompleteTls),
    }
}

fn resolve_log_format(var: &impl Fn(&str) -> Option<String>) -> Result<LogFormat, ConfigError> {
    match var(LOG_FORMAT_ENV).as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("pretty") => Ok(LogFormat::Pretty),
        Some("json") => Ok(LogFormat::Json),
        Some(other) => Err(ConfigError::Invalid {
            var: LOG_FORMAT_ENV,
            reason: format!("expected 'json' or 'pretty', got '{other}'"),
        }),
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn millis_or(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    parse_or(var, name, default_ms).map(Duration::from_millis)
}

fn parse_address(name: &'static str, raw: &str) -> Result<Address, ConfigError> {
    raw.parse().map_err(|e| ConfigError::Invalid {
        var: name,
        reason: format!("invalid address '{raw}': {e}"),
    })
}

fn required_address(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Address, ConfigError> {
    let raw = var(name).ok_or(ConfigError::Missing(name))?;
    parse_address(name, &raw)
}

fn address_list(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<Vec<Address>>, ConfigError> {
    var(name)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_address(name, s))
                .collect()
        })
        .transpose()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{url_var} is set but {credential_var} is not")]
    MissingCredential {
        url_var: &'static str,
        credential_var: &'static str,
    },

    #[error("TLS_CERT_PATH and TLS_KEY_PATH must be set together")]
    IncompleteTls,
}
