// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Authentication
//!
//! Resolves the caller's wallet address from a session JWT.
//!
//! ## Flow
//!
//! 1. The wallet frontend signs the user in and holds a session JWT
//! 2. Requests carry it as `Authorization: Bearer <jwt>` or in the session
//!    cookie (`SESSION_COOKIE_NAME`)
//! 3. The gateway:
//!    - verifies signature, expiry and, when configured, issuer and audience
//!    - reads the wallet address from `sub` (or `address`)
//!
//! Keys come from a shared HS256 secret or from a JWKS endpoint. Clock skew
//! tolerance is 60 seconds. Without a configured verifier no session can be
//! established.

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};

pub use claims::{Session, SessionClaims};
pub use error::SessionError;
pub use extractor::SessionCredentials;
pub use jwks::JwksManager;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Turns a presented token into a [`Session`].
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Session, SessionError>;

    /// Whether verification keys are reachable, for readiness probes.
    async fn check_ready(&self) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Where session signing keys come from.
#[derive(Clone)]
pub enum SessionKeys {
    /// Shared HS256 secret
    Secret(DecodingKey),
    /// Asymmetric keys published at a JWKS endpoint
    Jwks(JwksManager),
}

/// JWT-backed [`SessionVerifier`].
#[derive(Clone)]
pub struct JwtSessionVerifier {
    keys: SessionKeys,
    issuer: Option<String>,
    audience: Option<String>,
}

impl JwtSessionVerifier {
    pub fn with_secret(secret: &[u8]) -> Self {
        Self::new(SessionKeys::Secret(DecodingKey::from_secret(secret)))
    }

    pub fn with_jwks(jwks: JwksManager) -> Self {
        Self::new(SessionKeys::Jwks(jwks))
    }

    fn new(keys: SessionKeys) -> Self {
        Self {
            keys,
            issuer: None,
            audience: None,
        }
    }

    pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
        self.issuer = issuer;
        self
    }

    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    async fn decoding_key(&self, token: &str) -> Result<(DecodingKey, Algorithm), SessionError> {
        match &self.keys {
            SessionKeys::Secret(key) => Ok((key.clone(), Algorithm::HS256)),
            SessionKeys::Jwks(jwks) => {
                let header = decode_header(token).map_err(|_| SessionError::MalformedToken)?;
                match &header.kid {
                    Some(kid) => jwks.get_decoding_key(kid).await,
                    None => jwks.get_any_decoding_key().await,
                }
            }
        }
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.leeway = CLOCK_SKEW_LEEWAY;

        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        validation
    }
}

#[async_trait]
impl SessionVerifier for JwtSessionVerifier {
    async fn verify(&self, token: &str) -> Result<Session, SessionError> {
        let (key, algorithm) = self.decoding_key(token).await?;
        let data = decode::<SessionClaims>(token, &key, &self.validation(algorithm))?;
        Session::try_from(data.claims)
    }

    async fn check_ready(&self) -> Result<(), SessionError> {
        match &self.keys {
            SessionKeys::Secret(_) => Ok(()),
            SessionKeys::Jwks(jwks) if jwks.is_cached().await => Ok(()),
            SessionKeys::Jwks(jwks) => jwks.refresh().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mint_session, OWNER, SESSION_SECRET};
    use serde_json::json;

    fn verifier() -> JwtSessionVerifier {
        JwtSessionVerifier::with_secret(SESSION_SECRET)
    }

    fn in_an_hour() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[tokio::test]
    async fn valid_token_resolves_session_address() {
        let token = mint_session(json!({ "sub": OWNER.to_string(), "sid": "s1", "exp": in_an_hour() }));
        let session = verifier().verify(&token).await.unwrap();
        assert_eq!(session.address, OWNER);
        assert_eq!(session.session_id.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let exp = chrono::Utc::now().timestamp() - 3600;
        let token = mint_session(json!({ "sub": OWNER.to_string(), "exp": exp }));
        assert_eq!(verifier().verify(&token).await, Err(SessionError::TokenExpired));
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let token = mint_session(json!({ "sub": OWNER.to_string(), "exp": in_an_hour() }));
        let other = JwtSessionVerifier::with_secret(b"another-secret-entirely");
        assert_eq!(other.verify(&token).await, Err(SessionError::InvalidSignature));
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        assert_eq!(
            verifier().verify("not-a-jwt").await,
            Err(SessionError::MalformedToken)
        );
    }

    #[tokio::test]
    async fn issuer_and_audience_are_checked_when_configured() {
        let token = mint_session(json!({
            "sub": OWNER.to_string(),
            "exp": in_an_hour(),
            "iss": "https://auth.example.com",
            "aud": "gateway"
        }));

        let strict = verifier()
            .with_issuer(Some("https://auth.example.com".to_string()))
            .with_audience(Some("gateway".to_string()));
        assert!(strict.verify(&token).await.is_ok());

        let wrong_issuer = verifier().with_issuer(Some("https://evil.example.com".to_string()));
        assert_eq!(wrong_issuer.verify(&token).await, Err(SessionError::InvalidIssuer));

        let wrong_audience = verifier().with_audience(Some("someone-else".to_string()));
        assert_eq!(wrong_audience.verify(&token).await, Err(SessionError::InvalidAudience));

        // Unconfigured audience is not enforced.
        assert!(verifier().verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn token_without_address_is_rejected() {
        let token = mint_session(json!({ "sub": "user_2abc", "exp": in_an_hour() }));
        assert_eq!(verifier().verify(&token).await, Err(SessionError::InvalidSubject));
    }

    #[tokio::test]
    async fn secret_verifier_is_always_ready() {
        assert!(verifier().check_ready().await.is_ok());
    }
}
