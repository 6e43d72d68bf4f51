// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session verification errors.

/// Why a session could not be established.
///
/// Every variant surfaces to the client as "Request not authenticated"; the
/// [`reason`](SessionError::reason) code is what distinguishes them in logs
/// and in `error.data.reason`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No bearer header and no session cookie
    #[error("no session token supplied")]
    MissingToken,
    /// Authorization header present but not `Bearer <token>`
    #[error("invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,
    /// Token is malformed
    #[error("session token is malformed")]
    MalformedToken,
    /// Token signature is invalid
    #[error("session token signature is invalid")]
    InvalidSignature,
    /// Token has expired
    #[error("session token has expired")]
    TokenExpired,
    /// Token is not yet valid
    #[error("session token is not yet valid")]
    TokenNotYetValid,
    /// Token issuer is invalid
    #[error("session token issuer is invalid")]
    InvalidIssuer,
    /// Token audience is invalid
    #[error("session token audience is invalid")]
    InvalidAudience,
    /// Neither `sub` nor `address` holds a 20-byte address
    #[error("session token does not name an address")]
    InvalidSubject,
    /// JWKS fetch failed
    #[error("failed to fetch JWKS: {0}")]
    JwksFetch(String),
    /// No matching key in JWKS
    #[error("no matching key found in JWKS")]
    NoMatchingKey,
    /// JWKS key could not be turned into a verification key
    #[error("unsupported JWKS key: {0}")]
    UnsupportedKey(String),
    /// The gateway has no session verifier configured
    #[error("session verification is not configured")]
    NotConfigured,
}

impl SessionError {
    pub fn reason(&self) -> &'static str {
        match self {
            SessionError::MissingToken => "missing_session",
            SessionError::InvalidAuthHeader => "invalid_auth_header",
            SessionError::MalformedToken => "malformed_token",
            SessionError::InvalidSignature => "invalid_signature",
            SessionError::TokenExpired => "token_expired",
            SessionError::TokenNotYetValid => "token_not_yet_valid",
            SessionError::InvalidIssuer => "invalid_issuer",
            SessionError::InvalidAudience => "invalid_audience",
            SessionError::InvalidSubject => "invalid_subject",
            SessionError::JwksFetch(_) => "jwks_fetch_error",
            SessionError::NoMatchingKey => "no_matching_key",
            SessionError::UnsupportedKey(_) => "unsupported_key",
            SessionError::NotConfigured => "session_verification_disabled",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for SessionError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::ExpiredSignature => SessionError::TokenExpired,
            ErrorKind::InvalidSignature => SessionError::InvalidSignature,
            ErrorKind::InvalidIssuer => SessionError::InvalidIssuer,
            ErrorKind::InvalidAudience => SessionError::InvalidAudience,
            ErrorKind::ImmatureSignature => SessionError::TokenNotYetValid,
            _ => SessionError::MalformedToken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_are_distinct() {
        let all = [
            SessionError::MissingToken,
            SessionError::InvalidAuthHeader,
            SessionError::MalformedToken,
            SessionError::InvalidSignature,
            SessionError::TokenExpired,
            SessionError::TokenNotYetValid,
            SessionError::InvalidIssuer,
            SessionError::InvalidAudience,
            SessionError::InvalidSubject,
            SessionError::JwksFetch(String::new()),
            SessionError::NoMatchingKey,
            SessionError::UnsupportedKey(String::new()),
            SessionError::NotConfigured,
        ];
        let mut reasons: Vec<_> = all.iter().map(SessionError::reason).collect();
        reasons.sort_unstable();
        reasons.dedup();
        assert_eq!(reasons.len(), all.len());
    }

    #[test]
    fn jwt_error_kinds_map_to_session_errors() {
        use jsonwebtoken::errors::{Error, ErrorKind};

        assert_eq!(
            SessionError::from(Error::from(ErrorKind::ExpiredSignature)),
            SessionError::TokenExpired
        );
        assert_eq!(
            SessionError::from(Error::from(ErrorKind::InvalidToken)),
            SessionError::MalformedToken
        );
    }
}
