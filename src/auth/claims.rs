// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token claims and the resolved session.

use alloy::primitives::Address;
use serde::Deserialize;

use super::SessionError;

/// Claims read from a session JWT.
///
/// `exp` is required and validated by `jsonwebtoken`; `iss` and `aud` are
/// validated there too when configured.
#[derive(Debug, Deserialize)]
pub struct SessionClaims {
    /// Subject, normally the wallet address
    #[serde(default)]
    pub sub: Option<String>,
    /// Explicit wallet address for issuers whose `sub` is a user id
    #[serde(default)]
    pub address: Option<String>,
    /// Session ID
    #[serde(default)]
    pub sid: Option<String>,
    /// Expiration timestamp
    pub exp: i64,
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Wallet address the session was issued to
    pub address: Address,
    pub session_id: Option<String>,
    /// Unix timestamp
    pub expires_at: i64,
}

impl Session {
    /// Key under which the session's requests are rate limited.
    pub fn rate_limit_key(&self) -> String {
        format!("0x{}", alloy::hex::encode(self.address))
    }
}

impl TryFrom<SessionClaims> for Session {
    type Error = SessionError;

    /// `sub` wins when it parses as an address, otherwise `address` is used.
    fn try_from(claims: SessionClaims) -> Result<Self, Self::Error> {
        let address = [claims.sub.as_deref(), claims.address.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|candidate| candidate.parse::<Address>().ok())
            .ok_or(SessionError::InvalidSubject)?;

        Ok(Session {
            address,
            session_id: claims.sid,
            expires_at: claims.exp,
        })
    }
}
