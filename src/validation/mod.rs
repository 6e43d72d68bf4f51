// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sponsorship validation pipeline.
//!
//! Each sponsorship request passes, in order:
//! 1. UserOperation extraction with entry point and chain checks
//! 2. `callData` decoding into inner calls
//! 3. Ownership of the sender by the session address
//! 4. The allowlist
//! 5. Inner-call policy
//!
//! The first failure ends validation.

pub mod catalog;
pub mod decoder;
pub mod inner_calls;
pub mod ownership;
pub mod user_op;

use alloy::primitives::Address;
use serde_json::Value;

use crate::auth::Session;
use crate::error::GatewayError;
use crate::state::AppState;

use self::decoder::decode_account_call;
use self::inner_calls::{validate_inner_calls, PrimaryCall};
use self::ownership::{AccountState, OwnershipVerifier};
use self::user_op::extract_target;

/// Outcome of a request that passed every check.
#[derive(Debug, Clone)]
pub struct ValidatedSponsorship {
    pub sender: Address,
    pub entry_point: Address,
    pub account: AccountState,
    pub primary: PrimaryCall,
    pub inner_calls: usize,
}

/// Run every check for one sponsorship request.
pub async fn validate_sponsorship(
    state: &AppState,
    params: &Value,
    session: &Session,
) -> Result<ValidatedSponsorship, GatewayError> {
    let target = extract_target(params, &state.catalog, state.chain_id)?;
    let sender = target.user_op.sender;

    let calls = decode_account_call(&target.user_op.call_data)?;
    tracing::debug!(%sender, calls = calls.len(), "callData decoded");

    let init_code = target.user_op.init_code.as_ref().map(|code| &code[..]);
    let account = OwnershipVerifier::new(&state.catalog, state.chain.clone())
        .verify(sender, session.address, init_code)
        .await?;
    tracing::debug!(%sender, owner = %session.address, ?account, "Ownership verified");

    let decision = state.allowlist.is_allowed(session.address).await?;
    if !decision.allowed {
        return Err(GatewayError::AllowlistDenied(session.address));
    }
    tracing::debug!(
        mode = decision.mode.as_str(),
        source = decision.source,
        "Allowlist passed"
    );

    let primary = validate_inner_calls(&state.catalog, &calls, sender, session.address)?;

    Ok(ValidatedSponsorship {
        sender,
        entry_point: target.entry_point,
        account,
        primary,
        inner_calls: calls.len(),
    })
}
