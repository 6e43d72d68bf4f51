// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Inner-call authorization.
//!
//! A sponsored batch may only touch one caller-chosen creator token plus the
//! fixed platform contracts. The token is fixed by the batch's single primary
//! call (Pass 1) and every other call is checked against it (Pass 2).

use alloy::primitives::{Address, U256};

use super::catalog::{self, slots, ContractRole, PolicyCatalog, PrimaryCallMode};
use super::decoder::{address_arg, DecodeError, InnerCall, Selector};

/// The batch's primary call, as established by Pass 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryCall {
    pub mode: PrimaryCallMode,
    pub creator_token: Address,
    pub index: usize,
}

/// Validate every inner call of a sponsored UserOperation.
///
/// `account` is the smart account under validation (the UserOperation
/// sender); `session` is the authenticated owner address.
pub fn validate_inner_calls(
    catalog: &PolicyCatalog,
    calls: &[InnerCall],
    account: Address,
    session: Address,
) -> Result<PrimaryCall, PolicyError> {
    for (index, call) in calls.iter().enumerate() {
        if call.value != U256::ZERO {
            return Err(PolicyError::NonZeroValue { index });
        }
    }

    let primary = find_primary_call(catalog, calls, account)?;

    for (index, call) in calls.iter().enumerate() {
        if index == primary.index {
            continue;
        }
        validate_secondary_call(catalog, call, index, &primary, account, session)?;
    }

    Ok(primary)
}

fn find_primary_call(
    catalog: &PolicyCatalog,
    calls: &[InnerCall],
    account: Address,
) -> Result<PrimaryCall, PolicyError> {
    let mut primary: Option<PrimaryCall> = None;

    for (index, call) in calls.iter().enumerate() {
        let Some(role) = catalog.role_of(call.target) else {
            continue;
        };
        let Some(mode) = role.primary_mode() else {
            continue;
        };

        let selector = call.selector()?;
        ensure_selector(role.allowed_selectors(), call, index, selector)?;

        if primary.is_some() {
            return Err(PolicyError::MultiplePrimaryCalls);
        }

        let creator_token = address_arg(&call.data, slots::PRIMARY_TOKEN)?;
        if creator_token == Address::ZERO || catalog.is_platform_contract(creator_token) {
            return Err(PolicyError::InvalidCreatorToken(creator_token));
        }

        let owner = address_arg(&call.data, slots::PRIMARY_OWNER)?;
        if owner != account {
            return Err(PolicyError::PrimaryOwnerMismatch { owner, account });
        }

        tracing::debug!(index, ?mode, %creator_token, "Primary call established");
        primary = Some(PrimaryCall {
            mode,
            creator_token,
            index,
        });
    }

    primary.ok_or(PolicyError::MissingPrimaryCall)
}

fn validate_secondary_call(
    catalog: &PolicyCatalog,
    call: &InnerCall,
    index: usize,
    primary: &PrimaryCall,
    account: Address,
    session: Address,
) -> Result<(), PolicyError> {
    let selector = call.selector()?;

    match catalog.role_of(call.target) {
        // Already selector-checked and scoped in Pass 1.
        Some(ContractRole::DeployBatcher)
        | Some(ContractRole::ActivationBatcher)
        | Some(ContractRole::CreatorToken) => Ok(()),
        Some(ContractRole::Permit) => {
            ensure_selector(ContractRole::Permit.allowed_selectors(), call, index, selector)?;

            let token = address_arg(&call.data, slots::PERMIT_TOKEN)?;
            if token != primary.creator_token {
                return Err(PolicyError::PermitTokenMismatch {
                    token,
                    expected: primary.creator_token,
                });
            }
            let recipient = address_arg(&call.data, slots::PERMIT_RECIPIENT)?;
            if recipient != account {
                return Err(PolicyError::PermitRecipientMismatch { recipient });
            }
            let owner = address_arg(&call.data, slots::PERMIT_OWNER)?;
            if owner != session {
                return Err(PolicyError::PermitOwnerMismatch { owner });
            }
            Ok(())
        }
        None if call.target == primary.creator_token => {
            let allowed = ContractRole::CreatorToken.allowed_selectors();
            ensure_selector(allowed, call, index, selector)?;

            if selector == catalog::APPROVE_SELECTOR {
                let spender = address_arg(&call.data, slots::APPROVE_SPENDER)?;
                if !catalog.is_allowed_spender(spender) {
                    return Err(PolicyError::ApproveSpenderNotAllowed(spender));
                }
            }
            Ok(())
        }
        None => Err(PolicyError::CalledAddressNotAllowed {
            index,
            target: call.target,
        }),
    }
}

fn ensure_selector(
    allowed: &[Selector],
    call: &InnerCall,
    index: usize,
    selector: Selector,
) -> Result<(), PolicyError> {
    if allowed.contains(&selector) {
        Ok(())
    } else {
        Err(PolicyError::SelectorNotAllowed {
            index,
            target: call.target,
            selector,
        })
    }
}

/// Inner-call policy rejections. Each carries a distinct audit reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("batch has no primary batcher call")]
    MissingPrimaryCall,

    #[error("batch has more than one primary batcher call")]
    MultiplePrimaryCalls,

    #[error("call {index} transfers native value")]
    NonZeroValue { index: usize },

    #[error("creator token {0} is not allowed")]
    InvalidCreatorToken(Address),

    #[error("primary call owner {owner} is not the account {account}")]
    PrimaryOwnerMismatch { owner: Address, account: Address },

    #[error("call {index} to {target} uses selector 0x{} which is not allowed", alloy::hex::encode(.selector))]
    SelectorNotAllowed {
        index: usize,
        target: Address,
        selector: Selector,
    },

    #[error("call {index} targets {target} which is not allowed")]
    CalledAddressNotAllowed { index: usize, target: Address },

    #[error("permit token {token} does not match creator token {expected}")]
    PermitTokenMismatch { token: Address, expected: Address },

    #[error("permit transfer recipient {recipient} is not the account")]
    PermitRecipientMismatch { recipient: Address },

    #[error("permit owner {owner} is not the session owner")]
    PermitOwnerMismatch { owner: Address },

    #[error("approve spender {0} is not a platform contract")]
    ApproveSpenderNotAllowed(Address),

    #[error("malformed inner call: {0}")]
    MalformedCall(#[from] DecodeError),
}

impl PolicyError {
    pub fn reason(&self) -> &'static str {
        match self {
            PolicyError::MissingPrimaryCall => "missing_primary_call",
            PolicyError::MultiplePrimaryCalls => "multiple_primary_calls",
            PolicyError::NonZeroValue { .. } => "non_zero_value",
            PolicyError::InvalidCreatorToken(_) => "invalid_creator_token",
            PolicyError::PrimaryOwnerMismatch { .. } => "primary_owner_mismatch",
            PolicyError::SelectorNotAllowed { .. } => "selector_not_allowed",
            PolicyError::CalledAddressNotAllowed { .. } => "called_address_not_allowed",
            PolicyError::PermitTokenMismatch { .. } => "permit_token_mismatch",
            PolicyError::PermitRecipientMismatch { .. } => "permit_recipient_mismatch",
            PolicyError::PermitOwnerMismatch { .. } => "permit_owner_mismatch",
            PolicyError::ApproveSpenderNotAllowed(_) => "approve_spender_not_allowed",
            PolicyError::MalformedCall(_) => "malformed_inner_call",
        }
    }
}
