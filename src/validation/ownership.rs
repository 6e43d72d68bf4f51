// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Smart-account ownership verification.
//!
//! A deployed account is asked directly (`isOwnerAddress`). A counterfactual
//! account is checked statically against its init code: known factory,
//! recognised `createAccount` call listing the claimed owner, and a factory
//! derived address equal to the sender. Chain read failures fail closed.

use std::sync::Arc;

use alloy::{
    primitives::{Address, Bytes, U256},
    sol_types::SolCall,
};

use super::catalog::PolicyCatalog;
use super::decoder::{address_from_word, selector};
use crate::blockchain::{
    contracts::{IAccountFactory, ISmartAccount},
    ChainClientError, ChainReader,
};

const FACTORY_ADDRESS_LEN: usize = 20;

/// How ownership was established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountState {
    Deployed,
    Counterfactual { factory: Address, nonce: U256 },
}

/// Verifies that a session owner controls a smart account.
pub struct OwnershipVerifier<'a> {
    catalog: &'a PolicyCatalog,
    chain: Arc<dyn ChainReader>,
}

impl<'a> OwnershipVerifier<'a> {
    pub fn new(catalog: &'a PolicyCatalog, chain: Arc<dyn ChainReader>) -> Self {
        Self { catalog, chain }
    }

    /// Authorize `claimed_owner` for `sender`.
    pub async fn verify(
        &self,
        sender: Address,
        claimed_owner: Address,
        init_code: Option<&[u8]>,
    ) -> Result<AccountState, OwnershipError> {
        let code = self.chain.get_code(sender).await?;

        if !code.is_empty() {
            self.verify_deployed(sender, claimed_owner).await?;
            return Ok(AccountState::Deployed);
        }

        let init_code = init_code
            .filter(|c| !c.is_empty())
            .ok_or(OwnershipError::MissingInitCode)?;
        self.verify_counterfactual(sender, claimed_owner, init_code)
            .await
    }

    async fn verify_deployed(
        &self,
        account: Address,
        claimed_owner: Address,
    ) -> Result<(), OwnershipError> {
        let data = ISmartAccount::isOwnerAddressCall {
            account: claimed_owner,
        }
        .abi_encode();

        let output = self.chain.call(account, Bytes::from(data)).await?;
        let is_owner = ISmartAccount::isOwnerAddressCall::abi_decode_returns(&output)
            .map_err(|e| ChainClientError::InvalidReturnData(e.to_string()))?;

        if is_owner {
            Ok(())
        } else {
            Err(OwnershipError::NotOwner)
        }
    }

    async fn verify_counterfactual(
        &self,
        sender: Address,
        claimed_owner: Address,
        init_code: &[u8],
    ) -> Result<AccountState, OwnershipError> {
        if init_code.len() < FACTORY_ADDRESS_LEN + 4 {
            return Err(OwnershipError::InitCodeTooShort(init_code.len()));
        }

        let (factory, factory_data) = init_code.split_at(FACTORY_ADDRESS_LEN);
        let factory = Address::from_slice(factory);
        if !self.catalog.is_known_factory(factory) {
            return Err(OwnershipError::UnknownFactory(factory));
        }

        if selector(factory_data).ok() != Some(IAccountFactory::createAccountCall::SELECTOR) {
            return Err(OwnershipError::UnrecognizedFactoryCall);
        }
        let create = IAccountFactory::createAccountCall::abi_decode(factory_data)
            .map_err(|_| OwnershipError::UnrecognizedFactoryCall)?;

        let lists_owner = create
            .owners
            .iter()
            .filter_map(|owner| address_from_word(owner))
            .any(|owner| owner == claimed_owner);
        if !lists_owner {
            return Err(OwnershipError::OwnerNotInInitCode);
        }

        let derive = IAccountFactory::getAddressCall {
            owners: create.owners,
            nonce: create.nonce,
        }
        .abi_encode();
        let output = self.chain.call(factory, Bytes::from(derive)).await?;
        let derived = IAccountFactory::getAddressCall::abi_decode_returns(&output)
            .map_err(|e| ChainClientError::InvalidReturnData(e.to_string()))?;

        if derived != sender {
            return Err(OwnershipError::AddressMismatch { sender, derived });
        }

        tracing::debug!(%sender, %factory, nonce = %create.nonce, "Counterfactual account verified");
        Ok(AccountState::Counterfactual {
            factory,
            nonce: create.nonce,
        })
    }
}

/// Ownership failures. All are fatal and map to `Unauthorized`.
#[derive(Debug, thiserror::Error)]
pub enum OwnershipError {
    #[error("session is not an owner of the account")]
    NotOwner,

    #[error("account is not deployed and no initCode was supplied")]
    MissingInitCode,

    #[error("initCode too short ({0} bytes)")]
    InitCodeTooShort(usize),

    #[error("account factory {0} is not allowed")]
    UnknownFactory(Address),

    #[error("initCode is not a recognised createAccount call")]
    UnrecognizedFactoryCall,

    #[error("session owner is not listed in initCode")]
    OwnerNotInInitCode,

    #[error("sender {sender} does not match derived address {derived}")]
    AddressMismatch { sender: Address, derived: Address },

    #[error("chain read failed: {0}")]
    ChainUnavailable(#[from] ChainClientError),
}

impl OwnershipError {
    pub fn reason(&self) -> &'static str {
        match self {
            OwnershipError::NotOwner => "not_owner",
            OwnershipError::MissingInitCode => "missing_init_code",
            OwnershipError::InitCodeTooShort(_) => "init_code_too_short",
            OwnershipError::UnknownFactory(_) => "unknown_factory",
            OwnershipError::UnrecognizedFactoryCall => "unrecognized_factory_call",
            OwnershipError::OwnerNotInInitCode => "owner_not_in_init_code",
            OwnershipError::AddressMismatch { .. } => "address_mismatch",
            OwnershipError::ChainUnavailable(_) => "chain_unavailable",
        }
    }
}
