// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Policy Catalog
//!
//! Static tables describing everything the gateway is willing to sponsor:
//!
//! - which JSON-RPC methods are forwarded at all
//! - which of those carry a UserOperation that must be validated
//! - which platform contracts exist and which selectors each accepts
//!
//! Adding a new call shape is a change to these tables only. Bump
//! [`CATALOG_VERSION`] whenever a table changes so the running policy can be
//! identified from the startup log.

use alloy::{primitives::Address, sol_types::SolCall};

use super::decoder::Selector;
use crate::blockchain::{
    contracts::{ICreatorActivationBatcher, ICreatorToken, ICreatorVaultBatcher, IPermit2},
    COINBASE_SMART_WALLET_FACTORY, ENTRY_POINT_V06, ENTRY_POINT_V07, PERMIT2,
};

/// Version of the tables below.
pub const CATALOG_VERSION: u32 = 3;

/// The only JSON-RPC methods ever forwarded upstream.
pub const ALLOWED_METHODS: &[&str] = &[
    "eth_chainId",
    "eth_supportedEntryPoints",
    "eth_estimateUserOperationGas",
    "eth_sendUserOperation",
    "eth_getUserOperationByHash",
    "eth_getUserOperationReceipt",
    "pm_getPaymasterStubData",
    "pm_getPaymasterData",
    "pm_sponsorUserOperation",
];

/// Methods whose first parameter is a UserOperation needing full validation.
pub const METHODS_REQUIRING_USER_OP: &[&str] = &[
    "eth_estimateUserOperationGas",
    "eth_sendUserOperation",
    "pm_getPaymasterStubData",
    "pm_getPaymasterData",
    "pm_sponsorUserOperation",
];

/// Deploy batcher entry points. All start with `(creatorToken, owner)`.
pub const DEPLOY_BATCHER_SELECTORS: &[Selector] = &[
    ICreatorVaultBatcher::deployCreatorVaultCall::SELECTOR,
    ICreatorVaultBatcher::deployCreatorVaultAndLaunchCall::SELECTOR,
    ICreatorVaultBatcher::deployCreatorVaultAndLaunchWithPermit2Call::SELECTOR,
];

/// Activation batcher entry points. All start with `(creatorToken, owner)`.
pub const ACTIVATION_BATCHER_SELECTORS: &[Selector] = &[
    ICreatorActivationBatcher::activateCall::SELECTOR,
    ICreatorActivationBatcher::activateWithPermit2Call::SELECTOR,
];

/// Permit2 signature transfer.
pub const PERMIT_SELECTORS: &[Selector] = &[IPermit2::permitTransferFromCall::SELECTOR];

pub const APPROVE_SELECTOR: Selector = ICreatorToken::approveCall::SELECTOR;
pub const SET_PAYOUT_RECIPIENT_SELECTOR: Selector = ICreatorToken::setPayoutRecipientCall::SELECTOR;

/// Calls allowed on the batch's own creator token.
pub const CREATOR_TOKEN_SELECTORS: &[Selector] = &[APPROVE_SELECTOR, SET_PAYOUT_RECIPIENT_SELECTOR];

/// Argument slots (32-byte words after the selector).
pub mod slots {
    /// Primary call: creator token.
    pub const PRIMARY_TOKEN: usize = 0;
    /// Primary call: vault owner (the smart account).
    pub const PRIMARY_OWNER: usize = 1;
    /// Permit2 `permitted.token`.
    pub const PERMIT_TOKEN: usize = 0;
    /// Permit2 `transferDetails.to`.
    pub const PERMIT_RECIPIENT: usize = 4;
    /// Permit2 `owner` (the signer).
    pub const PERMIT_OWNER: usize = 6;
    /// ERC-20 `approve` spender.
    pub const APPROVE_SPENDER: usize = 0;
}

/// Whether `method` may be forwarded at all.
pub fn is_allowed_method(method: &str) -> bool {
    ALLOWED_METHODS.contains(&method)
}

/// Whether `method` carries a UserOperation that must be validated.
pub fn requires_user_op(method: &str) -> bool {
    METHODS_REQUIRING_USER_OP.contains(&method)
}

/// Fixed platform roles a sponsored call may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractRole {
    DeployBatcher,
    ActivationBatcher,
    Permit,
    /// The batch's own creator token. Bound per batch by the primary call,
    /// so [`PolicyCatalog::role_of`] never returns it.
    CreatorToken,
}

impl ContractRole {
    pub fn allowed_selectors(self) -> &'static [Selector] {
        match self {
            ContractRole::DeployBatcher => DEPLOY_BATCHER_SELECTORS,
            ContractRole::ActivationBatcher => ACTIVATION_BATCHER_SELECTORS,
            ContractRole::Permit => PERMIT_SELECTORS,
            ContractRole::CreatorToken => CREATOR_TOKEN_SELECTORS,
        }
    }

    /// Mode established by a primary call on this role, if it is a batcher.
    pub fn primary_mode(self) -> Option<PrimaryCallMode> {
        match self {
            ContractRole::DeployBatcher => Some(PrimaryCallMode::Deploy),
            ContractRole::ActivationBatcher => Some(PrimaryCallMode::Activate),
            ContractRole::Permit | ContractRole::CreatorToken => None,
        }
    }
}

/// What the batch's primary call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryCallMode {
    Deploy,
    Activate,
}

/// Addresses of the platform deployment the gateway protects.
#[derive(Debug, Clone)]
pub struct PlatformContracts {
    pub deploy_batcher: Address,
    pub activation_batcher: Address,
    pub permit: Address,
    pub account_factories: Vec<Address>,
    pub entry_points: Vec<Address>,
}

impl PlatformContracts {
    /// Platform batchers with the canonical Permit2, factory and entry points.
    pub fn new(deploy_batcher: Address, activation_batcher: Address) -> Self {
        Self {
            deploy_batcher,
            activation_batcher,
            permit: PERMIT2,
            account_factories: vec![COINBASE_SMART_WALLET_FACTORY],
            entry_points: vec![ENTRY_POINT_V06, ENTRY_POINT_V07],
        }
    }
}

/// Policy tables bound to a concrete deployment.
#[derive(Debug, Clone)]
pub struct PolicyCatalog {
    contracts: PlatformContracts,
}

impl PolicyCatalog {
    pub fn new(contracts: PlatformContracts) -> Self {
        Self { contracts }
    }

    pub fn contracts(&self) -> &PlatformContracts {
        &self.contracts
    }

    /// Role of a fixed platform contract, `None` for any other address.
    pub fn role_of(&self, target: Address) -> Option<ContractRole> {
        if target == self.contracts.deploy_batcher {
            Some(ContractRole::DeployBatcher)
        } else if target == self.contracts.activation_batcher {
            Some(ContractRole::ActivationBatcher)
        } else if target == self.contracts.permit {
            Some(ContractRole::Permit)
        } else {
            None
        }
    }

    pub fn is_platform_contract(&self, address: Address) -> bool {
        self.role_of(address).is_some()
    }

    /// `approve` may only grant allowance to platform contracts.
    pub fn is_allowed_spender(&self, spender: Address) -> bool {
        self.is_platform_contract(spender)
    }

    pub fn is_known_factory(&self, factory: Address) -> bool {
        self.contracts.account_factories.contains(&factory)
    }

    pub fn is_supported_entry_point(&self, entry_point: Address) -> bool {
        self.contracts.entry_points.contains(&entry_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const DEPLOY: Address = address!("0xd000000000000000000000000000000000000001");
    const ACTIVATE: Address = address!("0xa000000000000000000000000000000000000002");

    fn catalog() -> PolicyCatalog {
        PolicyCatalog::new(PlatformContracts::new(DEPLOY, ACTIVATE))
    }

    #[test]
    fn sponsorship_methods_are_a_subset_of_allowed_methods() {
        for method in METHODS_REQUIRING_USER_OP {
            assert!(is_allowed_method(method), "{method} must be allowed");
        }
        assert!(!requires_user_op("eth_chainId"));
        assert!(!is_allowed_method("eth_sendRawTransaction"));
        assert!(!is_allowed_method("debug_traceCall"));
    }

    #[test]
    fn roles_resolve_by_address() {
        let catalog = catalog();
        assert_eq!(catalog.role_of(DEPLOY), Some(ContractRole::DeployBatcher));
        assert_eq!(catalog.role_of(ACTIVATE), Some(ContractRole::ActivationBatcher));
        assert_eq!(catalog.role_of(PERMIT2), Some(ContractRole::Permit));
        assert_eq!(catalog.role_of(Address::ZERO), None);
    }

    #[test]
    fn only_batchers_establish_a_mode() {
        assert_eq!(ContractRole::DeployBatcher.primary_mode(), Some(PrimaryCallMode::Deploy));
        assert_eq!(
            ContractRole::ActivationBatcher.primary_mode(),
            Some(PrimaryCallMode::Activate)
        );
        assert_eq!(ContractRole::Permit.primary_mode(), None);
        assert_eq!(ContractRole::CreatorToken.primary_mode(), None);
    }

    #[test]
    fn role_selector_sets_do_not_overlap() {
        for sel in DEPLOY_BATCHER_SELECTORS {
            assert!(!ACTIVATION_BATCHER_SELECTORS.contains(sel));
            assert!(!CREATOR_TOKEN_SELECTORS.contains(sel));
        }
        assert!(!CREATOR_TOKEN_SELECTORS.contains(&PERMIT_SELECTORS[0]));
    }

    #[test]
    fn primary_arguments_sit_at_fixed_slots() {
        use crate::blockchain::contracts::{ICreatorActivationBatcher, ICreatorVaultBatcher};
        use crate::validation::decoder::address_arg;
        use alloy::primitives::{Bytes, U256};
        use alloy::sol_types::SolCall;

        let token = address!("0x1111111111111111111111111111111111111111");
        let owner = address!("0x2222222222222222222222222222222222222222");
        let blob = Bytes::from(vec![0xab; 70]);

        let encoded = [
            ICreatorVaultBatcher::deployCreatorVaultCall {
                creatorToken: token,
                owner,
                name: "Vault".to_string(),
                symbol: "V".to_string(),
            }
            .abi_encode(),
            ICreatorVaultBatcher::deployCreatorVaultAndLaunchCall {
                creatorToken: token,
                owner,
                depositAmount: U256::from(5u64),
                launchParams: blob.clone(),
            }
            .abi_encode(),
            ICreatorVaultBatcher::deployCreatorVaultAndLaunchWithPermit2Call {
                creatorToken: token,
                owner,
                depositAmount: U256::from(5u64),
                launchParams: blob.clone(),
                permit2Data: blob.clone(),
            }
            .abi_encode(),
            ICreatorActivationBatcher::activateCall {
                creatorToken: token,
                owner,
                depositAmount: U256::from(5u64),
            }
            .abi_encode(),
            ICreatorActivationBatcher::activateWithPermit2Call {
                creatorToken: token,
                owner,
                depositAmount: U256::from(5u64),
                permit2Data: blob,
            }
            .abi_encode(),
        ];

        for data in &encoded {
            let selector: Selector = data[..4].try_into().unwrap();
            assert!(
                DEPLOY_BATCHER_SELECTORS.contains(&selector)
                    || ACTIVATION_BATCHER_SELECTORS.contains(&selector)
            );
            assert_eq!(address_arg(data, slots::PRIMARY_TOKEN).unwrap(), token);
            assert_eq!(address_arg(data, slots::PRIMARY_OWNER).unwrap(), owner);
        }
    }

    #[test]
    fn defaults_cover_canonical_deployments() {
        let catalog = catalog();
        assert!(catalog.is_known_factory(COINBASE_SMART_WALLET_FACTORY));
        assert!(catalog.is_supported_entry_point(ENTRY_POINT_V06));
        assert!(catalog.is_supported_entry_point(ENTRY_POINT_V07));
        assert!(catalog.is_allowed_spender(PERMIT2));
        assert!(!catalog.is_allowed_spender(address!("0x9999999999999999999999999999999999999999")));
    }
}
