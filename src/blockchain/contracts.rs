// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ABI bindings for every contract the gateway reads from or inspects.
//!
//! The bindings are only used for selectors, typed calldata decoding of the
//! account entry points, and encoding the two read-only calls the ownership
//! verifier makes. Nothing here sends transactions.

use alloy::sol;

// Smart account entry points (Coinbase Smart Wallet layout).
sol! {
    interface ISmartAccount {
        struct Call {
            address target;
            uint256 value;
            bytes data;
        }

        function execute(address target, uint256 value, bytes data) external payable;
        function executeBatch(Call[] calls) external payable;
        function isOwnerAddress(address account) external view returns (bool);
    }
}

// Deterministic account factory.
sol! {
    interface IAccountFactory {
        function createAccount(bytes[] owners, uint256 nonce) external payable returns (address account);
        function getAddress(bytes[] owners, uint256 nonce) external view returns (address);
    }
}

// Platform batchers. Every primary entry point starts with
// `(address creatorToken, address owner, ...)`.
sol! {
    interface ICreatorVaultBatcher {
        function deployCreatorVault(address creatorToken, address owner, string name, string symbol) external;
        function deployCreatorVaultAndLaunch(address creatorToken, address owner, uint256 depositAmount, bytes launchParams) external;
        function deployCreatorVaultAndLaunchWithPermit2(address creatorToken, address owner, uint256 depositAmount, bytes launchParams, bytes permit2Data) external;
    }

    interface ICreatorActivationBatcher {
        function activate(address creatorToken, address owner, uint256 depositAmount) external;
        function activateWithPermit2(address creatorToken, address owner, uint256 depositAmount, bytes permit2Data) external;
    }
}

// Creator token surface reachable from a sponsored batch.
sol! {
    interface ICreatorToken {
        function approve(address spender, uint256 amount) external returns (bool);
        function setPayoutRecipient(address payoutRecipient) external;
    }
}

// Permit2 signature transfer.
sol! {
    interface IPermit2 {
        struct TokenPermissions {
            address token;
            uint256 amount;
        }

        struct PermitTransferFrom {
            TokenPermissions permitted;
            uint256 nonce;
            uint256 deadline;
        }

        struct SignatureTransferDetails {
            address to;
            uint256 requestedAmount;
        }

        function permitTransferFrom(
            PermitTransferFrom permit,
            SignatureTransferDetails transferDetails,
            address owner,
            bytes signature
        ) external;
    }
}
