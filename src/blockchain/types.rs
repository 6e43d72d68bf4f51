// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain configuration and well-known deployments.

use std::time::Duration;

use alloy::primitives::{address, Address};

/// Chain the gateway validates against.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Chain ID that sponsorship requests must target
    pub chain_id: u64,
    /// RPC endpoint URL used for reads
    pub rpc_url: String,
    /// Upper bound for a single RPC round trip
    pub timeout: Duration,
}

/// Base mainnet chain ID.
pub const BASE_MAINNET_CHAIN_ID: u64 = 8453;

/// Public Base mainnet RPC endpoint.
pub const BASE_MAINNET_RPC_URL: &str = "https://mainnet.base.org";

/// ERC-4337 EntryPoint v0.6.
pub const ENTRY_POINT_V06: Address = address!("0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");

/// ERC-4337 EntryPoint v0.7.
pub const ENTRY_POINT_V07: Address = address!("0x0000000071727De22E5E9d8BAB0edAc747f4A9A0");

/// Canonical Permit2 deployment (same address on every chain).
pub const PERMIT2: Address = address!("0x000000000022D473030F116dDEE9F6B43aC78BA3");

/// Coinbase Smart Wallet factory v1.
pub const COINBASE_SMART_WALLET_FACTORY: Address =
    address!("0x0BA5ED0c6AA8c49038F819E587E2633c4A9F428a");
