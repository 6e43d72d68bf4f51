// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration.
//!
//! This module provides:
//! - A read-only chain client (`eth_getCode`, `eth_call`) behind [`ChainReader`]
//! - ABI bindings for the account, factory, platform and Permit2 contracts
//! - Well-known deployment addresses

pub mod client;
pub mod contracts;
pub mod types;

pub use client::{ChainClientError, ChainReader, RpcChainClient};
pub use types::*;
