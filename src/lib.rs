// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Paymaster Gateway - Sponsorship Validation Proxy
//!
//! Sits in front of an ERC-4337 paymaster/bundler and only relays requests
//! whose UserOperations the platform is willing to pay for.
//!
//! ## Modules
//!
//! - `api` - HTTP routes (Axum): the RPC endpoint, health probes, OpenAPI docs
//! - `auth` - Session JWT verification (HS256 secret or JWKS)
//! - `allowlist` - Sponsorship allowlist stores
//! - `blockchain` - Read-only EVM client and contract bindings
//! - `validation` - UserOperation decoding, ownership and call policy
//! - `ratelimit` - Per-session request budget

pub mod allowlist;
pub mod api;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod rpc;
pub mod state;
pub mod upstream;
pub mod validation;

#[cfg(test)]
mod testing;
