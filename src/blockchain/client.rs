// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only EVM client used by the ownership verifier.

use std::future::Future;
use std::time::Duration;

use alloy::{
    network::Ethereum,
    primitives::{Address, Bytes},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;

use super::types::ChainConfig;

/// HTTP provider type (alloy's recommended fillers, unused for reads).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// The two chain capabilities the gateway needs.
///
/// Implementations must bound every call with a timeout; callers treat any
/// error as a negative answer.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `eth_getCode` at the latest block.
    async fn get_code(&self, address: Address) -> Result<Bytes, ChainClientError>;

    /// `eth_call` against `to` with raw calldata, returning raw output.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainClientError>;
}

/// JSON-RPC backed [`ChainReader`].
pub struct RpcChainClient {
    chain: ChainConfig,
    provider: HttpProvider,
}

impl RpcChainClient {
    /// Create a new client for the configured endpoint.
    pub fn new(chain: ChainConfig) -> Result<Self, ChainClientError> {
        let url: url::Url = chain
            .rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainClientError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self { chain, provider })
    }

    /// Get the chain configuration.
    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    async fn bounded<T, E, F>(&self, op: &'static str, fut: F) -> Result<T, ChainClientError>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match tokio::time::timeout(self.chain.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ChainClientError::RpcError(format!("{op}: {e}"))),
            Err(_) => Err(ChainClientError::Timeout(self.chain.timeout)),
        }
    }
}

#[async_trait]
impl ChainReader for RpcChainClient {
    async fn get_code(&self, address: Address) -> Result<Bytes, ChainClientError> {
        self.bounded("eth_getCode", async { self.provider.get_code_at(address).await })
            .await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainClientError> {
        let tx = TransactionRequest::default().to(to).input(data.into());
        self.bounded("eth_call", async { self.provider.call(tx).await })
            .await
    }
}

/// Errors that can occur during chain reads.
#[derive(Debug, thiserror::Error)]
pub enum ChainClientError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("RPC call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected return data: {0}")]
    InvalidReturnData(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_rpc_url() {
        let chain = ChainConfig {
            chain_id: 8453,
            rpc_url: "not a url".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert!(matches!(
            RpcChainClient::new(chain),
            Err(ChainClientError::InvalidRpcUrl(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_closed() {
        // Port 9 (discard) on localhost is never an RPC node.
        let chain = ChainConfig {
            chain_id: 8453,
            rpc_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(500),
        };
        let client = RpcChainClient::new(chain).unwrap();
        assert_eq!(client.chain().chain_id, 8453);
        assert!(client.get_code(Address::ZERO).await.is_err());
    }
}
