// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures and in-memory collaborators for unit and router tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::{
    primitives::{address, Address, Bytes, U256},
    sol_types::{SolCall, SolValue},
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, Request, StatusCode},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::allowlist::{AllowlistAuthority, AllowlistError, AllowlistStore};
use crate::api::router;
use crate::auth::JwtSessionVerifier;
use crate::blockchain::{
    contracts::{
        IAccountFactory, ICreatorActivationBatcher, ICreatorToken, ICreatorVaultBatcher, IPermit2,
        ISmartAccount,
    },
    ChainClientError, ChainReader, ENTRY_POINT_V06, PERMIT2,
};
use crate::ratelimit::{Clock, RateLimiter};
use crate::state::AppState;
use crate::upstream::{Upstream, UpstreamError, UpstreamResponse};
use crate::validation::catalog::{PlatformContracts, PolicyCatalog};
use crate::validation::decoder::InnerCall;

pub const ACCOUNT: Address = address!("0xacc0000000000000000000000000000000000001");
pub const OWNER: Address = address!("0x0e00000000000000000000000000000000000002");
pub const TOKEN_A: Address = address!("0x70a0000000000000000000000000000000000003");
pub const TOKEN_B: Address = address!("0x70b0000000000000000000000000000000000004");
pub const DEPLOY_BATCHER: Address = address!("0xdb00000000000000000000000000000000000005");
pub const ACTIVATE_BATCHER: Address = address!("0xab00000000000000000000000000000000000006");
pub const CHAIN_ID: u64 = 8453;
pub const SESSION_SECRET: &[u8] = b"test-session-secret-with-enough-entropy";

pub fn catalog() -> PolicyCatalog {
    PolicyCatalog::new(PlatformContracts::new(DEPLOY_BATCHER, ACTIVATE_BATCHER))
}

// ---------------------------------------------------------------------------
// Calldata builders
// ---------------------------------------------------------------------------

fn call(target: Address, data: Vec<u8>) -> InnerCall {
    InnerCall {
        target,
        value: U256::ZERO,
        data: Bytes::from(data),
    }
}

pub fn deploy_call(token: Address, owner: Address) -> InnerCall {
    call(
        DEPLOY_BATCHER,
        ICreatorVaultBatcher::deployCreatorVaultCall {
            creatorToken: token,
            owner,
            name: "Creator Vault".to_string(),
            symbol: "cvTKN".to_string(),
        }
        .abi_encode(),
    )
}

pub fn activate_call(token: Address, owner: Address) -> InnerCall {
    call(
        ACTIVATE_BATCHER,
        ICreatorActivationBatcher::activateCall {
            creatorToken: token,
            owner,
            depositAmount: U256::from(1_000u64),
        }
        .abi_encode(),
    )
}

pub fn approve_call(token: Address, spender: Address) -> InnerCall {
    call(
        token,
        ICreatorToken::approveCall {
            spender,
            amount: U256::MAX,
        }
        .abi_encode(),
    )
}

pub fn payout_call(token: Address, recipient: Address) -> InnerCall {
    call(
        token,
        ICreatorToken::setPayoutRecipientCall {
            payoutRecipient: recipient,
        }
        .abi_encode(),
    )
}

pub fn permit_call(token: Address, to: Address, owner: Address) -> InnerCall {
    call(
        PERMIT2,
        IPermit2::permitTransferFromCall {
            permit: IPermit2::PermitTransferFrom {
                permitted: IPermit2::TokenPermissions {
                    token,
                    amount: U256::from(1_000u64),
                },
                nonce: U256::from(7u64),
                deadline: U256::from(u64::MAX),
            },
            transferDetails: IPermit2::SignatureTransferDetails {
                to,
                requestedAmount: U256::from(1_000u64),
            },
            owner,
            signature: Bytes::from(vec![0x11; 65]),
        }
        .abi_encode(),
    )
}

/// `executeBatch` calldata wrapping `calls`.
pub fn execute_batch(calls: &[InnerCall]) -> Bytes {
    let calls = calls
        .iter()
        .map(|c| ISmartAccount::Call {
            target: c.target,
            value: c.value,
            data: c.data.clone(),
        })
        .collect();
    Bytes::from(ISmartAccount::executeBatchCall { calls }.abi_encode())
}

/// `factory ++ createAccount([owner], nonce)`.
pub fn init_code(factory: Address, owner: Address, nonce: u64) -> Vec<u8> {
    let mut code = factory.to_vec();
    code.extend(
        IAccountFactory::createAccountCall {
            owners: vec![Bytes::from(owner.abi_encode())],
            nonce: U256::from(nonce),
        }
        .abi_encode(),
    );
    code
}

/// A `pm_sponsorUserOperation` request for ACCOUNT executing `calls`.
pub fn sponsor_request(id: u64, calls: &[InnerCall]) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "pm_sponsorUserOperation",
        "params": [
            {
                "sender": ACCOUNT.to_string(),
                "nonce": "0x0",
                "initCode": "0x",
                "callData": execute_batch(calls).to_string(),
                "callGasLimit": "0x0",
                "verificationGasLimit": "0x0",
                "preVerificationGas": "0x0",
                "maxFeePerGas": "0x0",
                "maxPriorityFeePerGas": "0x0",
                "paymasterAndData": "0x",
                "signature": "0x"
            },
            ENTRY_POINT_V06.to_string(),
            "0x2105"
        ]
    })
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub fn mint_session(claims: Value) -> String {
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SESSION_SECRET)).unwrap()
}

/// A valid session token for OWNER.
pub fn owner_session() -> String {
    mint_session(json!({
        "sub": OWNER.to_string(),
        "sid": "sess_test",
        "exp": Utc::now().timestamp() + 3600
    }))
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// In-memory chain: deployed accounts with owner sets plus a fixed factory
/// derivation result.
#[derive(Clone, Default)]
pub struct FakeChain {
    deployed: HashMap<Address, Vec<Address>>,
    derived: Option<Address>,
    unreachable: bool,
    reads: Arc<AtomicUsize>,
}

impl FakeChain {
    pub fn with_deployed(mut self, account: Address, owners: &[Address]) -> Self {
        self.deployed.insert(account, owners.to_vec());
        self
    }

    /// Every `getAddress` call returns `address`.
    pub fn deriving(mut self, address: Address) -> Self {
        self.derived = Some(address);
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Number of chain reads performed so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn touch(&self) -> Result<(), ChainClientError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            Err(ChainClientError::RpcError("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn get_code(&self, address: Address) -> Result<Bytes, ChainClientError> {
        self.touch()?;
        if self.deployed.contains_key(&address) {
            Ok(Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]))
        } else {
            Ok(Bytes::new())
        }
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainClientError> {
        self.touch()?;

        if let Ok(query) = ISmartAccount::isOwnerAddressCall::abi_decode(&data) {
            let is_owner = self
                .deployed
                .get(&to)
                .is_some_and(|owners| owners.contains(&query.account));
            return Ok(Bytes::from(is_owner.abi_encode()));
        }
        if IAccountFactory::getAddressCall::abi_decode(&data).is_ok() {
            let derived = self.derived.unwrap_or(Address::ZERO);
            return Ok(Bytes::from(derived.abi_encode()));
        }

        Err(ChainClientError::RpcError("execution reverted".to_string()))
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(DateTime::from_timestamp(1_767_225_600, 0).unwrap()),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Allowlist store with a fixed answer, or permanently unreachable.
pub struct FlakyStore {
    answer: Option<bool>,
    lookups: AtomicUsize,
}

impl FlakyStore {
    pub fn answering(allowed: bool) -> Self {
        Self {
            answer: Some(allowed),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn down() -> Self {
        Self {
            answer: None,
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AllowlistStore for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn lookup(&self, _address: Address) -> Result<bool, AllowlistError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.answer
            .ok_or_else(|| AllowlistError::Unavailable("connection refused".to_string()))
    }
}

pub const UPSTREAM_BODY: &str =
    r#"{"jsonrpc":"2.0","id":1,"result":{"paymasterAndData":"0xfeedface"}}"#;

/// Upstream that records forwarded bodies and answers with a canned reply.
pub struct FakeUpstream {
    status: StatusCode,
    body: &'static str,
    received: Mutex<Vec<axum::body::Bytes>>,
}

impl FakeUpstream {
    pub fn new(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            body,
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<axum::body::Bytes> {
        self.received.lock().unwrap().clone()
    }
}

impl Default for FakeUpstream {
    fn default() -> Self {
        Self::new(StatusCode::OK, UPSTREAM_BODY)
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn forward(&self, body: axum::body::Bytes) -> Result<UpstreamResponse, UpstreamError> {
        self.received.lock().unwrap().push(body);
        Ok(UpstreamResponse {
            status: self.status,
            content_type: Some(HeaderValue::from_static("application/json")),
            body: axum::body::Bytes::from_static(self.body.as_bytes()),
        })
    }
}

// ---------------------------------------------------------------------------
// Router harness
// ---------------------------------------------------------------------------

/// A full gateway wired to fakes.
pub struct TestGateway {
    pub state: AppState,
    pub chain: FakeChain,
    pub upstream: Arc<FakeUpstream>,
    pub clock: Arc<ManualClock>,
}

/// Decoded gateway response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: axum::body::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

impl TestGateway {
    /// ACCOUNT deployed and owned by OWNER, allowlist disabled, 50 req/min.
    pub fn new() -> Self {
        Self::build(
            FakeChain::default().with_deployed(ACCOUNT, &[OWNER]),
            AllowlistAuthority::disabled(),
            50,
        )
    }

    pub fn build(chain: FakeChain, allowlist: AllowlistAuthority, limit: u32) -> Self {
        let upstream = Arc::new(FakeUpstream::default());
        let clock = Arc::new(ManualClock::default());

        let state = AppState::new(Arc::new(catalog()), Arc::new(chain.clone()), upstream.clone())
            .with_chain_id(CHAIN_ID)
            .with_allowlist(allowlist)
            .with_sessions(Arc::new(JwtSessionVerifier::with_secret(SESSION_SECRET)))
            .with_rate_limiter(RateLimiter::new(limit, 1_000, clock.clone()));

        Self {
            state,
            chain,
            upstream,
            clock,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = router(self.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// POST `body` to `/` with an optional bearer session.
    pub async fn post(&self, body: &Value, session: Option<&str>) -> TestResponse {
        self.post_raw(body.to_string(), session).await
    }

    pub async fn post_raw(&self, body: impl Into<Body>, session: Option<&str>) -> TestResponse {
        let mut request = Request::post("/").header(CONTENT_TYPE, "application/json");
        if let Some(token) = session {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        self.send(request.body(body.into()).unwrap()).await
    }
}
