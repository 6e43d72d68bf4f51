// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Smart-account calldata decoding.
//!
//! Only two account entry points are understood: `execute` (one call) and
//! `executeBatch` (N calls). Both are decoded through their typed `sol!`
//! bindings. Arguments of the inner calls are read by fixed-offset word
//! slicing, which only works for static leading arguments; every function in
//! the policy catalog keeps the inspected arguments in static head slots.

use alloy::{
    primitives::{Address, Bytes, U256},
    sol_types::SolCall,
};

use crate::blockchain::contracts::ISmartAccount;

/// Four-byte function selector.
pub type Selector = [u8; 4];

const SELECTOR_LEN: usize = 4;
const WORD_LEN: usize = 32;

/// One atomic sub-operation of a smart-account execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerCall {
    pub target: Address,
    pub value: U256,
    pub data: Bytes,
}

impl InnerCall {
    /// Selector of the inner calldata.
    pub fn selector(&self) -> Result<Selector, DecodeError> {
        selector(&self.data)
    }
}

/// The account entry points the gateway recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountCallShape {
    Execute,
    ExecuteBatch,
    Unknown(Selector),
}

impl AccountCallShape {
    pub fn from_selector(selector: Selector) -> Self {
        if selector == ISmartAccount::executeCall::SELECTOR {
            AccountCallShape::Execute
        } else if selector == ISmartAccount::executeBatchCall::SELECTOR {
            AccountCallShape::ExecuteBatch
        } else {
            AccountCallShape::Unknown(selector)
        }
    }
}

/// Decode a UserOperation's `callData` into its ordered inner calls.
pub fn decode_account_call(call_data: &[u8]) -> Result<Vec<InnerCall>, DecodeError> {
    if call_data.is_empty() {
        return Err(DecodeError::EmptyCallData);
    }

    match AccountCallShape::from_selector(selector(call_data)?) {
        AccountCallShape::Execute => {
            let call = ISmartAccount::executeCall::abi_decode(call_data)
                .map_err(|e| DecodeError::Abi(e.to_string()))?;
            Ok(vec![InnerCall {
                target: call.target,
                value: call.value,
                data: call.data,
            }])
        }
        AccountCallShape::ExecuteBatch => {
            let batch = ISmartAccount::executeBatchCall::abi_decode(call_data)
                .map_err(|e| DecodeError::Abi(e.to_string()))?;
            Ok(batch
                .calls
                .into_iter()
                .map(|c| InnerCall {
                    target: c.target,
                    value: c.value,
                    data: c.data,
                })
                .collect())
        }
        AccountCallShape::Unknown(sel) => Err(DecodeError::UnknownSelector(sel)),
    }
}

/// First four bytes of calldata.
pub fn selector(data: &[u8]) -> Result<Selector, DecodeError> {
    data.get(..SELECTOR_LEN)
        .and_then(|s| s.try_into().ok())
        .ok_or(DecodeError::TooShort(data.len()))
}

/// The `index`-th 32-byte argument word after the selector.
pub fn word(data: &[u8], index: usize) -> Result<&[u8], DecodeError> {
    let start = SELECTOR_LEN + index * WORD_LEN;
    data.get(start..start + WORD_LEN)
        .ok_or(DecodeError::MissingArgument(index))
}

/// The `index`-th argument interpreted as an address.
pub fn address_arg(data: &[u8], index: usize) -> Result<Address, DecodeError> {
    address_from_word(word(data, index)?).ok_or(DecodeError::NonCanonicalAddress(index))
}

/// The `index`-th argument interpreted as a uint256.
pub fn uint_arg(data: &[u8], index: usize) -> Result<U256, DecodeError> {
    Ok(U256::from_be_slice(word(data, index)?))
}

/// A left-padded ABI address word. `None` when the padding is dirty or the
/// word is not exactly 32 bytes.
pub fn address_from_word(word: &[u8]) -> Option<Address> {
    if word.len() != WORD_LEN || word[..12].iter().any(|b| *b != 0) {
        return None;
    }
    Some(Address::from_slice(&word[12..]))
}

/// Calldata decode failures. All are fatal for the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("callData is empty")]
    EmptyCallData,

    #[error("calldata too short for a selector ({0} bytes)")]
    TooShort(usize),

    #[error("unrecognised account call selector 0x{}", alloy::hex::encode(.0))]
    UnknownSelector(Selector),

    #[error("ABI decode failed: {0}")]
    Abi(String),

    #[error("argument {0} is missing")]
    MissingArgument(usize),

    #[error("argument {0} is not a canonical address")]
    NonCanonicalAddress(usize),
}

impl DecodeError {
    pub fn reason(&self) -> &'static str {
        match self {
            DecodeError::EmptyCallData => "empty_call_data",
            DecodeError::TooShort(_) => "call_data_too_short",
            DecodeError::UnknownSelector(_) => "unknown_account_selector",
            DecodeError::Abi(_) => "abi_decode_failed",
            DecodeError::MissingArgument(_) => "missing_argument",
            DecodeError::NonCanonicalAddress(_) => "non_canonical_address",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::contracts::ICreatorToken;
    use alloy::primitives::address;

    const TOKEN: Address = address!("0x1111111111111111111111111111111111111111");
    const SPENDER: Address = address!("0x2222222222222222222222222222222222222222");

    fn approve_data() -> Bytes {
        ICreatorToken::approveCall {
            spender: SPENDER,
            amount: U256::from(1000u64),
        }
        .abi_encode()
        .into()
    }

    #[test]
    fn decodes_single_execute() {
        let data = ISmartAccount::executeCall {
            target: TOKEN,
            value: U256::ZERO,
            data: approve_data(),
        }
        .abi_encode();

        let calls = decode_account_call(&data).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target, TOKEN);
        assert_eq!(calls[0].data, approve_data());
    }

    #[test]
    fn decodes_batch_in_order() {
        let data = ISmartAccount::executeBatchCall {
            calls: vec![
                ISmartAccount::Call {
                    target: SPENDER,
                    value: U256::ZERO,
                    data: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
                },
                ISmartAccount::Call {
                    target: TOKEN,
                    value: U256::from(7u64),
                    data: approve_data(),
                },
            ],
        }
        .abi_encode();

        let calls = decode_account_call(&data).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].target, SPENDER);
        assert_eq!(calls[1].target, TOKEN);
        assert_eq!(calls[1].value, U256::from(7u64));
    }

    #[test]
    fn rejects_unknown_and_truncated_shapes() {
        assert_eq!(decode_account_call(&[]), Err(DecodeError::EmptyCallData));
        assert_eq!(decode_account_call(&[0xb6, 0x1d]), Err(DecodeError::TooShort(2)));
        assert_eq!(
            decode_account_call(&approve_data()),
            Err(DecodeError::UnknownSelector([0x09, 0x5e, 0xa7, 0xb3]))
        );

        // Right selector, garbage body.
        let mut data = ISmartAccount::executeCall::SELECTOR.to_vec();
        data.extend_from_slice(&[0xff; 10]);
        assert!(matches!(decode_account_call(&data), Err(DecodeError::Abi(_))));
    }

    #[test]
    fn fixed_offset_arguments() {
        let data = approve_data();
        assert_eq!(selector(&data).unwrap(), ICreatorToken::approveCall::SELECTOR);
        assert_eq!(address_arg(&data, 0).unwrap(), SPENDER);
        assert_eq!(uint_arg(&data, 1).unwrap(), U256::from(1000u64));
        assert_eq!(address_arg(&data, 2), Err(DecodeError::MissingArgument(2)));
    }

    #[test]
    fn dirty_address_padding_is_rejected() {
        let mut data = approve_data().to_vec();
        data[4] = 0x01;
        assert_eq!(address_arg(&data, 0), Err(DecodeError::NonCanonicalAddress(0)));
    }
}
