//! Read-only view of the membership contract.
//!
//! The gateway translates wallet addresses into node records and reward
//! balances. It never writes to the chain, never caches and never retries:
//! retry policy belongs to the call-site, and a failed read must surface as
//! [`ChainError`] so nobody mistakes "could not check" for "not premium".

use async_trait::async_trait;
use ethers::abi::{ParamType, Token};
use ethers::types::U256;

use crate::address::WalletAddress;

mod contract;

pub use contract::{ContractGateway, ContractSelectors};

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("chain RPC call {method} timed out")]
    Timeout { method: &'static str },
    #[error("chain RPC call {method} failed: {reason}")]
    Transport { method: &'static str, reason: String },
    #[error("malformed {call} response: {reason}")]
    Malformed { call: String, reason: String },
}

/// Projection of one node of the on-chain placement tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnChainNode {
    pub start_time: u64,
    pub balance: U256,
    pub point: U256,
    pub depth: u64,
    pub depth_left_branch: u64,
    pub depth_right_branch: u64,
    pub player: WalletAddress,
    pub parent: Option<WalletAddress>,
    pub left_child: Option<WalletAddress>,
    pub right_child: Option<WalletAddress>,
    pub is_point_changed: bool,
    pub unbalanced_allowance: U256,
}

impl OnChainNode {
    /// Non-empty child pointers, left first.
    pub fn children(&self) -> impl Iterator<Item = &WalletAddress> {
        self.left_child.iter().chain(self.right_child.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RewardBalances {
    pub referral: U256,
    pub balanced_game: U256,
    pub unbalanced_game: U256,
}

#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// `Ok(None)` when the wallet was never registered (`startTime == 0`).
    async fn get_node(&self, address: &WalletAddress) -> Result<Option<OnChainNode>, ChainError>;

    async fn get_reward_balances(&self, address: &WalletAddress)
    -> Result<RewardBalances, ChainError>;

    async fn is_premium(&self, address: &WalletAddress) -> Result<bool, ChainError> {
        Ok(self.get_node(address).await?.is_some())
    }
}

pub(crate) fn node_return_type() -> ParamType {
    ParamType::Tuple(vec![
        ParamType::Uint(256), // startTime
        ParamType::Uint(256), // balance
        ParamType::Uint(256), // point
        ParamType::Uint(256), // depth
        ParamType::Uint(256), // depthLeftBranch
        ParamType::Uint(256), // depthRightBranch
        ParamType::Address,   // player
        ParamType::Address,   // parent
        ParamType::Address,   // leftChild
        ParamType::Address,   // rightChild
        ParamType::Bool,      // isPointChanged
        ParamType::Uint(256), // unbalancedAllowance
    ])
}

/// Decodes the ABI return data of the node lookup. `startTime == 0` maps to
/// `None`.
pub fn decode_node(call: &str, data: &[u8]) -> Result<Option<OnChainNode>, ChainError> {
    let malformed = |reason: String| ChainError::Malformed {
        call: call.to_string(),
        reason,
    };

    let mut tokens = ethers::abi::decode(&[node_return_type()], data)
        .map_err(|err| malformed(err.to_string()))?;
    let fields = match tokens.pop() {
        Some(Token::Tuple(fields)) if fields.len() == 12 => fields,
        other => return Err(malformed(format!("unexpected node shape: {other:?}"))),
    };

    let mut fields = fields.into_iter();
    let mut next = || fields.next().ok_or_else(|| malformed("missing field".to_string()));

    let start_time = token_u64(next()?, "startTime").map_err(malformed)?;
    if start_time == 0 {
        return Ok(None);
    }
    let balance = token_uint(next()?, "balance").map_err(malformed)?;
    let point = token_uint(next()?, "point").map_err(malformed)?;
    let depth = token_u64(next()?, "depth").map_err(malformed)?;
    let depth_left_branch = token_u64(next()?, "depthLeftBranch").map_err(malformed)?;
    let depth_right_branch = token_u64(next()?, "depthRightBranch").map_err(malformed)?;
    let player = token_address(next()?, "player").map_err(malformed)?;
    let parent = token_address(next()?, "parent").map_err(malformed)?;
    let left_child = token_address(next()?, "leftChild").map_err(malformed)?;
    let right_child = token_address(next()?, "rightChild").map_err(malformed)?;
    let is_point_changed = match next()? {
        Token::Bool(flag) => flag,
        other => return Err(malformed(format!("isPointChanged is not a bool: {other:?}"))),
    };
    let unbalanced_allowance = token_uint(next()?, "unbalancedAllowance").map_err(malformed)?;

    Ok(Some(OnChainNode {
        start_time,
        balance,
        point,
        depth,
        depth_left_branch,
        depth_right_branch,
        player,
        parent: non_zero(parent),
        left_child: non_zero(left_child),
        right_child: non_zero(right_child),
        is_point_changed,
        unbalanced_allowance,
    }))
}

pub fn decode_uint(call: &str, data: &[u8]) -> Result<U256, ChainError> {
    let mut tokens = ethers::abi::decode(&[ParamType::Uint(256)], data).map_err(|err| {
        ChainError::Malformed {
            call: call.to_string(),
            reason: err.to_string(),
        }
    })?;
    match tokens.pop() {
        Some(Token::Uint(value)) => Ok(value),
        other => Err(ChainError::Malformed {
            call: call.to_string(),
            reason: format!("expected uint256, got {other:?}"),
        }),
    }
}

fn token_uint(token: Token, field: &str) -> Result<U256, String> {
    match token {
        Token::Uint(value) => Ok(value),
        other => Err(format!("{field} is not a uint: {other:?}")),
    }
}

fn token_u64(token: Token, field: &str) -> Result<u64, String> {
    let value = token_uint(token, field)?;
    if value > U256::from(u64::MAX) {
        return Err(format!("{field} {value} overflows u64"));
    }
    Ok(value.as_u64())
}

fn token_address(token: Token, field: &str) -> Result<WalletAddress, String> {
    match token {
        Token::Address(address) => Ok(WalletAddress::from(address)),
        other => Err(format!("{field} is not an address: {other:?}")),
    }
}

fn non_zero(address: WalletAddress) -> Option<WalletAddress> {
    if address.is_zero() { None } else { Some(address) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    fn encoded_node(start_time: u64, left: Address, right: Address) -> Vec<u8> {
        ethers::abi::encode(&[Token::Tuple(vec![
            Token::Uint(U256::from(start_time)),
            Token::Uint(U256::from(1_000u64)),
            Token::Uint(U256::from(7u64)),
            Token::Uint(U256::from(3u64)),
            Token::Uint(U256::from(2u64)),
            Token::Uint(U256::from(1u64)),
            Token::Address(Address::from_low_u64_be(0xaa)),
            Token::Address(Address::from_low_u64_be(0x01)),
            Token::Address(left),
            Token::Address(right),
            Token::Bool(true),
            Token::Uint(U256::from(50u64)),
        ])])
    }

    #[test]
    fn zero_start_time_means_unregistered() {
        let data = encoded_node(0, Address::zero(), Address::zero());
        assert_eq!(decode_node("getNode", &data).unwrap(), None);
    }

    #[test]
    fn zero_children_become_absent() {
        let data = encoded_node(1_700_000_000, Address::from_low_u64_be(0xbb), Address::zero());
        let node = decode_node("getNode", &data).unwrap().expect("registered node");
        assert_eq!(node.start_time, 1_700_000_000);
        assert_eq!(node.depth, 3);
        assert_eq!(node.balance, U256::from(1_000u64));
        assert!(node.is_point_changed);
        assert_eq!(
            node.left_child,
            Some(WalletAddress::from(Address::from_low_u64_be(0xbb)))
        );
        assert_eq!(node.right_child, None);
        assert_eq!(node.children().count(), 1);
        assert_eq!(
            node.player,
            WalletAddress::from(Address::from_low_u64_be(0xaa))
        );
    }

    #[test]
    fn truncated_return_data_is_malformed() {
        let data = encoded_node(5, Address::zero(), Address::zero());
        let err = decode_node("getNode", &data[..64]).unwrap_err();
        assert!(matches!(err, ChainError::Malformed { .. }));
    }

    #[test]
    fn oversized_depth_is_rejected() {
        let mut data = encoded_node(5, Address::zero(), Address::zero());
        // depth word lives at offset 3 * 32
        for byte in &mut data[96..104] {
            *byte = 0xff;
        }
        let err = decode_node("getNode", &data).unwrap_err();
        assert!(err.to_string().contains("depth"));
    }

    #[test]
    fn reward_word_decodes() {
        let data = ethers::abi::encode(&[Token::Uint(U256::from(42u64))]);
        assert_eq!(decode_uint("referralRewards", &data).unwrap(), U256::from(42u64));
        assert!(decode_uint("referralRewards", &[]).is_err());
    }
}
