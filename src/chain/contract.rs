use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, U256};
use tracing::debug;

use super::{ChainError, ChainGateway, OnChainNode, RewardBalances, decode_node, decode_uint};
use crate::address::WalletAddress;
use crate::config::ChainConfig;
use crate::rpc::RpcClient;

/// A contract function, by signature and derived 4-byte selector.
#[derive(Debug, Clone)]
pub struct ContractFunction {
    signature: String,
    selector: [u8; 4],
}

impl ContractFunction {
    pub fn new(signature: &str) -> Self {
        assert!(
            signature.ends_with("(address)"),
            "Contract lookups take a single address argument"
        );
        Self {
            signature: signature.to_string(),
            selector: ethers::utils::id(signature),
        }
    }

    fn call_data(&self, address: &WalletAddress) -> Vec<u8> {
        let mut data = Vec::with_capacity(36);
        data.extend_from_slice(&self.selector);
        data.extend(ethers::abi::encode(&[Token::Address(address.to_h160())]));
        data
    }
}

#[derive(Debug, Clone)]
pub struct ContractSelectors {
    pub node: ContractFunction,
    pub referral_reward: ContractFunction,
    pub balanced_game_reward: ContractFunction,
    pub unbalanced_game_reward: ContractFunction,
}

impl ContractSelectors {
    pub fn from_config(config: &ChainConfig) -> Self {
        Self {
            node: ContractFunction::new(&config.node_signature),
            referral_reward: ContractFunction::new(&config.referral_reward_signature),
            balanced_game_reward: ContractFunction::new(&config.balanced_game_reward_signature),
            unbalanced_game_reward: ContractFunction::new(
                &config.unbalanced_game_reward_signature,
            ),
        }
    }
}

/// Gateway backed by `eth_call` against the membership contract.
#[derive(Clone)]
pub struct ContractGateway {
    rpc: RpcClient,
    contract: Address,
    selectors: ContractSelectors,
}

impl ContractGateway {
    pub fn new(rpc: RpcClient, contract: &WalletAddress, selectors: ContractSelectors) -> Self {
        assert!(!contract.is_zero(), "Contract address cannot be zero");
        Self {
            rpc,
            contract: contract.to_h160(),
            selectors,
        }
    }

    async fn read_uint(
        &self,
        function: &ContractFunction,
        address: &WalletAddress,
    ) -> Result<U256, ChainError> {
        let data = self
            .rpc
            .eth_call(self.contract, &function.call_data(address))
            .await?;
        decode_uint(&function.signature, &data)
    }
}

#[async_trait]
impl ChainGateway for ContractGateway {
    async fn get_node(&self, address: &WalletAddress) -> Result<Option<OnChainNode>, ChainError> {
        let function = &self.selectors.node;
        let data = self
            .rpc
            .eth_call(self.contract, &function.call_data(address))
            .await?;
        let node = decode_node(&function.signature, &data)?;
        debug!(wallet = %address, registered = node.is_some(), "Fetched on-chain node");
        Ok(node)
    }

    async fn get_reward_balances(
        &self,
        address: &WalletAddress,
    ) -> Result<RewardBalances, ChainError> {
        let (referral, balanced_game, unbalanced_game) = tokio::try_join!(
            self.read_uint(&self.selectors.referral_reward, address),
            self.read_uint(&self.selectors.balanced_game_reward, address),
            self.read_uint(&self.selectors.unbalanced_game_reward, address),
        )?;
        Ok(RewardBalances {
            referral,
            balanced_game,
            unbalanced_game,
        })
    }
}
