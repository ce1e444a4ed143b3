use serde::{Deserialize, Serialize};

use crate::address::WalletAddress;
use crate::chain::RewardBalances;
use crate::referral::{ReferralTree, TreeNode};

// Token amounts are uint256 on-chain and travel as decimal strings.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralTreeView {
    pub root: String,
    pub max_depth: u32,
    pub truncated: bool,
    pub nodes: Vec<TreeNodeView>,
}

impl From<&ReferralTree> for ReferralTreeView {
    fn from(tree: &ReferralTree) -> Self {
        Self {
            root: tree.root.to_string(),
            max_depth: tree.max_depth,
            truncated: tree.truncated,
            nodes: tree.nodes.iter().map(TreeNodeView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNodeView {
    pub address: String,
    pub depth: u32,
    pub start_time: u64,
    pub balance: String,
    pub point: String,
    pub chain_depth: u64,
    pub depth_left_branch: u64,
    pub depth_right_branch: u64,
    pub parent: Option<String>,
    pub left_child: Option<String>,
    pub right_child: Option<String>,
    pub is_point_changed: bool,
    pub unbalanced_allowance: String,
}

impl From<&TreeNode> for TreeNodeView {
    fn from(entry: &TreeNode) -> Self {
        let node = &entry.node;
        Self {
            address: entry.address.to_string(),
            depth: entry.depth,
            start_time: node.start_time,
            balance: node.balance.to_string(),
            point: node.point.to_string(),
            chain_depth: node.depth,
            depth_left_branch: node.depth_left_branch,
            depth_right_branch: node.depth_right_branch,
            parent: node.parent.as_ref().map(WalletAddress::to_string),
            left_child: node.left_child.as_ref().map(WalletAddress::to_string),
            right_child: node.right_child.as_ref().map(WalletAddress::to_string),
            is_point_changed: node.is_point_changed,
            unbalanced_allowance: node.unbalanced_allowance.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardBalancesView {
    pub wallet_address: String,
    pub referral: String,
    pub balanced_game: String,
    pub unbalanced_game: String,
}

impl RewardBalancesView {
    pub fn new(wallet: &WalletAddress, rewards: RewardBalances) -> Self {
        Self {
            wallet_address: wallet.to_string(),
            referral: rewards.referral.to_string(),
            balanced_game: rewards.balanced_game.to_string(),
            unbalanced_game: rewards.unbalanced_game.to_string(),
        }
    }
}
