//! Downline reconstruction from the on-chain placement tree.
//!
//! Each node only exposes parent and child pointers, so the tree is walked
//! breadth-first with one gateway call per discovered address. Nothing
//! about the chain's shape is trusted: the `visited` set breaks cycles and
//! duplicate pointers, and the wall-clock budget bounds the time spent.
//!
//! The walk never fetches more than [`ReferralTreeBuilder::node_cap`]
//! addresses. Every level is deduplicated and each node contributes at most
//! two children, so level `d` holds at most `2^d` addresses; the cap is an
//! invariant of the traversal rather than a stopping rule.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::address::WalletAddress;
use crate::chain::{ChainGateway, OnChainNode};
use crate::config::{MAX_TREE_DEPTH, ReferralConfig};
use crate::error::PremiumError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub address: WalletAddress,
    /// Distance from the root of this walk, not the on-chain `depth` field.
    pub depth: u32,
    pub node: OnChainNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralTree {
    pub root: WalletAddress,
    pub max_depth: u32,
    pub nodes: Vec<TreeNode>,
    /// Set when the time budget cut the walk short.
    pub truncated: bool,
}

#[derive(Clone)]
pub struct ReferralTreeBuilder {
    gateway: Arc<dyn ChainGateway>,
    depth_ceiling: u32,
    budget: Duration,
    fetch_concurrency: usize,
}

impl ReferralTreeBuilder {
    pub fn new(gateway: Arc<dyn ChainGateway>, config: &ReferralConfig) -> Self {
        Self::with_limits(
            gateway,
            config.max_depth,
            config.build_budget(),
            config.fetch_concurrency,
        )
    }

    pub fn with_limits(
        gateway: Arc<dyn ChainGateway>,
        depth_ceiling: u32,
        budget: Duration,
        fetch_concurrency: usize,
    ) -> Self {
        assert!(fetch_concurrency > 0, "Fetch concurrency must be positive");
        assert!(!budget.is_zero(), "Tree budget must be positive");
        Self {
            gateway,
            depth_ceiling: depth_ceiling.min(MAX_TREE_DEPTH),
            budget,
            fetch_concurrency,
        }
    }

    /// Largest number of addresses a walk of `depth` levels below the root
    /// can fetch: the size of a full binary tree of that depth.
    pub fn node_cap(depth: u32) -> usize {
        (1usize << (depth + 1)) - 1
    }

    pub async fn build_tree(
        &self,
        root: &WalletAddress,
        max_depth: u32,
    ) -> Result<ReferralTree, PremiumError> {
        let max_depth = max_depth.min(self.depth_ceiling);
        let node_cap = Self::node_cap(max_depth);
        let deadline = Instant::now() + self.budget;

        let mut visited: HashSet<WalletAddress> = HashSet::new();
        let mut nodes: Vec<TreeNode> = Vec::new();
        let mut frontier = vec![root.clone()];
        let mut depth = 0u32;
        let mut fetched_total = 0usize;
        let mut truncated = false;

        while !frontier.is_empty() && depth <= max_depth {
            let mut level: Vec<WalletAddress> = Vec::with_capacity(frontier.len());
            for address in frontier.drain(..) {
                if !visited.contains(&address) && !level.contains(&address) {
                    level.push(address);
                }
            }
            assert!(
                level.len() <= 1usize << depth,
                "Referral level wider than a binary tree"
            );
            fetched_total += level.len();
            assert!(fetched_total <= node_cap, "Referral walk exceeded node cap");

            let pending: Vec<_> = level
                .iter()
                .map(|address| self.gateway.get_node(address))
                .collect();
            let fetches = stream::iter(pending)
                .buffered(self.fetch_concurrency)
                .collect::<Vec<_>>();
            let Ok(results) = timeout_at(deadline, fetches).await else {
                truncated = true;
                warn!(
                    root = %root,
                    max_depth,
                    depth,
                    collected = nodes.len(),
                    "Referral tree walk ran out of time"
                );
                break;
            };

            // Merge on this task only, in queue order.
            let mut next = Vec::new();
            for (address, result) in level.into_iter().zip(results) {
                let fetched = result?;
                visited.insert(address.clone());
                let Some(node) = fetched else {
                    debug!(wallet = %address, "Referral pointer to unregistered address");
                    continue;
                };
                next.extend(
                    node.children()
                        .filter(|child| !visited.contains(*child))
                        .cloned(),
                );
                nodes.push(TreeNode {
                    address,
                    depth,
                    node,
                });
            }

            frontier = next;
            depth += 1;
        }

        Ok(ReferralTree {
            root: root.clone(),
            max_depth,
            nodes,
            truncated,
        })
    }
}
