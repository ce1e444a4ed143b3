//! Test doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ethers::types::{Address, U256};
use migration::MigratorTrait;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection};

use crate::address::WalletAddress;
use crate::chain::{ChainError, ChainGateway, OnChainNode, RewardBalances};
use crate::entities::profile;
use crate::events::{EventError, EventSink, PremiumEvent};
use crate::identity::{IdentityError, IdentityProvider, Profile};
use crate::registry::{LinkRegistry, PremiumLink, RegistryError};

pub fn wallet(n: u64) -> WalletAddress {
    WalletAddress::from(Address::from_low_u64_be(n))
}

/// Fresh in-memory SQLite database with every migration applied. A single
/// pooled connection keeps the database alive and serialises writers.
pub async fn sqlite_database() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let database = Database::connect(options)
        .await
        .expect("sqlite connects");
    migration::Migrator::up(&database, None)
        .await
        .expect("migrations apply");
    database
}

pub async fn insert_profile(
    database: &DatabaseConnection,
    id: &str,
    handle: &str,
    owner: &WalletAddress,
    is_default: bool,
    created_at_secs: i64,
) {
    let created_at: DateTime<Utc> = Utc.timestamp_opt(created_at_secs, 0).unwrap();
    profile::ActiveModel {
        id: Set(id.to_string()),
        handle: Set(handle.to_string()),
        owned_by: Set(owner.as_str().to_string()),
        is_default: Set(is_default),
        created_at: Set(created_at.fixed_offset()),
    }
    .insert(database)
    .await
    .expect("profile inserts");
}

pub fn node(
    address: &WalletAddress,
    left: Option<&WalletAddress>,
    right: Option<&WalletAddress>,
) -> OnChainNode {
    OnChainNode {
        start_time: 1_700_000_000,
        balance: U256::from(100u64),
        point: U256::zero(),
        depth: 0,
        depth_left_branch: 0,
        depth_right_branch: 0,
        player: address.clone(),
        parent: None,
        left_child: left.cloned(),
        right_child: right.cloned(),
        is_point_changed: false,
        unbalanced_allowance: U256::zero(),
    }
}

#[derive(Default)]
pub struct StubGateway {
    nodes: Mutex<HashMap<WalletAddress, OnChainNode>>,
    failing: Mutex<HashSet<WalletAddress>>,
    delays: Mutex<HashMap<WalletAddress, Duration>>,
    rewards: Mutex<HashMap<WalletAddress, RewardBalances>>,
    calls: AtomicUsize,
}

impl StubGateway {
    /// Registers a leaf node for `address`.
    pub fn register(&self, address: &WalletAddress) {
        self.insert_node(node(address, None, None));
    }

    pub fn insert_node(&self, node: OnChainNode) {
        self.nodes.lock().unwrap().insert(node.player.clone(), node);
    }

    pub fn fail(&self, address: &WalletAddress) {
        self.failing.lock().unwrap().insert(address.clone());
    }

    pub fn delay(&self, address: &WalletAddress, delay: Duration) {
        self.delays.lock().unwrap().insert(address.clone(), delay);
    }

    pub fn set_rewards(&self, address: &WalletAddress, rewards: RewardBalances) {
        self.rewards.lock().unwrap().insert(address.clone(), rewards);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainGateway for StubGateway {
    async fn get_node(&self, address: &WalletAddress) -> Result<Option<OnChainNode>, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.lock().unwrap().get(address).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(address) {
            return Err(ChainError::Timeout { method: "eth_call" });
        }
        Ok(self.nodes.lock().unwrap().get(address).cloned())
    }

    async fn get_reward_balances(
        &self,
        address: &WalletAddress,
    ) -> Result<RewardBalances, ChainError> {
        if self.failing.lock().unwrap().contains(address) {
            return Err(ChainError::Transport {
                method: "eth_call",
                reason: "connection refused".to_string(),
            });
        }
        Ok(self
            .rewards
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or_default())
    }
}

/// Registry whose create path holds one lock across check and insert, the
/// same guarantee the database gets from its unique constraints.
#[derive(Default)]
pub struct MemoryLinkRegistry {
    links: tokio::sync::Mutex<Vec<PremiumLink>>,
}

#[async_trait]
impl LinkRegistry for MemoryLinkRegistry {
    async fn find_active_by_wallet(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Option<PremiumLink>, RegistryError> {
        let links = self.links.lock().await;
        Ok(links
            .iter()
            .find(|link| link.is_active && &link.wallet_address == wallet)
            .cloned())
    }

    async fn find_by_wallet(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Option<PremiumLink>, RegistryError> {
        let links = self.links.lock().await;
        Ok(links
            .iter()
            .find(|link| &link.wallet_address == wallet)
            .cloned())
    }

    async fn find_active_by_profile(
        &self,
        profile_id: &str,
    ) -> Result<Option<PremiumLink>, RegistryError> {
        let links = self.links.lock().await;
        Ok(links
            .iter()
            .find(|link| link.is_active && link.profile_id == profile_id)
            .cloned())
    }

    async fn create_link(
        &self,
        wallet: &WalletAddress,
        profile_id: &str,
        linked_at: DateTime<Utc>,
    ) -> Result<PremiumLink, RegistryError> {
        let mut links = self.links.lock().await;
        if let Some(existing) = links.iter().find(|link| &link.wallet_address == wallet) {
            return Err(RegistryError::WalletTaken {
                wallet: wallet.clone(),
                existing: existing.is_active.then(|| existing.clone()),
            });
        }
        if links.iter().any(|link| link.profile_id == profile_id) {
            return Err(RegistryError::ProfileTaken {
                profile_id: profile_id.to_string(),
            });
        }
        // Widen the race window for the concurrency tests.
        tokio::task::yield_now().await;
        let link = PremiumLink {
            wallet_address: wallet.clone(),
            profile_id: profile_id.to_string(),
            linked_at,
            is_active: true,
            deactivated_at: None,
        };
        links.push(link.clone());
        Ok(link)
    }

    async fn deactivate_link(
        &self,
        wallet: &WalletAddress,
        at: DateTime<Utc>,
    ) -> Result<PremiumLink, RegistryError> {
        let mut links = self.links.lock().await;
        let link = links
            .iter_mut()
            .find(|link| link.is_active && &link.wallet_address == wallet)
            .ok_or_else(|| RegistryError::NotFound(wallet.clone()))?;
        link.is_active = false;
        link.deactivated_at = Some(at);
        Ok(link.clone())
    }
}

#[derive(Default)]
pub struct MemoryIdentityProvider {
    profiles: Mutex<Vec<Profile>>,
    lookups_by_id: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryIdentityProvider {
    pub fn add_profile(&self, id: &str, handle: &str, owner: &WalletAddress, is_default: bool) {
        self.profiles.lock().unwrap().push(Profile {
            id: id.to_string(),
            handle: handle.to_string(),
            owned_by: owner.clone(),
            is_default,
        });
    }

    pub fn rename(&self, id: &str, handle: &str) {
        let mut profiles = self.profiles.lock().unwrap();
        if let Some(profile) = profiles.iter_mut().find(|p| p.id == id) {
            profile.handle = handle.to_string();
        }
    }

    pub fn transfer(&self, id: &str, owner: &WalletAddress) {
        let mut profiles = self.profiles.lock().unwrap();
        if let Some(profile) = profiles.iter_mut().find(|p| p.id == id) {
            profile.owned_by = owner.clone();
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn lookups_by_id(&self) -> usize {
        self.lookups_by_id.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), IdentityError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IdentityError::Storage(sea_orm::DbErr::Conn(
                sea_orm::RuntimeErr::Internal("identity provider offline".to_string()),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn get_profiles_by_wallet(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Vec<Profile>, IdentityError> {
        self.check_available()?;
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .filter(|profile| &profile.owned_by == wallet)
            .cloned()
            .collect())
    }

    async fn get_profile_by_id(&self, id: &str) -> Result<Option<Profile>, IdentityError> {
        self.check_available()?;
        self.lookups_by_id.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .find(|profile| profile.id == id)
            .cloned())
    }
}

#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<PremiumEvent>>,
    reject: AtomicBool,
}

impl RecordingEventSink {
    pub fn rejecting() -> Self {
        Self {
            events: Mutex::default(),
            reject: AtomicBool::new(true),
        }
    }

    pub fn events(&self) -> Vec<PremiumEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: PremiumEvent) -> Result<(), EventError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(EventError::Full(event.event_type));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
