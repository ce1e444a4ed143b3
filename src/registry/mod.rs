//! Persisted wallet ↔ profile bindings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;

use crate::address::WalletAddress;

mod database;

pub use database::DatabaseLinkRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PremiumLink {
    pub wallet_address: WalletAddress,
    pub profile_id: String,
    pub linked_at: DateTime<Utc>,
    pub is_active: bool,
    pub deactivated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The wallet already holds a binding. `existing` is the active row when
    /// it could be read inside the same transaction.
    #[error("wallet {wallet} is already bound to a profile")]
    WalletTaken {
        wallet: WalletAddress,
        existing: Option<PremiumLink>,
    },
    #[error("profile {profile_id} is already bound to a wallet")]
    ProfileTaken { profile_id: String },
    #[error("no active link for wallet {0}")]
    NotFound(WalletAddress),
    #[error("registry storage error: {0}")]
    Storage(#[from] DbErr),
}

#[async_trait]
pub trait LinkRegistry: Send + Sync {
    async fn find_active_by_wallet(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Option<PremiumLink>, RegistryError>;

    /// The wallet's binding whatever its `is_active` state. A deactivated
    /// row still holds the wallet key, so it is what a refused relink is
    /// bound to.
    async fn find_by_wallet(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Option<PremiumLink>, RegistryError>;

    async fn find_active_by_profile(
        &self,
        profile_id: &str,
    ) -> Result<Option<PremiumLink>, RegistryError>;

    /// Creates the one binding for `wallet`. Both exclusivity checks and the
    /// insert run in a single transaction; a uniqueness violation raised by
    /// a concurrent writer comes back as `WalletTaken` or `ProfileTaken`.
    async fn create_link(
        &self,
        wallet: &WalletAddress,
        profile_id: &str,
        linked_at: DateTime<Utc>,
    ) -> Result<PremiumLink, RegistryError>;

    /// Administrative revocation. The row keeps occupying its wallet and
    /// profile keys.
    async fn deactivate_link(
        &self,
        wallet: &WalletAddress,
        at: DateTime<Utc>,
    ) -> Result<PremiumLink, RegistryError>;
}
