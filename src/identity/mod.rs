//! Off-chain profiles and who owns them.
//!
//! Ownership is decided by the identity side; this service only asks.

use async_trait::async_trait;
use serde::Serialize;

use crate::address::WalletAddress;

mod cache;
mod database;

pub use cache::CachedIdentityProvider;
pub use database::DatabaseIdentityProvider;

pub const MAX_PROFILES_PER_WALLET: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: String,
    pub handle: String,
    pub owned_by: WalletAddress,
    pub is_default: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity store error: {0}")]
    Storage(#[from] sea_orm::DbErr),
    #[error("identity record {id} is malformed: {reason}")]
    Malformed { id: String, reason: String },
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Profiles owned by `wallet`, in the provider's own order.
    async fn get_profiles_by_wallet(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Vec<Profile>, IdentityError>;

    async fn get_profile_by_id(&self, id: &str) -> Result<Option<Profile>, IdentityError>;

    async fn validate_ownership(
        &self,
        wallet: &WalletAddress,
        profile_id: &str,
    ) -> Result<bool, IdentityError> {
        Ok(self
            .get_profile_by_id(profile_id)
            .await?
            .is_some_and(|profile| &profile.owned_by == wallet))
    }
}
