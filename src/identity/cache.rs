use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use super::{IdentityError, IdentityProvider, Profile};
use crate::address::WalletAddress;
use crate::config::CacheConfig;

/// Caches profile lookups by id. Only handle rendering goes through the
/// cache; ownership checks and wallet listings always hit the provider.
pub struct CachedIdentityProvider {
    inner: Arc<dyn IdentityProvider>,
    profiles: Cache<String, Arc<Profile>>,
}

impl CachedIdentityProvider {
    pub fn new(inner: Arc<dyn IdentityProvider>, config: &CacheConfig) -> Self {
        assert!(
            config.profiles_max_capacity >= 100,
            "Profile cache capacity threshold"
        );
        let profiles = Cache::builder()
            .max_capacity(config.profiles_max_capacity)
            .time_to_live(Duration::from_secs(config.profiles_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.profiles_ttl_seconds / 2 + 1))
            .build();
        Self { inner, profiles }
    }

    pub fn entry_count(&self) -> u64 {
        self.profiles.entry_count()
    }
}

#[async_trait]
impl IdentityProvider for CachedIdentityProvider {
    async fn get_profiles_by_wallet(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Vec<Profile>, IdentityError> {
        self.inner.get_profiles_by_wallet(wallet).await
    }

    async fn get_profile_by_id(&self, id: &str) -> Result<Option<Profile>, IdentityError> {
        if let Some(cached) = self.profiles.get(id).await {
            return Ok(Some((*cached).clone()));
        }
        let profile = self.inner.get_profile_by_id(id).await?;
        if let Some(profile) = &profile {
            self.profiles
                .insert(id.to_string(), Arc::new(profile.clone()))
                .await;
        }
        Ok(profile)
    }

    async fn validate_ownership(
        &self,
        wallet: &WalletAddress,
        profile_id: &str,
    ) -> Result<bool, IdentityError> {
        self.inner.validate_ownership(wallet, profile_id).await
    }
}
