use std::sync::Arc;

use tracing::warn;

use super::{LinkedProfile, UserStatus, UserStatusReport};
use crate::address::WalletAddress;
use crate::chain::ChainGateway;
use crate::error::{PremiumError, already_linked_message};
use crate::identity::IdentityProvider;
use crate::registry::LinkRegistry;

#[derive(Clone)]
pub struct StatusResolver {
    gateway: Arc<dyn ChainGateway>,
    registry: Arc<dyn LinkRegistry>,
    identity: Arc<dyn IdentityProvider>,
}

impl StatusResolver {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        registry: Arc<dyn LinkRegistry>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            gateway,
            registry,
            identity,
        }
    }

    /// A chain failure is an error, never `Standard`.
    pub async fn get_user_status(
        &self,
        wallet: &WalletAddress,
    ) -> Result<UserStatusReport, PremiumError> {
        if !self.gateway.is_premium(wallet).await? {
            return Ok(UserStatusReport {
                status: UserStatus::Standard,
                linked_profile: None,
            });
        }

        let Some(link) = self.registry.find_active_by_wallet(wallet).await? else {
            return Ok(UserStatusReport {
                status: UserStatus::OnChainUnlinked,
                linked_profile: None,
            });
        };

        let handle = self.resolve_handle(wallet, &link.profile_id).await;
        Ok(UserStatusReport {
            status: UserStatus::ProLinked,
            linked_profile: Some(LinkedProfile {
                profile_id: link.profile_id,
                handle,
                linked_at: link.linked_at,
            }),
        })
    }

    /// Premium belongs to the (wallet, profile) pair. Other profiles of a
    /// premium wallet read as non-premium.
    pub async fn is_profile_premium(
        &self,
        wallet: &WalletAddress,
        profile_id: &str,
    ) -> Result<bool, PremiumError> {
        let link = self.registry.find_active_by_wallet(wallet).await?;
        Ok(link.is_some_and(|link| link.profile_id == profile_id))
    }

    /// Explanation shown when a wallet tries to link another profile after
    /// its premium status is already bound. `None` while the wallet is free.
    pub async fn get_premium_rejection_message(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Option<String>, PremiumError> {
        let report = self.get_user_status(wallet).await?;
        Ok(report.linked_profile.map(|linked| {
            already_linked_message(&Some(linked.profile_id), linked.handle.as_deref())
        }))
    }

    /// Handles are cosmetic: a provider failure is logged and the caller
    /// falls back to the raw profile id.
    pub(crate) async fn resolve_handle(
        &self,
        wallet: &WalletAddress,
        profile_id: &str,
    ) -> Option<String> {
        match self.identity.get_profile_by_id(profile_id).await {
            Ok(Some(profile)) => Some(profile.handle),
            Ok(None) => {
                warn!(wallet = %wallet, profile_id, "Linked profile not known to identity provider");
                None
            }
            Err(err) => {
                warn!(wallet = %wallet, profile_id, "Failed to resolve linked profile handle: {err}");
                None
            }
        }
    }
}
