use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use super::UserStatus;
use crate::address::{WalletAddress, sanitize_profile_id};
use crate::chain::ChainGateway;
use crate::error::PremiumError;
use crate::events::{EventSink, EventType, PremiumEvent};
use crate::identity::IdentityProvider;
use crate::registry::{LinkRegistry, PremiumLink, RegistryError};

/// Write path of the link registry. Creates the single, permanent binding
/// between a premium wallet and one of its profiles.
#[derive(Clone)]
pub struct LinkingService {
    gateway: Arc<dyn ChainGateway>,
    identity: Arc<dyn IdentityProvider>,
    registry: Arc<dyn LinkRegistry>,
    events: Arc<dyn EventSink>,
}

impl LinkingService {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        identity: Arc<dyn IdentityProvider>,
        registry: Arc<dyn LinkRegistry>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            gateway,
            identity,
            registry,
            events,
        }
    }

    pub async fn link_profile(
        &self,
        wallet: &WalletAddress,
        profile_id: &str,
    ) -> Result<PremiumLink, PremiumError> {
        self.link(wallet, profile_id, EventType::ProfileLinked).await
    }

    /// Links the first profile the identity provider lists for `wallet`.
    /// `Ok(None)` when the wallet owns no profile.
    pub async fn auto_link_first_profile(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Option<PremiumLink>, PremiumError> {
        let profiles = self.identity.get_profiles_by_wallet(wallet).await?;
        let Some(first) = profiles.into_iter().next() else {
            info!(wallet = %wallet, "No profile to auto-link");
            return Ok(None);
        };
        let link = self
            .link(wallet, &first.id, EventType::ProfileAutoLinked)
            .await?;
        Ok(Some(link))
    }

    /// Premium links are irreversible. Kept as an explicit operation so
    /// re-enabling it is one visible change.
    pub async fn unlink_profile(&self, wallet: &WalletAddress) -> Result<(), PremiumError> {
        warn!(wallet = %wallet, "Rejected attempt to unlink premium profile");
        Err(PremiumError::OperationNotAllowed)
    }

    async fn link(
        &self,
        wallet: &WalletAddress,
        profile_id: &str,
        event_type: EventType,
    ) -> Result<PremiumLink, PremiumError> {
        // Only ids already in canonical form can be bound; anything else,
        // including an empty id, is not a profile this wallet can own.
        if sanitize_profile_id(profile_id).as_deref() != Some(profile_id) {
            warn!(wallet = %wallet, profile_id, "Refused link for unusable profile id");
            return Err(PremiumError::NotOwner {
                wallet: wallet.clone(),
                profile_id: profile_id.to_string(),
            });
        }

        if !self.gateway.is_premium(wallet).await? {
            return Err(PremiumError::NotPremium(wallet.clone()));
        }

        // Ownership is never assumed: a provider error fails the link.
        if !self.identity.validate_ownership(wallet, profile_id).await? {
            return Err(PremiumError::NotOwner {
                wallet: wallet.clone(),
                profile_id: profile_id.to_string(),
            });
        }

        let link = match self.registry.create_link(wallet, profile_id, Utc::now()).await {
            Ok(link) => link,
            Err(RegistryError::WalletTaken { existing, .. }) => {
                let bound_profile_id = match existing {
                    Some(link) => Some(link.profile_id),
                    None => self.bound_profile_id(wallet).await,
                };
                let bound_handle = match &bound_profile_id {
                    Some(id) => self.bound_handle(wallet, id).await,
                    None => None,
                };
                info!(wallet = %wallet, profile_id, "Link refused, wallet already linked");
                return Err(PremiumError::WalletAlreadyLinked {
                    wallet: wallet.clone(),
                    bound_profile_id,
                    bound_handle,
                });
            }
            Err(err) => return Err(err.into()),
        };

        info!(wallet = %wallet, profile_id, %event_type, "Premium profile linked");
        self.publish(PremiumEvent::new(
            event_type,
            wallet.clone(),
            json!({
                "profile_id": link.profile_id,
                "linked_at": link.linked_at,
            }),
        ));
        self.publish(PremiumEvent::new(
            EventType::PremiumStatusChanged,
            wallet.clone(),
            json!({
                "from": UserStatus::OnChainUnlinked.as_str(),
                "to": UserStatus::ProLinked.as_str(),
                "profile_id": link.profile_id,
            }),
        ));

        Ok(link)
    }

    /// Emission failures never roll back a committed link.
    fn publish(&self, event: PremiumEvent) {
        let event_type = event.event_type;
        let wallet = event.wallet_address.clone();
        if let Err(err) = self.events.emit(event) {
            warn!(%event_type, wallet = %wallet, "Dropped premium event: {err}");
        }
    }

    async fn bound_profile_id(&self, wallet: &WalletAddress) -> Option<String> {
        match self.registry.find_by_wallet(wallet).await {
            Ok(link) => link.map(|link| link.profile_id),
            Err(err) => {
                warn!(wallet = %wallet, "Failed to read existing link for rejection message: {err}");
                None
            }
        }
    }

    async fn bound_handle(&self, wallet: &WalletAddress, profile_id: &str) -> Option<String> {
        match self.identity.get_profile_by_id(profile_id).await {
            Ok(profile) => profile.map(|profile| profile.handle),
            Err(err) => {
                warn!(wallet = %wallet, profile_id, "Failed to resolve bound profile handle: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::DatabaseIdentityProvider;
    use crate::premium::StatusResolver;
    use crate::registry::DatabaseLinkRegistry;
    use crate::testing::{
        MemoryIdentityProvider, MemoryLinkRegistry, RecordingEventSink, StubGateway,
        insert_profile, sqlite_database, wallet,
    };

    struct Fixture {
        gateway: Arc<StubGateway>,
        identity: Arc<MemoryIdentityProvider>,
        registry: Arc<dyn LinkRegistry>,
        events: Arc<RecordingEventSink>,
        service: LinkingService,
        resolver: StatusResolver,
    }

    fn fixture_with(registry: Arc<dyn LinkRegistry>, events: Arc<RecordingEventSink>) -> Fixture {
        let gateway = Arc::new(StubGateway::default());
        let identity = Arc::new(MemoryIdentityProvider::default());
        let service = LinkingService::new(
            gateway.clone(),
            identity.clone(),
            registry.clone(),
            events.clone(),
        );
        let resolver = StatusResolver::new(gateway.clone(), registry.clone(), identity.clone());
        Fixture {
            gateway,
            identity,
            registry,
            events,
            service,
            resolver,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            Arc::new(MemoryLinkRegistry::default()),
            Arc::new(RecordingEventSink::default()),
        )
    }

    #[tokio::test]
    async fn first_link_wins_and_second_is_refused_with_handle() {
        let f = fixture();
        let owner = wallet(0xaaa);
        f.gateway.register(&owner);
        f.identity.add_profile("profile-1", "alice", &owner, true);
        f.identity.add_profile("profile-2", "alt", &owner, false);

        let before = f.resolver.get_user_status(&owner).await.unwrap();
        assert_eq!(before.status, UserStatus::OnChainUnlinked);

        let link = f.service.link_profile(&owner, "profile-1").await.unwrap();
        assert_eq!(link.profile_id, "profile-1");
        assert!(link.is_active);

        let err = f.service.link_profile(&owner, "profile-2").await.unwrap_err();
        match &err {
            PremiumError::WalletAlreadyLinked {
                bound_profile_id,
                bound_handle,
                ..
            } => {
                assert_eq!(bound_profile_id.as_deref(), Some("profile-1"));
                assert_eq!(bound_handle.as_deref(), Some("alice"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("@alice"));

        let after = f.resolver.get_user_status(&owner).await.unwrap();
        assert_eq!(after.status, UserStatus::ProLinked);
        assert_eq!(after.linked_profile.unwrap().profile_id, "profile-1");
    }

    #[tokio::test]
    async fn relinking_the_same_pair_is_still_refused() {
        let f = fixture();
        let owner = wallet(0xaa);
        f.gateway.register(&owner);
        f.identity.add_profile("profile-1", "alice", &owner, true);

        f.service.link_profile(&owner, "profile-1").await.unwrap();
        let err = f.service.link_profile(&owner, "profile-1").await.unwrap_err();
        assert!(matches!(err, PremiumError::WalletAlreadyLinked { .. }));
    }

    #[tokio::test]
    async fn refusal_after_deactivation_still_names_the_bound_handle() {
        let database = sqlite_database().await;
        let f = fixture_with(
            Arc::new(DatabaseLinkRegistry::new(database)),
            Arc::new(RecordingEventSink::default()),
        );
        let owner = wallet(0xaa);
        f.gateway.register(&owner);
        f.identity.add_profile("profile-1", "alice", &owner, true);
        f.identity.add_profile("profile-2", "alt", &owner, false);
        f.service.link_profile(&owner, "profile-1").await.unwrap();
        f.registry.deactivate_link(&owner, Utc::now()).await.unwrap();

        let err = f.service.link_profile(&owner, "profile-2").await.unwrap_err();
        match &err {
            PremiumError::WalletAlreadyLinked {
                bound_profile_id,
                bound_handle,
                ..
            } => {
                assert_eq!(bound_profile_id.as_deref(), Some("profile-1"));
                assert_eq!(bound_handle.as_deref(), Some("alice"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("@alice"));
    }

    #[tokio::test]
    async fn empty_profile_id_from_provider_is_refused() {
        let database = sqlite_database().await;
        let owner = wallet(0xaa);
        insert_profile(&database, "", "ghost", &owner, true, 1_700_000_000).await;
        let gateway = Arc::new(StubGateway::default());
        gateway.register(&owner);
        let registry = Arc::new(DatabaseLinkRegistry::new(database.clone()));
        let service = LinkingService::new(
            gateway,
            Arc::new(DatabaseIdentityProvider::new(database)),
            registry.clone(),
            Arc::new(RecordingEventSink::default()),
        );

        let err = service.auto_link_first_profile(&owner).await.unwrap_err();
        assert!(matches!(err, PremiumError::NotOwner { .. }));
        assert!(registry.find_by_wallet(&owner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn padded_profile_id_is_not_linked() {
        let f = fixture();
        let owner = wallet(0xaa);
        f.gateway.register(&owner);
        f.identity.add_profile("profile-1", "alice", &owner, true);

        let err = f.service.link_profile(&owner, " profile-1 ").await.unwrap_err();
        assert!(matches!(err, PremiumError::NotOwner { .. }));
        assert!(f.events.events().is_empty());
    }

    #[tokio::test]
    async fn non_premium_wallet_cannot_link() {
        let f = fixture();
        let owner = wallet(0xaa);
        f.identity.add_profile("profile-1", "alice", &owner, true);

        let err = f.service.link_profile(&owner, "profile-1").await.unwrap_err();
        assert!(matches!(err, PremiumError::NotPremium(_)));
        assert!(f.registry.find_active_by_wallet(&owner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn chain_outage_is_not_mistaken_for_not_premium() {
        let f = fixture();
        let owner = wallet(0xaa);
        f.gateway.fail(&owner);
        f.identity.add_profile("profile-1", "alice", &owner, true);

        let err = f.service.link_profile(&owner, "profile-1").await.unwrap_err();
        assert!(matches!(err, PremiumError::ChainUnavailable(_)));
    }

    #[tokio::test]
    async fn foreign_profile_is_rejected() {
        let f = fixture();
        let owner = wallet(0xaa);
        f.gateway.register(&owner);
        f.identity.add_profile("profile-9", "bob", &wallet(0xbb), true);

        let err = f.service.link_profile(&owner, "profile-9").await.unwrap_err();
        assert!(matches!(err, PremiumError::NotOwner { .. }));
    }

    #[tokio::test]
    async fn ownership_check_fails_closed_on_provider_error() {
        let f = fixture();
        let owner = wallet(0xaa);
        f.gateway.register(&owner);
        f.identity.add_profile("profile-1", "alice", &owner, true);
        f.identity.set_unavailable(true);

        let err = f.service.link_profile(&owner, "profile-1").await.unwrap_err();
        assert!(matches!(err, PremiumError::IdentityProvider(_)));
        assert!(f.registry.find_active_by_wallet(&owner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn profile_already_bound_elsewhere_is_refused() {
        let f = fixture();
        let first = wallet(0xaa);
        let second = wallet(0xbb);
        f.gateway.register(&first);
        f.gateway.register(&second);
        f.identity.add_profile("profile-1", "alice", &first, true);
        f.service.link_profile(&first, "profile-1").await.unwrap();

        // The profile later moves to another premium wallet.
        f.identity.transfer("profile-1", &second);
        let err = f.service.link_profile(&second, "profile-1").await.unwrap_err();
        assert!(matches!(err, PremiumError::ProfileAlreadyLinked { .. }));
    }

    #[tokio::test]
    async fn link_emits_linked_then_status_changed() {
        let f = fixture();
        let owner = wallet(0xaa);
        f.gateway.register(&owner);
        f.identity.add_profile("profile-1", "alice", &owner, true);
        f.service.link_profile(&owner, "profile-1").await.unwrap();

        let events = f.events.events();
        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            [EventType::ProfileLinked, EventType::PremiumStatusChanged]
        );
        assert_eq!(events[0].payload["profile_id"], "profile-1");
        assert_eq!(events[1].payload["to"], "pro_linked");
        assert!(events.iter().all(|e| e.wallet_address == owner));
    }

    #[tokio::test]
    async fn event_failures_do_not_undo_the_link() {
        let f = fixture_with(
            Arc::new(MemoryLinkRegistry::default()),
            Arc::new(RecordingEventSink::rejecting()),
        );
        let owner = wallet(0xaa);
        f.gateway.register(&owner);
        f.identity.add_profile("profile-1", "alice", &owner, true);

        f.service.link_profile(&owner, "profile-1").await.unwrap();
        assert!(f.events.events().is_empty());
        assert!(f.registry.find_active_by_wallet(&owner).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn auto_link_takes_the_providers_first_profile() {
        let f = fixture();
        let owner = wallet(0xaa);
        f.gateway.register(&owner);
        // Provider order, not alphabetical or default-first.
        f.identity.add_profile("profile-z", "zed", &owner, false);
        f.identity.add_profile("profile-a", "amy", &owner, true);

        let link = f.service.auto_link_first_profile(&owner).await.unwrap().unwrap();
        assert_eq!(link.profile_id, "profile-z");
        assert_eq!(f.events.events()[0].event_type, EventType::ProfileAutoLinked);

        let err = f.service.auto_link_first_profile(&owner).await.unwrap_err();
        assert!(matches!(err, PremiumError::WalletAlreadyLinked { .. }));
    }

    #[tokio::test]
    async fn auto_link_without_profiles_is_none() {
        let f = fixture();
        let owner = wallet(0xaa);
        f.gateway.register(&owner);
        assert!(f.service.auto_link_first_profile(&owner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unlink_is_permanently_disabled() {
        let f = fixture();
        let owner = wallet(0xaa);
        f.gateway.register(&owner);
        f.identity.add_profile("profile-1", "alice", &owner, true);
        f.service.link_profile(&owner, "profile-1").await.unwrap();

        let err = f.service.unlink_profile(&owner).await.unwrap_err();
        assert!(matches!(err, PremiumError::OperationNotAllowed));
        assert!(f.resolver.is_profile_premium(&owner, "profile-1").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_links_for_one_wallet_have_one_winner() {
        let f = fixture();
        let owner = wallet(0xbbb);
        f.gateway.register(&owner);
        f.identity.add_profile("profile-x", "x", &owner, true);
        f.identity.add_profile("profile-y", "y", &owner, false);

        let (x, y) = tokio::join!(
            f.service.link_profile(&owner, "profile-x"),
            f.service.link_profile(&owner, "profile-y"),
        );
        let outcomes = [x, y];
        let winners = outcomes.iter().filter(|r| r.is_ok()).count();
        let refused = outcomes
            .iter()
            .filter(|r| matches!(r, Err(PremiumError::WalletAlreadyLinked { .. })))
            .count();
        assert_eq!((winners, refused), (1, 1));
    }

    #[tokio::test]
    async fn concurrent_links_across_tasks_hold_against_the_database() {
        let database = sqlite_database().await;
        let f = fixture_with(
            Arc::new(DatabaseLinkRegistry::new(database)),
            Arc::new(RecordingEventSink::default()),
        );
        let owner = wallet(0xbbb);
        f.gateway.register(&owner);
        f.identity.add_profile("profile-x", "x", &owner, true);
        f.identity.add_profile("profile-y", "y", &owner, false);

        let first = {
            let service = f.service.clone();
            let owner = owner.clone();
            tokio::spawn(async move { service.link_profile(&owner, "profile-x").await })
        };
        let second = {
            let service = f.service.clone();
            let owner = owner.clone();
            tokio::spawn(async move { service.link_profile(&owner, "profile-y").await })
        };
        let outcomes = [first.await.unwrap(), second.await.unwrap()];

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(PremiumError::WalletAlreadyLinked { .. })))
                .count(),
            1
        );
        let bound = f.registry.find_active_by_wallet(&owner).await.unwrap().unwrap();
        let winner = outcomes.iter().find_map(|r| r.as_ref().ok()).unwrap();
        assert_eq!(bound.profile_id, winner.profile_id);
    }
}
