use std::sync::Arc;
use std::time::{Duration, Instant};

use sea_orm::DatabaseConnection;

use crate::chain::ChainGateway;
use crate::config::ReferralConfig;
use crate::events::EventSink;
use crate::identity::CachedIdentityProvider;
use crate::premium::{LinkingService, StatusResolver};
use crate::referral::ReferralTreeBuilder;
use crate::registry::LinkRegistry;

#[derive(Clone)]
pub struct AppState {
    pub database: DatabaseConnection,
    pub gateway: Arc<dyn ChainGateway>,
    pub status: StatusResolver,
    pub linking: LinkingService,
    pub referral: ReferralTreeBuilder,
    pub profiles: Arc<CachedIdentityProvider>,
    pub rpc_timeout: Duration,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        database: DatabaseConnection,
        gateway: Arc<dyn ChainGateway>,
        registry: Arc<dyn LinkRegistry>,
        profiles: Arc<CachedIdentityProvider>,
        events: Arc<dyn EventSink>,
        referral: &ReferralConfig,
        rpc_timeout: Duration,
    ) -> Self {
        assert!(
            rpc_timeout >= Duration::from_millis(100),
            "RPC timeout must be configured"
        );

        let status = StatusResolver::new(gateway.clone(), registry.clone(), profiles.clone());
        let linking = LinkingService::new(gateway.clone(), profiles.clone(), registry, events);
        let referral = ReferralTreeBuilder::new(gateway.clone(), referral);

        Self {
            database,
            gateway,
            status,
            linking,
            referral,
            profiles,
            rpc_timeout,
            start_time: Instant::now(),
        }
    }
}
