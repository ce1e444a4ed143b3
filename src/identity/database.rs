use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

use super::{IdentityError, IdentityProvider, MAX_PROFILES_PER_WALLET, Profile};
use crate::address::WalletAddress;
use crate::entities::profile;

/// Reads the `profiles` projection maintained by the identity side.
#[derive(Clone)]
pub struct DatabaseIdentityProvider {
    database: DatabaseConnection,
}

impl DatabaseIdentityProvider {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

#[async_trait]
impl IdentityProvider for DatabaseIdentityProvider {
    async fn get_profiles_by_wallet(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Vec<Profile>, IdentityError> {
        let models = profile::Entity::find()
            .filter(profile::Column::OwnedBy.eq(wallet.as_str()))
            .order_by_desc(profile::Column::IsDefault)
            .order_by_asc(profile::Column::CreatedAt)
            .order_by_asc(profile::Column::Id)
            .limit(MAX_PROFILES_PER_WALLET as u64)
            .all(&self.database)
            .await?;
        models.into_iter().map(into_profile).collect()
    }

    async fn get_profile_by_id(&self, id: &str) -> Result<Option<Profile>, IdentityError> {
        let model = profile::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?;
        model.map(into_profile).transpose()
    }
}

fn into_profile(model: profile::Model) -> Result<Profile, IdentityError> {
    let owned_by = WalletAddress::parse(&model.owned_by).map_err(|err| IdentityError::Malformed {
        id: model.id.clone(),
        reason: err.to_string(),
    })?;
    Ok(Profile {
        id: model.id,
        handle: model.handle,
        owned_by,
        is_default: model.is_default,
    })
}
