use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, SqlErr, TransactionTrait,
};
use tracing::{info, warn};

use super::{LinkRegistry, PremiumLink, RegistryError};
use crate::address::WalletAddress;
use crate::entities::premium_link;

#[derive(Clone)]
pub struct DatabaseLinkRegistry {
    database: DatabaseConnection,
}

impl DatabaseLinkRegistry {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

#[async_trait]
impl LinkRegistry for DatabaseLinkRegistry {
    async fn find_active_by_wallet(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Option<PremiumLink>, RegistryError> {
        let model = premium_link::Entity::find_by_id(wallet.as_str().to_string())
            .filter(premium_link::Column::IsActive.eq(true))
            .one(&self.database)
            .await?;
        model.map(into_link).transpose()
    }

    async fn find_by_wallet(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Option<PremiumLink>, RegistryError> {
        let model = premium_link::Entity::find_by_id(wallet.as_str().to_string())
            .one(&self.database)
            .await?;
        model.map(into_link).transpose()
    }

    async fn find_active_by_profile(
        &self,
        profile_id: &str,
    ) -> Result<Option<PremiumLink>, RegistryError> {
        let model = premium_link::Entity::find()
            .filter(premium_link::Column::ProfileId.eq(profile_id))
            .filter(premium_link::Column::IsActive.eq(true))
            .one(&self.database)
            .await?;
        model.map(into_link).transpose()
    }

    async fn create_link(
        &self,
        wallet: &WalletAddress,
        profile_id: &str,
        linked_at: DateTime<Utc>,
    ) -> Result<PremiumLink, RegistryError> {
        assert!(!profile_id.is_empty(), "Profile id cannot be empty");

        let txn = self.database.begin().await?;

        let existing_wallet = premium_link::Entity::find_by_id(wallet.as_str().to_string())
            .filter(premium_link::Column::IsActive.eq(true))
            .one(&txn)
            .await?;
        if let Some(existing) = existing_wallet {
            txn.rollback().await?;
            return Err(RegistryError::WalletTaken {
                wallet: wallet.clone(),
                existing: Some(into_link(existing)?),
            });
        }

        let existing_profile = premium_link::Entity::find()
            .filter(premium_link::Column::ProfileId.eq(profile_id))
            .filter(premium_link::Column::IsActive.eq(true))
            .one(&txn)
            .await?;
        if existing_profile.is_some() {
            txn.rollback().await?;
            return Err(RegistryError::ProfileTaken {
                profile_id: profile_id.to_string(),
            });
        }

        let model = premium_link::ActiveModel {
            wallet_address: Set(wallet.as_str().to_string()),
            profile_id: Set(profile_id.to_string()),
            linked_at: Set(to_fixed_offset(linked_at)),
            is_active: Set(true),
            deactivated_at: Set(None),
        };

        let inserted = match model.insert(&txn).await {
            Ok(inserted) => inserted,
            Err(err) => {
                let conflict = classify_conflict(&err, wallet, profile_id);
                // Dropping the transaction rolls it back; an explicit rollback
                // error must not mask the conflict.
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(wallet = %wallet, "Rollback after failed link insert failed: {rollback_err}");
                }
                return Err(conflict.unwrap_or(RegistryError::Storage(err)));
            }
        };

        txn.commit().await?;
        info!(wallet = %wallet, profile_id, "Premium link committed");
        into_link(inserted)
    }

    async fn deactivate_link(
        &self,
        wallet: &WalletAddress,
        at: DateTime<Utc>,
    ) -> Result<PremiumLink, RegistryError> {
        let model = premium_link::Entity::find_by_id(wallet.as_str().to_string())
            .filter(premium_link::Column::IsActive.eq(true))
            .one(&self.database)
            .await?
            .ok_or_else(|| RegistryError::NotFound(wallet.clone()))?;

        let mut active = model.into_active_model();
        active.is_active = Set(false);
        active.deactivated_at = Set(Some(to_fixed_offset(at)));
        let updated = active.update(&self.database).await?;
        warn!(wallet = %wallet, profile_id = %updated.profile_id, "Premium link deactivated");
        into_link(updated)
    }
}

/// Maps a uniqueness violation back onto the half of the exclusivity rule
/// it protects. The profile index is the only constraint naming `profile`;
/// everything else on the table is the wallet key.
fn classify_conflict(err: &DbErr, wallet: &WalletAddress, profile_id: &str) -> Option<RegistryError> {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => {
            if message.contains("profile") {
                Some(RegistryError::ProfileTaken {
                    profile_id: profile_id.to_string(),
                })
            } else {
                Some(RegistryError::WalletTaken {
                    wallet: wallet.clone(),
                    existing: None,
                })
            }
        }
        _ => None,
    }
}

fn into_link(model: premium_link::Model) -> Result<PremiumLink, RegistryError> {
    let wallet_address = WalletAddress::parse(&model.wallet_address).map_err(|err| {
        RegistryError::Storage(DbErr::Type(format!(
            "stored wallet address {} is invalid: {err}",
            model.wallet_address
        )))
    })?;
    Ok(PremiumLink {
        wallet_address,
        profile_id: model.profile_id,
        linked_at: model.linked_at.with_timezone(&Utc),
        is_active: model.is_active,
        deactivated_at: model.deactivated_at.map(|at| at.with_timezone(&Utc)),
    })
}

pub(crate) fn to_fixed_offset(time: DateTime<Utc>) -> DateTime<FixedOffset> {
    time.fixed_offset()
}
