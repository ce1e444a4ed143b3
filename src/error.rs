use crate::address::WalletAddress;
use crate::chain::ChainError;
use crate::identity::IdentityError;
use crate::registry::RegistryError;

/// Outcome kinds of the premium status, linking and tree operations.
///
/// `WalletAlreadyLinked` and `ProfileAlreadyLinked` are the designed
/// terminal states of the exclusivity rule, not failures of the service;
/// their messages are shown to users as-is.
#[derive(Debug, thiserror::Error)]
pub enum PremiumError {
    #[error("membership chain is unavailable, try again later: {0}")]
    ChainUnavailable(#[from] ChainError),
    #[error("wallet {0} is not registered on-chain")]
    NotPremium(WalletAddress),
    #[error("profile {profile_id} is not owned by wallet {wallet}")]
    NotOwner {
        wallet: WalletAddress,
        profile_id: String,
    },
    #[error("{}", already_linked_message(.bound_profile_id, .bound_handle.as_deref()))]
    WalletAlreadyLinked {
        wallet: WalletAddress,
        bound_profile_id: Option<String>,
        bound_handle: Option<String>,
    },
    #[error("profile {profile_id} is already linked to another premium wallet")]
    ProfileAlreadyLinked { profile_id: String },
    #[error("premium links are permanent and cannot be removed")]
    OperationNotAllowed,
    #[error("identity provider failed: {0}")]
    IdentityProvider(#[from] IdentityError),
    #[error("link registry failed: {0}")]
    Storage(sea_orm::DbErr),
}

impl From<RegistryError> for PremiumError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::WalletTaken { wallet, existing } => PremiumError::WalletAlreadyLinked {
                wallet,
                bound_profile_id: existing.map(|link| link.profile_id),
                bound_handle: None,
            },
            RegistryError::ProfileTaken { profile_id } => {
                PremiumError::ProfileAlreadyLinked { profile_id }
            }
            RegistryError::NotFound(wallet) => PremiumError::Storage(sea_orm::DbErr::RecordNotFound(
                format!("no active premium link for {wallet}"),
            )),
            RegistryError::Storage(err) => PremiumError::Storage(err),
        }
    }
}

/// User-facing sentence for a wallet whose premium status is already spent.
pub fn already_linked_message(profile_id: &Option<String>, handle: Option<&str>) -> String {
    match (handle, profile_id) {
        (Some(handle), _) => format!(
            "This wallet's premium status is permanently linked to @{handle}. Premium can only be linked to one profile."
        ),
        (None, Some(profile_id)) => format!(
            "This wallet's premium status is permanently linked to profile {profile_id}. Premium can only be linked to one profile."
        ),
        (None, None) => "This wallet's premium status is already permanently linked to another profile.".to_string(),
    }
}
