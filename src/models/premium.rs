use serde::{Deserialize, Serialize};

use crate::premium::{LinkedProfile, UserStatus, UserStatusReport};
use crate::registry::PremiumLink;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStatusView {
    pub wallet_address: String,
    pub status: UserStatus,
    pub linked_profile: Option<LinkedProfileView>,
}

impl UserStatusView {
    pub fn new(wallet_address: String, report: UserStatusReport) -> Self {
        Self {
            wallet_address,
            status: report.status,
            linked_profile: report.linked_profile.map(LinkedProfileView::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedProfileView {
    pub profile_id: String,
    pub handle: Option<String>,
    pub linked_at: i64,
}

impl From<LinkedProfile> for LinkedProfileView {
    fn from(linked: LinkedProfile) -> Self {
        Self {
            profile_id: linked.profile_id,
            handle: linked.handle,
            linked_at: linked.linked_at.timestamp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePremiumView {
    pub wallet_address: String,
    pub profile_id: String,
    pub is_premium: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionView {
    pub wallet_address: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumLinkView {
    pub wallet_address: String,
    pub profile_id: String,
    pub linked_at: i64,
    pub is_active: bool,
}

impl From<&PremiumLink> for PremiumLinkView {
    fn from(link: &PremiumLink) -> Self {
        Self {
            wallet_address: link.wallet_address.to_string(),
            profile_id: link.profile_id.clone(),
            linked_at: link.linked_at.timestamp(),
            is_active: link.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoLinkView {
    pub wallet_address: String,
    /// `None` when the wallet owns no profile to link.
    pub link: Option<PremiumLinkView>,
}
