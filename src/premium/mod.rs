//! Premium status resolution and the one-time linking protocol.

use chrono::{DateTime, Utc};
use serde::Serialize;

mod linking;
mod status;

pub use linking::LinkingService;
pub use status::StatusResolver;

/// Derived, never stored. Moves only forward:
/// `Standard -> OnChainUnlinked -> ProLinked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Standard,
    OnChainUnlinked,
    ProLinked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Standard => "standard",
            UserStatus::OnChainUnlinked => "on_chain_unlinked",
            UserStatus::ProLinked => "pro_linked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedProfile {
    pub profile_id: String,
    /// `None` when the identity provider could not resolve the handle.
    pub handle: Option<String>,
    pub linked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStatusReport {
    pub status: UserStatus,
    pub linked_profile: Option<LinkedProfile>,
}
