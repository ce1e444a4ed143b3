pub mod premium_event;
pub mod premium_link;
pub mod profile;
