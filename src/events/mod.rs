//! Premium lifecycle events.
//!
//! Producers hand events to an [`EventSink`] and move on. Delivery is
//! best-effort: an event is dropped, and logged, when the channel is full
//! or closed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::address::WalletAddress;

mod dispatcher;

pub use dispatcher::EventDispatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventType {
    #[serde(rename = "profile.linked")]
    ProfileLinked,
    #[serde(rename = "profile.auto-linked")]
    ProfileAutoLinked,
    #[serde(rename = "premium.status.changed")]
    PremiumStatusChanged,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ProfileLinked => "profile.linked",
            EventType::ProfileAutoLinked => "profile.auto-linked",
            EventType::PremiumStatusChanged => "premium.status.changed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PremiumEvent {
    pub event_type: EventType,
    pub wallet_address: WalletAddress,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl PremiumEvent {
    pub fn new(event_type: EventType, wallet_address: WalletAddress, payload: Value) -> Self {
        Self {
            event_type,
            wallet_address,
            payload,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event channel is full, dropped {0}")]
    Full(EventType),
    #[error("event channel is closed, dropped {0}")]
    Closed(EventType),
}

pub trait EventSink: Send + Sync {
    /// Never blocks. Failures are for the caller to log; they must not undo
    /// whatever produced the event.
    fn emit(&self, event: PremiumEvent) -> Result<(), EventError>;
}

#[derive(Clone)]
pub struct ChannelEventSink {
    sender: mpsc::Sender<PremiumEvent>,
}

impl ChannelEventSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PremiumEvent>) {
        assert!(capacity > 0, "Event channel capacity must be positive");
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: PremiumEvent) -> Result<(), EventError> {
        self.sender.try_send(event).map_err(|err| match err {
            TrySendError::Full(event) => EventError::Full(event.event_type),
            TrySendError::Closed(event) => EventError::Closed(event.event_type),
        })
    }
}
