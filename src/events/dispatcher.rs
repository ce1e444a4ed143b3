use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{ActiveModelTrait, DatabaseConnection};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::PremiumEvent;
use crate::entities::premium_event;

/// Drains the event channel into the `premium_events` outbox table.
pub struct EventDispatcher {
    database: DatabaseConnection,
    receiver: mpsc::Receiver<PremiumEvent>,
}

impl EventDispatcher {
    pub fn new(database: DatabaseConnection, receiver: mpsc::Receiver<PremiumEvent>) -> Self {
        Self { database, receiver }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("Starting premium event dispatcher");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    match changed {
                        Ok(_) => {
                            if *shutdown.borrow() {
                                info!("Event dispatcher shutdown signal received");
                                break;
                            }
                        }
                        Err(_) => {
                            warn!("Shutdown channel closed unexpectedly. Exiting event dispatcher");
                            break;
                        }
                    }
                }
                received = self.receiver.recv() => {
                    match received {
                        Some(event) => self.deliver(event).await,
                        None => {
                            info!("All event producers dropped. Exiting event dispatcher");
                            return Ok(());
                        }
                    }
                }
            }
        }

        // Flush whatever was queued before the signal.
        self.receiver.close();
        let mut flushed = 0usize;
        while let Some(event) = self.receiver.recv().await {
            self.deliver(event).await;
            flushed += 1;
        }
        debug!(flushed, "Event dispatcher drained remaining events");
        Ok(())
    }

    async fn deliver(&self, event: PremiumEvent) {
        let event_type = event.event_type;
        let wallet = event.wallet_address.clone();
        if let Err(err) = self.persist(event).await {
            error!(%event_type, wallet = %wallet, "Failed to record premium event: {err:#}");
        }
    }

    async fn persist(&self, event: PremiumEvent) -> Result<()> {
        let model = premium_event::ActiveModel {
            id: NotSet,
            event_type: Set(event.event_type.as_str().to_string()),
            wallet_address: Set(event.wallet_address.as_str().to_string()),
            payload: Set(event.payload),
            occurred_at: Set(event.timestamp.fixed_offset()),
            recorded_at: Set(Utc::now().fixed_offset()),
        };
        model
            .insert(&self.database)
            .await
            .with_context(|| format!("Failed to insert {} event", event.event_type))?;
        Ok(())
    }
}
