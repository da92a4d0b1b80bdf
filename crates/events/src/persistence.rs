//! Durable event persistence service.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes every received [`PlatformEvent`] to `pipeline_events`. It runs
//! as a long-lived background task.

use std::sync::Arc;

use leadflow_db::{PipelineStore, StoreError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::PlatformEvent;

/// Background service that persists pipeline events.
pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop.
    ///
    /// Exits when `cancel` fires or the bus is dropped. A failed write is
    /// logged and the loop keeps going.
    pub async fn run(
        store: Arc<dyn PipelineStore>,
        mut receiver: broadcast::Receiver<PlatformEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Event persistence stopping");
                    break;
                }
                received = receiver.recv() => received,
            };

            match received {
                Ok(event) => {
                    if let Err(e) = Self::persist(store.as_ref(), &event).await {
                        tracing::error!(
                            error = %e,
                            kind = %event.kind,
                            "Failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    async fn persist(store: &dyn PipelineStore, event: &PlatformEvent) -> Result<(), StoreError> {
        let row = store.record_event(&event.to_record()).await?;
        tracing::debug!(event_id = row.id, event_type = %row.event_type, "Event persisted");
        Ok(())
    }
}
