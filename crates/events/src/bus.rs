//! Pipeline change notifications.
//!
//! Handlers publish a [`PlatformEvent`] after every successful write. The
//! [`EventBus`] fans it out to the durable event log and to the KPI
//! snapshot refresher. Delivery is best effort: a subscriber that falls
//! behind by more than the channel capacity sees `Lagged` and must resync.

use std::fmt;

use chrono::{DateTime, Utc};
use leadflow_core::types::DbId;
use leadflow_db::models::event::NewPipelineEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// What happened. The wire name is what lands in `pipeline_events.event_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "lead.created")]
    LeadCreated,
    /// Contact, classification, `ca` or show-up changed; stage did not.
    #[serde(rename = "lead.updated")]
    LeadUpdated,
    #[serde(rename = "lead.stage_changed")]
    LeadStageChanged,
    #[serde(rename = "lead.assigned")]
    LeadAssigned,
    #[serde(rename = "team_member.created")]
    TeamMemberCreated,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::LeadCreated => "lead.created",
            EventKind::LeadUpdated => "lead.updated",
            EventKind::LeadStageChanged => "lead.stage_changed",
            EventKind::LeadAssigned => "lead.assigned",
            EventKind::TeamMemberCreated => "team_member.created",
        }
    }

    /// Whether the lead collection may differ after this event.
    pub const fn touches_leads(self) -> bool {
        !matches!(self, EventKind::TeamMemberCreated)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pipeline change, as published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    pub kind: EventKind,
    pub lead_id: Option<DbId>,
    /// Team member whose request caused the change.
    pub actor_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    /// An event with an empty object payload, stamped now.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            lead_id: None,
            actor_id: None,
            payload: serde_json::json!({}),
            timestamp: Utc::now(),
        }
    }

    pub fn with_lead(self, lead_id: DbId) -> Self {
        Self {
            lead_id: Some(lead_id),
            ..self
        }
    }

    pub fn with_actor(self, actor_id: DbId) -> Self {
        Self {
            actor_id: Some(actor_id),
            ..self
        }
    }

    pub fn with_payload(self, payload: serde_json::Value) -> Self {
        Self { payload, ..self }
    }

    pub fn touches_leads(&self) -> bool {
        self.kind.touches_leads()
    }

    /// Row for `pipeline_events`.
    pub fn to_record(&self) -> NewPipelineEvent {
        NewPipelineEvent {
            event_type: self.kind.as_str().to_string(),
            lead_id: self.lead_id,
            actor_id: self.actor_id,
            payload: self.payload.clone(),
        }
    }
}

/// Broadcast channel capacity. Enough for a bulk import burst.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out hub shared as `Arc<EventBus>`.
///
/// ```rust
/// use leadflow_events::bus::{EventBus, EventKind, PlatformEvent};
///
/// let bus = EventBus::default();
/// let _rx = bus.subscribe();
/// bus.publish(PlatformEvent::new(EventKind::LeadCreated).with_lead(1));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send to every live subscriber. Dropped silently when nobody listens.
    pub fn publish(&self, event: PlatformEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("Pipeline event published with no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
