use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type EventId = i32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub description: String,
    pub location: String,
    pub initial_date: DateTime<Utc>,
    pub final_date: DateTime<Utc>,
    /// Upper bound on tickets this event may ever issue.
    #[serde(rename = "maxTickets")]
    pub capacity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub ticket_price: Decimal,
}

/// Organizer-supplied fields for creating or replacing an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub name: String,
    pub description: String,
    pub location: String,
    pub initial_date: DateTime<Utc>,
    pub final_date: DateTime<Utc>,
    #[serde(rename = "maxTickets")]
    pub capacity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub ticket_price: Decimal,
}

impl Event {
    pub fn from_draft(id: EventId, draft: &EventDraft) -> Self {
        Self {
            id,
            name: draft.name.clone(),
            description: draft.description.clone(),
            location: draft.location.clone(),
            initial_date: draft.initial_date,
            final_date: draft.final_date,
            capacity: draft.capacity,
            ticket_price: draft.ticket_price,
        }
    }
}

/// An event with its advisory sales figures. The counts are read without
/// the event lock and may lag behind in-flight checkouts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub tickets_sold: i64,
    pub tickets_available: i64,
}

impl EventView {
    pub fn new(event: Event, tickets_sold: i64) -> Self {
        let tickets_available = (i64::from(event.capacity) - tickets_sold).max(0);
        Self {
            event,
            tickets_sold,
            tickets_available,
        }
    }
}
