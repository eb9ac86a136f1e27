use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::customer::CustomerId;
use super::event::{Event, EventId};

pub type TicketId = i32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub event_id: EventId,
    pub customer_id: CustomerId,
    pub code: String,
    /// Reserved for marking tickets whose payment was declined.
    pub was_recused: bool,
}

/// A ticket row about to be appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub event_id: EventId,
    pub customer_id: CustomerId,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomerTicket {
    #[sqlx(rename = "ticket_id")]
    pub id: TicketId,
    #[sqlx(rename = "ticket_event_id")]
    pub event_id: EventId,
    pub code: String,
    #[sqlx(flatten)]
    pub event: Event,
}
