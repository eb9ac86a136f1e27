//! Persistence ports for the event catalog and the ticket ledger.
//!
//! Every write that depends on the number of issued tickets runs inside a
//! [`StoreTx`] that first calls [`StoreTx::lock_event`]. That call is the
//! only serialization point in the system: two scopes that lock the same
//! event run one after the other, scopes on different events never wait on
//! each other. No coordination state lives in the process, so the guarantee
//! holds across any number of server instances sharing one database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{CustomerId, CustomerTicket, Event, EventDraft, EventId, NewTicket, Ticket};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Constraint guarding ticket code uniqueness.
pub const TICKET_CODE_CONSTRAINT: &str = "ticket_code_key";
/// Foreign key from tickets to customers.
pub const TICKET_CUSTOMER_CONSTRAINT: &str = "ticket_customer_id_fkey";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("timed out waiting for the event lock")]
    LockTimeout,

    #[error("transaction conflict")]
    Conflict,

    #[error("ticket code already issued")]
    CodeCollision,

    #[error("customer does not exist")]
    UnknownCustomer,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the whole unit may be retried from scratch. Only errors that
    /// guarantee nothing was committed qualify.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::LockTimeout | StoreError::Conflict | StoreError::Unavailable(_)
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        classify(&err).unwrap_or(StoreError::Database(err))
    }
}

fn classify(err: &sqlx::Error) -> Option<StoreError> {
    match err {
        sqlx::Error::Database(db) => match (db.code().as_deref(), db.constraint()) {
            (Some("23505"), Some(TICKET_CODE_CONSTRAINT)) => Some(StoreError::CodeCollision),
            (Some("23503"), Some(TICKET_CUSTOMER_CONSTRAINT)) => Some(StoreError::UnknownCustomer),
            (Some("55P03"), _) => Some(StoreError::LockTimeout),
            (Some("40001"), _) | (Some("40P01"), _) => Some(StoreError::Conflict),
            _ => None,
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            Some(StoreError::Unavailable(err.to_string()))
        }
        _ => None,
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Opens an atomic unit. Nothing written through it is visible to
    /// others until [`StoreTx::commit`] succeeds.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    async fn insert_event(&self, draft: &EventDraft) -> Result<Event, StoreError>;

    async fn find_event(&self, id: EventId) -> Result<Option<Event>, StoreError>;

    /// Events ordered by initial date, optionally only those starting at or
    /// after `starting_from`.
    async fn list_events(
        &self,
        starting_from: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, StoreError>;

    /// Unlocked ticket count, for display only.
    async fn count_tickets(&self, event_id: EventId) -> Result<i64, StoreError>;

    async fn tickets_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<CustomerTicket>, StoreError>;
}

#[async_trait]
pub trait StoreTx: Send {
    /// Acquires the exclusive scope for `id` and loads the event. Blocks
    /// while another unit holds the same event, up to the store's lock
    /// timeout. Returns `None` when the event does not exist.
    async fn lock_event(&mut self, id: EventId) -> Result<Option<Event>, StoreError>;

    async fn count_tickets(&mut self, event_id: EventId) -> Result<i64, StoreError>;

    async fn insert_tickets(&mut self, tickets: &[NewTicket]) -> Result<Vec<Ticket>, StoreError>;

    async fn update_event(&mut self, id: EventId, draft: &EventDraft)
        -> Result<Event, StoreError>;

    async fn delete_event(&mut self, id: EventId) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::LockTimeout.is_transient());
        assert!(StoreError::Conflict.is_transient());
        assert!(StoreError::Unavailable("down".to_string()).is_transient());
        assert!(!StoreError::CodeCollision.is_transient());
        assert!(!StoreError::UnknownCustomer.is_transient());
        assert!(!StoreError::Database(sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn test_pool_timeout_maps_to_unavailable() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_other_sqlx_errors_stay_database_errors() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }
}
