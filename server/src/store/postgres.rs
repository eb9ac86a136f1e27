use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use super::{Store, StoreError, StoreTx};
use crate::models::{CustomerId, CustomerTicket, Event, EventDraft, EventId, NewTicket, Ticket};

const EVENT_COLUMNS: &str =
    "id, name, description, location, initial_date, final_date, capacity, ticket_price";
const TICKET_COLUMNS: &str = "id, event_id, customer_id, code, was_recused";

/// Postgres-backed store. Units run under READ COMMITTED; the event row
/// lock taken by `SELECT ... FOR UPDATE` is what serializes checkouts.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Scoped to this transaction; a blocked lock raises 55P03.
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgTx { tx }))
    }

    async fn insert_event(&self, draft: &EventDraft) -> Result<Event, StoreError> {
        let sql = format!(
            "INSERT INTO event (name, description, location, initial_date, final_date, capacity, ticket_price) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {EVENT_COLUMNS}"
        );
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(&draft.name)
            .bind(&draft.description)
            .bind(&draft.location)
            .bind(draft.initial_date)
            .bind(draft.final_date)
            .bind(draft.capacity)
            .bind(draft.ticket_price)
            .fetch_one(&self.pool)
            .await?;
        Ok(event)
    }

    async fn find_event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM event WHERE id = $1");
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn list_events(
        &self,
        starting_from: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, StoreError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM event \
             WHERE $1::timestamptz IS NULL OR initial_date >= $1 \
             ORDER BY initial_date ASC, id ASC"
        );
        let events = sqlx::query_as::<_, Event>(&sql)
            .bind(starting_from)
            .fetch_all(&self.pool)
            .await?;
        Ok(events)
    }

    async fn count_tickets(&self, event_id: EventId) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ticket WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn tickets_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<CustomerTicket>, StoreError> {
        let tickets = sqlx::query_as::<_, CustomerTicket>(
            "SELECT t.id AS ticket_id, t.event_id AS ticket_event_id, t.code, \
                    e.id, e.name, e.description, e.location, e.initial_date, e.final_date, \
                    e.capacity, e.ticket_price \
             FROM ticket t \
             JOIN event e ON e.id = t.event_id \
             WHERE t.customer_id = $1 \
             ORDER BY t.id ASC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_event(&mut self, id: EventId) -> Result<Option<Event>, StoreError> {
        // Locking the event row (not the ticket rows) also covers events
        // with no tickets yet.
        let sql = format!("SELECT {EVENT_COLUMNS} FROM event WHERE id = $1 FOR UPDATE");
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(event)
    }

    async fn count_tickets(&mut self, event_id: EventId) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ticket WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn insert_tickets(&mut self, tickets: &[NewTicket]) -> Result<Vec<Ticket>, StoreError> {
        if tickets.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ticket (event_id, customer_id, code) ");
        builder.push_values(tickets, |mut row, ticket| {
            row.push_bind(ticket.event_id)
                .push_bind(ticket.customer_id)
                .push_bind(ticket.code.clone());
        });
        builder.push(format!(" RETURNING {TICKET_COLUMNS}"));

        let inserted = builder
            .build_query_as::<Ticket>()
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(inserted)
    }

    async fn update_event(
        &mut self,
        id: EventId,
        draft: &EventDraft,
    ) -> Result<Event, StoreError> {
        let sql = format!(
            "UPDATE event SET name = $2, description = $3, location = $4, initial_date = $5, \
             final_date = $6, capacity = $7, ticket_price = $8 \
             WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        );
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .bind(&draft.name)
            .bind(&draft.description)
            .bind(&draft.location)
            .bind(draft.initial_date)
            .bind(draft.final_date)
            .bind(draft.capacity)
            .bind(draft.ticket_price)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(event)
    }

    async fn delete_event(&mut self, id: EventId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM event WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
