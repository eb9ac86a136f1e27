//! Organizer-facing event management.
//!
//! Guards that depend on sold tickets (capacity changes, deletion) run
//! under the same event lock as checkout, so a sale cannot slip in between
//! the count and the write.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::models::{Event, EventDraft, EventId, EventView};
use crate::store::{Store, StoreError, StoreTx};
use crate::validity;

const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 500;
const LOCATION_MAX: usize = 200;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Invalid(String),

    #[error("Event not found")]
    NotFound,

    #[error("Initial date cannot be in the past")]
    StartsInPast,

    #[error("Final date must be after initial date")]
    InvalidSchedule,

    #[error("Event has already finished")]
    AlreadyFinished,

    #[error("New max tickets ({requested}) is less than the {sold} tickets already sold")]
    CapacityBelowSold { requested: i32, sold: i64 },

    #[error("Cannot delete event because it has tickets sold")]
    HasTickets,

    #[error("storage failure")]
    Storage(#[from] StoreError),
}

pub struct EventCatalog {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl EventCatalog {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn create(&self, draft: EventDraft) -> Result<Event, CatalogError> {
        let draft = self.validate(draft)?;
        let event = self.store.insert_event(&draft).await?;
        info!(event_id = event.id, capacity = event.capacity, "Event created");
        Ok(event)
    }

    pub async fn find(&self, id: EventId) -> Result<EventView, CatalogError> {
        let event = self
            .store
            .find_event(id)
            .await?
            .ok_or(CatalogError::NotFound)?;
        let sold = self.store.count_tickets(id).await?;
        Ok(EventView::new(event, sold))
    }

    /// Upcoming events by start date; `with_expired` also includes events
    /// that have already started.
    pub async fn list(&self, with_expired: bool) -> Result<Vec<Event>, CatalogError> {
        let starting_from = if with_expired {
            None
        } else {
            Some(self.clock.now())
        };
        Ok(self.store.list_events(starting_from).await?)
    }

    pub async fn update(&self, id: EventId, draft: EventDraft) -> Result<Event, CatalogError> {
        let now = self.clock.now();
        if draft.final_date <= now {
            return Err(CatalogError::AlreadyFinished);
        }
        let draft = self.validate(draft)?;

        let mut tx = self.store.begin().await?;
        let result = replace_event(tx.as_mut(), id, &draft, now).await;
        let event = finish(tx, result).await?;
        info!(event_id = id, capacity = event.capacity, "Event updated");
        Ok(event)
    }

    pub async fn delete(&self, id: EventId) -> Result<(), CatalogError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let result = remove_event(tx.as_mut(), id, now).await;
        finish(tx, result).await?;
        info!(event_id = id, "Event deleted");
        Ok(())
    }

    fn validate(&self, draft: EventDraft) -> Result<EventDraft, CatalogError> {
        let draft = EventDraft {
            name: required_text(&draft.name, "Name", NAME_MAX)?,
            description: required_text(&draft.description, "Description", DESCRIPTION_MAX)?,
            location: required_text(&draft.location, "Location", LOCATION_MAX)?,
            ..draft
        };
        if draft.capacity <= 0 {
            return Err(CatalogError::Invalid(
                "Max tickets must be a positive number".to_string(),
            ));
        }
        if draft.ticket_price.is_sign_negative() {
            return Err(CatalogError::Invalid(
                "Ticket price cannot be negative".to_string(),
            ));
        }
        if draft.initial_date < self.clock.now() {
            return Err(CatalogError::StartsInPast);
        }
        if draft.final_date <= draft.initial_date {
            return Err(CatalogError::InvalidSchedule);
        }
        Ok(draft)
    }
}

async fn replace_event(
    tx: &mut dyn StoreTx,
    id: EventId,
    draft: &EventDraft,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Event, CatalogError> {
    let current = tx.lock_event(id).await?.ok_or(CatalogError::NotFound)?;
    if validity::has_finished(&current, now) {
        return Err(CatalogError::AlreadyFinished);
    }
    let sold = tx.count_tickets(id).await?;
    if i64::from(draft.capacity) < sold {
        return Err(CatalogError::CapacityBelowSold {
            requested: draft.capacity,
            sold,
        });
    }
    Ok(tx.update_event(id, draft).await?)
}

async fn remove_event(
    tx: &mut dyn StoreTx,
    id: EventId,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<(), CatalogError> {
    let current = tx.lock_event(id).await?.ok_or(CatalogError::NotFound)?;
    if validity::has_finished(&current, now) {
        return Err(CatalogError::AlreadyFinished);
    }
    if tx.count_tickets(id).await? > 0 {
        return Err(CatalogError::HasTickets);
    }
    Ok(tx.delete_event(id).await?)
}

async fn finish<T>(
    tx: Box<dyn StoreTx>,
    result: Result<T, CatalogError>,
) -> Result<T, CatalogError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = ?rollback_err, "Rollback of event change failed");
            }
            Err(err)
        }
    }
}

fn required_text(value: &str, field: &str, max: usize) -> Result<String, CatalogError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::Invalid(format!("{field} is required")));
    }
    if trimmed.chars().count() > max {
        return Err(CatalogError::Invalid(format!(
            "{field} must be at most {max} characters long"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::{AllocationEngine, AllocationRequest, PaymentMethod};
    use crate::store::MemoryStore;
    use crate::test_support::{
        finished_draft, fixed_clock, now, running_draft, seeded_store, upcoming_draft,
    };
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn catalog(store: &MemoryStore) -> EventCatalog {
        EventCatalog::new(Arc::new(store.clone()), fixed_clock())
    }

    async fn sell(store: &MemoryStore, event_id: EventId, customer_id: i32, quantity: u32) {
        AllocationEngine::new(Arc::new(store.clone()), fixed_clock())
            .allocate(&AllocationRequest {
                event_id,
                customer_id,
                quantity,
                payment_method: PaymentMethod::DebitCard,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_trims_and_stores() {
        let store = MemoryStore::new();
        let draft = EventDraft {
            name: "  Brinfu  ".to_string(),
            ..upcoming_draft(200)
        };

        let event = catalog(&store).create(draft).await.unwrap();

        assert_eq!(event.name, "Brinfu");
        assert_eq!(store.find_event(event.id).await.unwrap(), Some(event));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_fields() {
        let store = MemoryStore::new();
        let catalog = catalog(&store);

        let blank = EventDraft {
            location: "   ".to_string(),
            ..upcoming_draft(10)
        };
        let err = catalog.create(blank).await.unwrap_err();
        assert_eq!(err.to_string(), "Location is required");

        let long = EventDraft {
            name: "x".repeat(NAME_MAX + 1),
            ..upcoming_draft(10)
        };
        assert!(matches!(catalog.create(long).await, Err(CatalogError::Invalid(_))));

        assert!(matches!(
            catalog.create(upcoming_draft(0)).await,
            Err(CatalogError::Invalid(_))
        ));

        let negative = EventDraft {
            ticket_price: Decimal::new(-1, 0),
            ..upcoming_draft(10)
        };
        assert!(matches!(catalog.create(negative).await, Err(CatalogError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_create_checks_schedule() {
        let store = MemoryStore::new();
        let catalog = catalog(&store);

        assert!(matches!(
            catalog.create(running_draft(10)).await,
            Err(CatalogError::StartsInPast)
        ));

        let draft = upcoming_draft(10);
        let inverted = EventDraft {
            final_date: draft.initial_date - Duration::hours(1),
            ..draft.clone()
        };
        assert!(matches!(
            catalog.create(inverted).await,
            Err(CatalogError::InvalidSchedule)
        ));

        let zero_length = EventDraft {
            final_date: draft.initial_date,
            ..draft
        };
        assert!(matches!(
            catalog.create(zero_length).await,
            Err(CatalogError::InvalidSchedule)
        ));
    }

    #[tokio::test]
    async fn test_find_reports_advisory_availability() {
        let (store, customer, event) = seeded_store(&upcoming_draft(5)).await;
        sell(&store, event.id, customer.id, 2).await;

        let view = catalog(&store).find(event.id).await.unwrap();

        assert_eq!(view.tickets_sold, 2);
        assert_eq!(view.tickets_available, 3);
        assert!(matches!(
            catalog(&store).find(404).await,
            Err(CatalogError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_hides_started_events_by_default() {
        let store = MemoryStore::new();
        let running = store.insert_event(&running_draft(5)).await.unwrap();
        let upcoming = store.insert_event(&upcoming_draft(5)).await.unwrap();
        let catalog = catalog(&store);

        assert_eq!(catalog.list(false).await.unwrap(), vec![upcoming.clone()]);
        assert_eq!(catalog.list(true).await.unwrap(), vec![running, upcoming]);
    }

    #[tokio::test]
    async fn test_update_cannot_drop_capacity_below_sold() {
        let (store, customer, event) = seeded_store(&upcoming_draft(5)).await;
        sell(&store, event.id, customer.id, 3).await;
        let catalog = catalog(&store);

        let err = catalog
            .update(event.id, upcoming_draft(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::CapacityBelowSold {
                requested: 2,
                sold: 3
            }
        ));
        assert_eq!(store.find_event(event.id).await.unwrap(), Some(event.clone()));

        let updated = catalog.update(event.id, upcoming_draft(3)).await.unwrap();
        assert_eq!(updated.capacity, 3);
        assert_eq!(store.find_event(event.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_update_guards() {
        let store = MemoryStore::new();
        let finished = store.insert_event(&finished_draft(5)).await.unwrap();
        let catalog = catalog(&store);

        assert!(matches!(
            catalog.update(finished.id, upcoming_draft(5)).await,
            Err(CatalogError::AlreadyFinished)
        ));

        let already_over = EventDraft {
            initial_date: now() - Duration::days(2),
            final_date: now() - Duration::days(1),
            ..upcoming_draft(5)
        };
        assert!(matches!(
            catalog.update(finished.id, already_over).await,
            Err(CatalogError::AlreadyFinished)
        ));

        assert!(matches!(
            catalog.update(999, upcoming_draft(5)).await,
            Err(CatalogError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_guards() {
        let (store, customer, sold_out) = seeded_store(&upcoming_draft(5)).await;
        sell(&store, sold_out.id, customer.id, 1).await;
        let finished = store.insert_event(&finished_draft(5)).await.unwrap();
        let empty = store.insert_event(&upcoming_draft(5)).await.unwrap();
        let catalog = catalog(&store);

        assert!(matches!(
            catalog.delete(sold_out.id).await,
            Err(CatalogError::HasTickets)
        ));
        assert!(matches!(
            catalog.delete(finished.id).await,
            Err(CatalogError::AlreadyFinished)
        ));
        assert!(matches!(catalog.delete(999).await, Err(CatalogError::NotFound)));

        catalog.delete(empty.id).await.unwrap();
        assert_eq!(store.find_event(empty.id).await.unwrap(), None);
        assert!(store.find_event(sold_out.id).await.unwrap().is_some());
    }
}
