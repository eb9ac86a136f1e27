//! Fixtures shared by unit tests across modules.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::clock::FixedClock;
use crate::models::{Customer, Event, EventDraft};
use crate::store::{MemoryStore, Store};

/// The instant every test clock is frozen at.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0)
        .single()
        .expect("valid fixed instant")
}

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(now()))
}

/// An event a week after [`now`], lasting two days, priced at 20.00.
pub fn upcoming_draft(capacity: i32) -> EventDraft {
    let start = now() + Duration::days(7);
    EventDraft {
        name: "Brinfu".to_string(),
        description: "Developer conference".to_string(),
        location: "Umuarama - PR".to_string(),
        initial_date: start,
        final_date: start + Duration::days(2),
        capacity,
        ticket_price: Decimal::new(2000, 2),
    }
}

/// An event that started an hour before [`now`] and is still running.
pub fn running_draft(capacity: i32) -> EventDraft {
    let start = now() - Duration::hours(1);
    EventDraft {
        initial_date: start,
        final_date: start + Duration::days(1),
        ..upcoming_draft(capacity)
    }
}

/// An event that ended a day before [`now`].
pub fn finished_draft(capacity: i32) -> EventDraft {
    let start = now() - Duration::days(3);
    EventDraft {
        initial_date: start,
        final_date: start + Duration::days(2),
        ..upcoming_draft(capacity)
    }
}

pub async fn seeded_store(draft: &EventDraft) -> (MemoryStore, Customer, Event) {
    let store = MemoryStore::new();
    let customer = store.add_customer("Pessoa Dev", "pessoa.dev@dev.com").await;
    let event = store.insert_event(draft).await.expect("insert event");
    (store, customer, event)
}
