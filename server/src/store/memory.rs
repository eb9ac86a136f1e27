use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::{Store, StoreError, StoreTx};
use crate::models::{
    Customer, CustomerId, CustomerTicket, Event, EventDraft, EventId, NewTicket, Ticket,
};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Tables {
    customers: HashMap<CustomerId, Customer>,
    events: BTreeMap<EventId, Event>,
    tickets: Vec<Ticket>,
    codes: HashSet<String>,
}

struct Shared {
    tables: RwLock<Tables>,
    /// Only events currently locked or waited on have an entry.
    event_locks: StdMutex<HashMap<EventId, Arc<Mutex<()>>>>,
    next_customer_id: AtomicI32,
    next_event_id: AtomicI32,
    next_ticket_id: AtomicI32,
    failing_inserts: AtomicUsize,
    lock_timeout: Duration,
}

/// In-process store with the same isolation contract as [`super::PgStore`]:
/// one async mutex per event stands in for the row lock, writes are
/// buffered in the unit and applied atomically on commit, and ticket codes
/// are unique across the whole ledger.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(Tables::default()),
                event_locks: StdMutex::new(HashMap::new()),
                next_customer_id: AtomicI32::new(1),
                next_event_id: AtomicI32::new(1),
                next_ticket_id: AtomicI32::new(1),
                failing_inserts: AtomicUsize::new(0),
                lock_timeout,
            }),
        }
    }

    pub async fn add_customer(&self, name: &str, email: &str) -> Customer {
        let customer = Customer {
            id: self.shared.next_customer_id.fetch_add(1, Ordering::SeqCst),
            name: name.to_string(),
            email: email.to_string(),
        };
        self.shared
            .tables
            .write()
            .await
            .customers
            .insert(customer.id, customer.clone());
        customer
    }

    /// Makes the next `count` ticket inserts fail as if the connection
    /// dropped mid-write.
    pub fn fail_next_inserts(&self, count: usize) {
        self.shared.failing_inserts.store(count, Ordering::SeqCst);
    }

    /// All committed tickets, in issue order.
    pub async fn tickets(&self) -> Vec<Ticket> {
        self.shared.tables.read().await.tickets.clone()
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.shared
            .event_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A claim on one event's mutex, held while waiting and while locked.
/// Releasing the last claim removes the map entry.
struct EventLock {
    id: EventId,
    shared: Arc<Shared>,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl EventLock {
    fn claim(shared: &Arc<Shared>, id: EventId) -> Self {
        let mut locks = shared
            .event_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let lock = locks.entry(id).or_default().clone();
        Self {
            id,
            shared: Arc::clone(shared),
            lock,
            guard: None,
        }
    }
}

impl Drop for EventLock {
    fn drop(&mut self) {
        let mut locks = self
            .shared
            .event_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.guard.take();
        // One reference in the map, one here: nobody else holds or waits.
        let unused = locks
            .get(&self.id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &self.lock) && Arc::strong_count(entry) == 2);
        if unused {
            locks.remove(&self.id);
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        Ok(Box::new(MemoryTx {
            store: self.clone(),
            held: HashMap::new(),
            writes: Vec::new(),
        }))
    }

    async fn insert_event(&self, draft: &EventDraft) -> Result<Event, StoreError> {
        let id = self.shared.next_event_id.fetch_add(1, Ordering::SeqCst);
        let event = Event::from_draft(id, draft);
        self.shared
            .tables
            .write()
            .await
            .events
            .insert(id, event.clone());
        Ok(event)
    }

    async fn find_event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.shared.tables.read().await.events.get(&id).cloned())
    }

    async fn list_events(
        &self,
        starting_from: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, StoreError> {
        let tables = self.shared.tables.read().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|event| starting_from.map_or(true, |from| event.initial_date >= from))
            .cloned()
            .collect();
        events.sort_by(|a, b| (a.initial_date, a.id).cmp(&(b.initial_date, b.id)));
        Ok(events)
    }

    async fn count_tickets(&self, event_id: EventId) -> Result<i64, StoreError> {
        let tables = self.shared.tables.read().await;
        Ok(count_for(&tables.tickets, event_id))
    }

    async fn tickets_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<CustomerTicket>, StoreError> {
        let tables = self.shared.tables.read().await;
        let tickets = tables
            .tickets
            .iter()
            .filter(|ticket| ticket.customer_id == customer_id)
            .filter_map(|ticket| {
                tables.events.get(&ticket.event_id).map(|event| CustomerTicket {
                    id: ticket.id,
                    event_id: ticket.event_id,
                    code: ticket.code.clone(),
                    event: event.clone(),
                })
            })
            .collect();
        Ok(tickets)
    }
}

enum Write {
    Tickets(Vec<Ticket>),
    UpdateEvent(Event),
    DeleteEvent(EventId),
}

/// A unit of work over [`MemoryStore`]. Dropping it without committing
/// discards its writes and releases its event locks.
pub struct MemoryTx {
    store: MemoryStore,
    held: HashMap<EventId, EventLock>,
    writes: Vec<Write>,
}

impl MemoryTx {
    fn pending_tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.writes
            .iter()
            .filter_map(|write| match write {
                Write::Tickets(tickets) => Some(tickets),
                _ => None,
            })
            .flatten()
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_event(&mut self, id: EventId) -> Result<Option<Event>, StoreError> {
        if !self.held.contains_key(&id) {
            let mut claim = EventLock::claim(&self.store.shared, id);
            let guard = tokio::time::timeout(
                self.store.shared.lock_timeout,
                Arc::clone(&claim.lock).lock_owned(),
            )
            .await
            .map_err(|_| StoreError::LockTimeout)?;
            claim.guard = Some(guard);
            self.held.insert(id, claim);
        }
        Ok(self.store.shared.tables.read().await.events.get(&id).cloned())
    }

    async fn count_tickets(&mut self, event_id: EventId) -> Result<i64, StoreError> {
        let committed = {
            let tables = self.store.shared.tables.read().await;
            count_for(&tables.tickets, event_id)
        };
        let pending = self
            .pending_tickets()
            .filter(|ticket| ticket.event_id == event_id)
            .count();
        Ok(committed + pending as i64)
    }

    async fn insert_tickets(&mut self, tickets: &[NewTicket]) -> Result<Vec<Ticket>, StoreError> {
        let shared = &self.store.shared;
        let injected = shared
            .failing_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("connection reset during insert".to_string()));
        }

        {
            let tables = shared.tables.read().await;
            let mut batch = HashSet::new();
            for ticket in tickets {
                if !tables.customers.contains_key(&ticket.customer_id) {
                    return Err(StoreError::UnknownCustomer);
                }
                let pending_clash = self.pending_tickets().any(|t| t.code == ticket.code);
                if tables.codes.contains(&ticket.code) || pending_clash || !batch.insert(&ticket.code) {
                    return Err(StoreError::CodeCollision);
                }
            }
        }

        let inserted: Vec<Ticket> = tickets
            .iter()
            .map(|ticket| Ticket {
                id: shared.next_ticket_id.fetch_add(1, Ordering::SeqCst),
                event_id: ticket.event_id,
                customer_id: ticket.customer_id,
                code: ticket.code.clone(),
                was_recused: false,
            })
            .collect();
        self.writes.push(Write::Tickets(inserted.clone()));
        Ok(inserted)
    }

    async fn update_event(
        &mut self,
        id: EventId,
        draft: &EventDraft,
    ) -> Result<Event, StoreError> {
        let event = Event::from_draft(id, draft);
        self.writes.push(Write::UpdateEvent(event.clone()));
        Ok(event)
    }

    async fn delete_event(&mut self, id: EventId) -> Result<(), StoreError> {
        self.writes.push(Write::DeleteEvent(id));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx {
            store,
            held,
            writes,
        } = *self;
        let mut tables = store.shared.tables.write().await;

        // A unit on another event may have committed the same code since
        // our insert; the unique constraint still has the last word.
        for write in &writes {
            if let Write::Tickets(tickets) = write {
                if tickets.iter().any(|ticket| tables.codes.contains(&ticket.code)) {
                    return Err(StoreError::CodeCollision);
                }
            }
        }

        for write in writes {
            match write {
                Write::Tickets(tickets) => {
                    for ticket in tickets {
                        tables.codes.insert(ticket.code.clone());
                        tables.tickets.push(ticket);
                    }
                }
                Write::UpdateEvent(event) => {
                    tables.events.insert(event.id, event);
                }
                Write::DeleteEvent(id) => {
                    tables.events.remove(&id);
                }
            }
        }

        drop(tables);
        drop(held);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

fn count_for(tickets: &[Ticket], event_id: EventId) -> i64 {
    tickets
        .iter()
        .filter(|ticket| ticket.event_id == event_id)
        .count() as i64
}
