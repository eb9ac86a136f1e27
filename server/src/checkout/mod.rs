//! Ticket allocation: the only code path that appends to the ticket ledger.
//!
//! An allocation locks the event, re-reads its schedule and capacity,
//! counts the tickets already issued, and either appends exactly the
//! requested number of tickets or changes nothing. All of it happens in one
//! store unit, so concurrent checkouts for the same event see each other's
//! committed tickets and can never oversell.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::models::{CustomerId, EventId, NewTicket, Ticket};
use crate::store::{Store, StoreError, StoreTx};
use crate::validity;

pub mod code;

pub use code::{CodeGenerator, RandomCodeGenerator};

pub const DEFAULT_CODE_ATTEMPTS: u32 = 3;

/// How the customer says they will pay. Recorded with the purchase, never
/// charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Pix,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Pix => "pix",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRequest {
    pub event_id: EventId,
    pub customer_id: CustomerId,
    pub quantity: u32,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub tickets: Vec<Ticket>,
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("Ticket count must be a positive number")]
    InvalidQuantity,

    #[error("Event not found")]
    NotFound,

    #[error("Event has already started")]
    EventAlreadyStarted,

    #[error("Only {available} tickets available for this event")]
    InsufficientAvailability { available: i64 },

    #[error("Customer not found")]
    UnknownCustomer,

    /// Nothing was committed; the whole call may be retried.
    #[error("checkout could not complete, try again")]
    StorageConflict(#[source] StoreError),

    #[error("could not mint unique ticket codes after {attempts} attempts")]
    CodeCollision { attempts: u32 },

    /// The commit was sent but its outcome never came back. Tickets may
    /// exist; the call must not be retried blindly.
    #[error("checkout outcome unknown")]
    CommitUnknown(#[source] StoreError),

    #[error("storage failure")]
    Storage(#[source] StoreError),
}

impl AllocationError {
    /// Whether the request failed on a business rule, as opposed to the
    /// store failing underneath it.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AllocationError::InvalidQuantity
                | AllocationError::NotFound
                | AllocationError::EventAlreadyStarted
                | AllocationError::InsufficientAvailability { .. }
                | AllocationError::UnknownCustomer
        )
    }
}

impl From<StoreError> for AllocationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CodeCollision => AllocationError::CodeCollision { attempts: 1 },
            StoreError::UnknownCustomer => AllocationError::UnknownCustomer,
            err if err.is_transient() => AllocationError::StorageConflict(err),
            err => AllocationError::Storage(err),
        }
    }
}

pub struct AllocationEngine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    codes: Arc<dyn CodeGenerator>,
    code_attempts: u32,
}

impl AllocationEngine {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            codes: Arc::new(RandomCodeGenerator),
            code_attempts: DEFAULT_CODE_ATTEMPTS,
        }
    }

    pub fn with_code_generator(mut self, codes: Arc<dyn CodeGenerator>) -> Self {
        self.codes = codes;
        self
    }

    /// Number of times a unit is run when minted codes clash with the
    /// ledger. Values below one are treated as one.
    pub fn with_code_attempts(mut self, attempts: u32) -> Self {
        self.code_attempts = attempts.max(1);
        self
    }

    /// Issues `request.quantity` tickets or none at all.
    ///
    /// Not idempotent: a caller that lost the response of a committed call
    /// and retries will buy twice. Only [`AllocationError::StorageConflict`]
    /// guarantees that nothing was written; a failed commit is reported as
    /// [`AllocationError::CommitUnknown`].
    pub async fn allocate(&self, request: &AllocationRequest) -> Result<Allocation, AllocationError> {
        if request.quantity == 0 {
            return Err(AllocationError::InvalidQuantity);
        }

        for attempt in 1..=self.code_attempts {
            match self.run_unit(request).await {
                Err(AllocationError::CodeCollision { .. }) => {
                    warn!(
                        event_id = request.event_id,
                        attempt, "Ticket code collision, retrying allocation"
                    );
                }
                result => return result,
            }
        }

        Err(AllocationError::CodeCollision {
            attempts: self.code_attempts,
        })
    }

    async fn run_unit(&self, request: &AllocationRequest) -> Result<Allocation, AllocationError> {
        let mut tx = self.store.begin().await?;

        match self.issue(tx.as_mut(), request).await {
            Ok(allocation) => {
                tx.commit().await.map_err(commit_failure)?;
                info!(
                    event_id = request.event_id,
                    customer_id = request.customer_id,
                    quantity = request.quantity,
                    payment_method = %request.payment_method,
                    total_price = %allocation.total_price,
                    "Tickets allocated"
                );
                Ok(allocation)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = ?rollback_err, "Rollback after rejected allocation failed");
                }
                if err.is_rejection() {
                    info!(
                        event_id = request.event_id,
                        customer_id = request.customer_id,
                        quantity = request.quantity,
                        reason = %err,
                        "Allocation rejected"
                    );
                }
                Err(err)
            }
        }
    }

    async fn issue(
        &self,
        tx: &mut dyn StoreTx,
        request: &AllocationRequest,
    ) -> Result<Allocation, AllocationError> {
        let event = tx
            .lock_event(request.event_id)
            .await?
            .ok_or(AllocationError::NotFound)?;

        if validity::has_started(&event, self.clock.now()) {
            return Err(AllocationError::EventAlreadyStarted);
        }

        let issued = tx.count_tickets(event.id).await?;
        let available = (i64::from(event.capacity) - issued).max(0);
        let quantity = i64::from(request.quantity);
        if quantity > available {
            return Err(AllocationError::InsufficientAvailability { available });
        }

        let new_tickets: Vec<NewTicket> = (0..quantity)
            .map(|offset| NewTicket {
                event_id: event.id,
                customer_id: request.customer_id,
                code: self.codes.generate(event.id, issued + offset),
            })
            .collect();
        let tickets = tx.insert_tickets(&new_tickets).await?;

        Ok(Allocation {
            tickets,
            total_price: event.ticket_price * Decimal::from(request.quantity),
            payment_method: request.payment_method,
        })
    }
}

/// A rejected unique code is a definite refusal: nothing was applied. Any
/// other commit error leaves the outcome unknown.
fn commit_failure(err: StoreError) -> AllocationError {
    match err {
        StoreError::CodeCollision => AllocationError::CodeCollision { attempts: 1 },
        err => {
            error!(error = ?err, "Commit of allocation failed, outcome unknown");
            AllocationError::CommitUnknown(err)
        }
    }
}
