//! `POST /checkout`. Replies with a flat body whether tickets were issued
//! or the purchase was refused, so clients read the same fields either way.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedCustomer;
use crate::checkout::{Allocation, AllocationRequest, PaymentMethod};
use crate::handlers::json_body;
use crate::models::{CustomerId, EventId};
use crate::state::AppState;
use crate::utils::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub event_id: EventId,
    pub ticket_count: u32,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedTicket {
    pub event_id: EventId,
    pub customer_id: CustomerId,
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub message: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub payment_method: Option<PaymentMethod>,
    pub tickets: Vec<PurchasedTicket>,
}

impl CheckoutResponse {
    fn purchased(allocation: Allocation) -> Self {
        Self {
            message: "Tickets purchased successfully".to_string(),
            total_price: allocation.total_price,
            payment_method: Some(allocation.payment_method),
            tickets: allocation
                .tickets
                .into_iter()
                .map(|ticket| PurchasedTicket {
                    event_id: ticket.event_id,
                    customer_id: ticket.customer_id,
                    code: ticket.code,
                })
                .collect(),
        }
    }

    fn refused(message: String) -> Self {
        Self {
            message,
            total_price: Decimal::ZERO,
            payment_method: None,
            tickets: Vec::new(),
        }
    }
}

pub async fn checkout(
    customer: AuthenticatedCustomer,
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let body = json_body(payload)?;
    if body.event_id <= 0 {
        return Err(AppError::ValidationError(
            "Event id must be a positive number".to_string(),
        ));
    }
    if body.ticket_count == 0 {
        return Err(AppError::ValidationError(
            "Ticket count must be a positive number".to_string(),
        ));
    }

    let request = AllocationRequest {
        event_id: body.event_id,
        customer_id: customer.id,
        quantity: body.ticket_count,
        payment_method: body.payment_method,
    };

    match state.checkout.allocate(&request).await {
        Ok(allocation) => Ok((
            StatusCode::CREATED,
            Json(CheckoutResponse::purchased(allocation)),
        )
            .into_response()),
        Err(err) if err.is_rejection() => {
            let message = err.to_string();
            let status = AppError::from(err).status_code();
            Ok((status, Json(CheckoutResponse::refused(message))).into_response())
        }
        Err(err) => Err(err.into()),
    }
}
