use axum::extract::State;
use axum::response::Response;

use crate::auth::AuthenticatedCustomer;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub async fn list_my_tickets(
    customer: AuthenticatedCustomer,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let tickets = state.store.tickets_for_customer(customer.id).await?;
    Ok(success(tickets, "Tickets retrieved successfully"))
}
