use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use crate::auth::AuthenticatedCustomer;
use crate::handlers::json_body;
use crate::models::{EventDraft, EventId};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, no_content, success};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub with_expired: bool,
}

pub async fn list_public_events(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError> {
    let events = state.catalog.list(query.with_expired).await?;
    Ok(success(events, "Events retrieved successfully"))
}

pub async fn get_public_event(
    State(state): State<AppState>,
    Path(id): Path<EventId>,
) -> Result<Response, AppError> {
    let event = state.catalog.find(id).await?;
    Ok(success(event, "Event retrieved successfully"))
}

pub async fn list_events(
    _customer: AuthenticatedCustomer,
    state: State<AppState>,
    query: Query<ListQuery>,
) -> Result<Response, AppError> {
    list_public_events(state, query).await
}

pub async fn get_event(
    _customer: AuthenticatedCustomer,
    state: State<AppState>,
    id: Path<EventId>,
) -> Result<Response, AppError> {
    get_public_event(state, id).await
}

pub async fn create_event(
    customer: AuthenticatedCustomer,
    State(state): State<AppState>,
    payload: Result<Json<EventDraft>, JsonRejection>,
) -> Result<Response, AppError> {
    let draft = json_body(payload)?;
    let event = state.catalog.create(draft).await?;
    tracing::info!(event_id = event.id, customer_id = customer.id, "Event created via API");
    Ok(created(event, "Event created successfully"))
}

pub async fn update_event(
    _customer: AuthenticatedCustomer,
    State(state): State<AppState>,
    Path(id): Path<EventId>,
    payload: Result<Json<EventDraft>, JsonRejection>,
) -> Result<Response, AppError> {
    let draft = json_body(payload)?;
    let event = state.catalog.update(id, draft).await?;
    Ok(success(event, "Event updated successfully"))
}

pub async fn delete_event(
    _customer: AuthenticatedCustomer,
    State(state): State<AppState>,
    Path(id): Path<EventId>,
) -> Result<Response, AppError> {
    state.catalog.delete(id).await?;
    Ok(no_content())
}
