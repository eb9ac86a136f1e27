use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, security_header_layers, Config};
use crate::handlers::checkout::checkout;
use crate::handlers::events::{
    create_event, delete_event, get_event, get_public_event, list_events, list_public_events,
    update_event,
};
use crate::handlers::health_check;
use crate::handlers::tickets::list_my_tickets;
use crate::state::AppState;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/public/events", get(list_public_events))
        .route("/public/events/:id", get(get_public_event))
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/tickets", get(list_my_tickets))
        .route("/checkout", post(checkout))
        .with_state(state);

    security_header_layers(config.production)
        .into_iter()
        .fold(router, |router, layer| router.layer(layer))
        .layer(create_cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
}
