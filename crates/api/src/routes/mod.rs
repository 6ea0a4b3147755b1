pub mod artwork;
pub mod cron;
pub mod deliveries;
pub mod health;
pub mod orders;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(cron::router())
        .merge(orders::router())
        .merge(artwork::router())
        .merge(deliveries::router())
        .with_state(state)
}
