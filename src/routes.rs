use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::crop;
use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/crops", get(crop::list_crops).post(crop::create_crop))
        .route("/latest-crops", get(crop::latest_crops))
        .route(
            "/crops/{id}",
            get(crop::get_crop)
                .put(crop::update_crop)
                .delete(crop::delete_crop),
        )
        .route("/crops/{id}/interests", post(crop::submit_interest))
        .route(
            "/crops/{crop_id}/interests/{interest_id}",
            patch(crop::decide_interest),
        )
        .route("/my-crops", get(crop::my_crops))
        .route("/my-interests", get(crop::my_interests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "AgroNet backend is running"
}
