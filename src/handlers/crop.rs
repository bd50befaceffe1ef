//! Crop listing handlers
//!
//! /crops, /latest-crops, /my-crops, interest submission and decisions,
//! and /my-interests.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::handlers::auth::VerifiedUser;
use crate::models::crop::{
    CreateCropRequest, CropErrorResponse, CropListing, DecideInterestRequest, DeleteResult,
    EmailQuery, InsertResult, MyInterest, SubmitInterestRequest, UpdateResult,
};
use crate::services::crop_service::{CropError, patch_from_body};
use crate::AppState;

impl From<JsonRejection> for CropError {
    fn from(rejection: JsonRejection) -> Self {
        CropError::InvalidInput(rejection.body_text())
    }
}

/// Unwrap a JSON body, turning extractor rejections into 400 `{error, code}`
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, CropError> {
    let Json(value) = body.map_err(|rejection| {
        warn!(
            status = %rejection.status(),
            error = %rejection.body_text(),
            "Rejected request body"
        );
        CropError::from(rejection)
    })?;
    Ok(value)
}

impl IntoResponse for CropError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            CropError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            CropError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            CropError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            CropError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            CropError::Store(e) => {
                error!(error = %e, "Crop store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR")
            }
        };

        let message = match &self {
            CropError::Store(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        (
            status,
            Json(CropErrorResponse {
                error: message,
                code: Some(code.to_string()),
            }),
        )
            .into_response()
    }
}

/// GET /crops
pub async fn list_crops(
    State(state): State<AppState>,
) -> Result<Json<Vec<CropListing>>, CropError> {
    let crops = state.crops.list().await?;
    info!(count = crops.len(), "Crop list returned");
    Ok(Json(crops))
}

/// GET /latest-crops
///
/// The six newest listings, newest first.
pub async fn latest_crops(
    State(state): State<AppState>,
) -> Result<Json<Vec<CropListing>>, CropError> {
    Ok(Json(state.crops.latest().await?))
}

/// GET /crops/{id}
///
/// Responds `null` for an unknown id.
pub async fn get_crop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Option<CropListing>>, CropError> {
    let crop = state.crops.get(&id).await?;
    if crop.is_none() {
        info!(crop_id = %id, "Crop not found");
    }
    Ok(Json(crop))
}

/// POST /crops
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Tomatoes",
///   "quantity": 120,
///   "ownerEmail": "farmer@example.com",
///   "ownerName": "Ama",
///   "unit": "kg"
/// }
/// ```
pub async fn create_crop(
    State(state): State<AppState>,
    VerifiedUser(identity): VerifiedUser,
    payload: Result<Json<CreateCropRequest>, JsonRejection>,
) -> Result<Json<InsertResult>, CropError> {
    let payload = json_body(payload)?;
    let inserted_id = state.crops.create(payload).await?;
    info!(crop_id = %inserted_id, caller = %identity.email, "Crop listing created");
    Ok(Json(InsertResult {
        acknowledged: true,
        inserted_id,
    }))
}

/// GET /my-crops?email=
pub async fn my_crops(
    State(state): State<AppState>,
    VerifiedUser(identity): VerifiedUser,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Vec<CropListing>>, CropError> {
    if query.email.as_deref().is_some_and(|e| e != identity.email) {
        warn!(caller = %identity.email, requested = ?query.email, "Listing another user's crops");
    }
    Ok(Json(state.crops.mine(query.email.as_deref()).await?))
}

/// PUT /crops/{id}
///
/// Merges the fields present in the body; only the owner may update.
pub async fn update_crop(
    State(state): State<AppState>,
    VerifiedUser(identity): VerifiedUser,
    Path(id): Path<String>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<UpdateResult>, CropError> {
    let patch = patch_from_body(json_body(body)?)?;
    let outcome = state.crops.update(&id, patch, &identity).await?;
    info!(
        crop_id = %id,
        matched = outcome.matched,
        modified = outcome.modified,
        "Crop listing update"
    );
    Ok(Json(UpdateResult {
        acknowledged: true,
        matched_count: outcome.matched,
        modified_count: outcome.modified,
    }))
}

/// DELETE /crops/{id}
pub async fn delete_crop(
    State(state): State<AppState>,
    VerifiedUser(identity): VerifiedUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>, CropError> {
    let deleted_count = state.crops.delete(&id, &identity).await?;
    Ok(Json(DeleteResult {
        acknowledged: true,
        deleted_count,
    }))
}

/// POST /crops/{id}/interests
///
/// # Request Body
///
/// ```json
/// { "userEmail": "buyer@example.com", "quantity": 20, "message": "Can pick up Friday" }
/// ```
///
/// Responds with the whole listing including the new pending interest.
pub async fn submit_interest(
    State(state): State<AppState>,
    VerifiedUser(identity): VerifiedUser,
    Path(id): Path<String>,
    payload: Result<Json<SubmitInterestRequest>, JsonRejection>,
) -> Result<Json<CropListing>, CropError> {
    let payload = json_body(payload)?;
    Ok(Json(state.crops.submit_interest(&id, payload, &identity).await?))
}

/// PATCH /crops/{crop_id}/interests/{interest_id}
///
/// # Request Body
///
/// ```json
/// { "status": "accepted" }
/// ```
///
/// A `status` that is not a string counts as an invalid decision.
pub async fn decide_interest(
    State(state): State<AppState>,
    VerifiedUser(identity): VerifiedUser,
    Path((crop_id, interest_id)): Path<(String, String)>,
    payload: Result<Json<DecideInterestRequest>, JsonRejection>,
) -> Result<Json<CropListing>, CropError> {
    let payload = json_body(payload)?;
    let listing = state
        .crops
        .decide_interest(&crop_id, &interest_id, payload.decision(), &identity)
        .await
        .map_err(|e| {
            warn!(
                crop_id = %crop_id,
                interest_id = %interest_id,
                caller = %identity.email,
                error = %e,
                "Interest decision refused"
            );
            e
        })?;
    Ok(Json(listing))
}

/// GET /my-interests?email=
///
/// Defaults to the caller's own email.
pub async fn my_interests(
    State(state): State<AppState>,
    VerifiedUser(identity): VerifiedUser,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Vec<MyInterest>>, CropError> {
    let email = query.email.unwrap_or(identity.email);
    let interests = state.crops.my_interests(&email).await?;
    info!(email = %email, count = interests.len(), "My interests returned");
    Ok(Json(interests))
}
