use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use uuid::Uuid;

use gala_workflow::models::BookingRequest;
use gala_workflow::{NewRequest, RequestChanges};

use crate::auth::authenticate;
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/requests", post(create_request))
        .route("/v1/requests/{id}", get(get_request).patch(update_request))
        .route("/v1/requests/{id}/view", post(mark_viewed))
}

async fn create_request(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(input): Json<NewRequest>,
) -> Result<Json<BookingRequest>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let request = state.requests.create_request(actor, input).await?;
    Ok(Json(request))
}

async fn get_request(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingRequest>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let request = state.requests.get_request(actor, id).await?;
    Ok(Json(request))
}

async fn update_request(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(changes): Json<RequestChanges>,
) -> Result<Json<BookingRequest>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let request = state.requests.update_request(actor, id, changes).await?;
    Ok(Json(request))
}

async fn mark_viewed(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingRequest>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let request = state.requests.mark_viewed_by_vendor(actor, id).await?;
    Ok(Json(request))
}
