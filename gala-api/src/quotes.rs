use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::Deserialize;
use uuid::Uuid;

use gala_workflow::models::{Booking, Quote};
use gala_workflow::{NewQuote, QuoteRevision};

use crate::auth::authenticate;
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/quotes", post(create_quote))
        .route("/v1/quotes/{id}/send", post(send_quote))
        .route("/v1/quotes/{id}/view", post(mark_viewed))
        .route("/v1/quotes/{id}/accept", post(accept_quote))
        .route("/v1/quotes/{id}/reject", post(reject_quote))
        .route("/v1/quotes/{id}/revise", post(revise_quote))
}

#[derive(Debug, Deserialize)]
struct RejectBody {
    reason: Option<String>,
}

async fn create_quote(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(input): Json<NewQuote>,
) -> Result<Json<Quote>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let quote = state.quotes.create_quote(actor, input).await?;
    Ok(Json(quote))
}

async fn send_quote(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Quote>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let quote = state.quotes.send_quote(actor, id).await?;
    Ok(Json(quote))
}

async fn mark_viewed(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Quote>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let quote = state.quotes.mark_viewed(actor, id).await?;
    Ok(Json(quote))
}

async fn accept_quote(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let booking = state.quotes.accept_quote(actor, id).await?;
    Ok(Json(booking))
}

async fn reject_quote(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(body): Json<RejectBody>,
) -> Result<Json<Quote>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let quote = state.quotes.reject_quote(actor, id, body.reason).await?;
    Ok(Json(quote))
}

async fn revise_quote(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(input): Json<QuoteRevision>,
) -> Result<Json<Quote>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let quote = state.quotes.revise_quote(actor, id, input).await?;
    Ok(Json(quote))
}
