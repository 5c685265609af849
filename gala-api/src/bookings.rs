use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use gala_workflow::models::{Booking, Cancellation, Payment};
use gala_workflow::BookingChanges;

use crate::auth::authenticate;
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings/{id}", get(get_booking).patch(update_booking))
        .route("/v1/bookings/{id}/complete", post(complete_booking))
        .route("/v1/bookings/{id}/payments", post(record_payment))
        .route("/v1/bookings/{id}/refunds", post(record_refund))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
}

#[derive(Debug, Deserialize)]
struct CompleteBody {
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentBody {
    amount: Decimal,
    #[serde(default)]
    is_deposit: bool,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundBody {
    amount: Decimal,
    original_payment_id: Option<Uuid>,
    reason: String,
}

#[derive(Debug, Deserialize)]
struct CancelBody {
    reason: String,
}

async fn get_booking(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let booking = state.bookings.get_booking(actor, id).await?;
    Ok(Json(booking))
}

async fn update_booking(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(changes): Json<BookingChanges>,
) -> Result<Json<Booking>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let booking = state.bookings.update_details(actor, id, changes).await?;
    Ok(Json(booking))
}

async fn complete_booking(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<Booking>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let booking = state.bookings.complete_booking(actor, id, body.notes).await?;
    Ok(Json(booking))
}

async fn record_payment(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(body): Json<PaymentBody>,
) -> Result<Json<Payment>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let payment = state
        .ledger
        .record_payment(actor, id, body.amount, body.is_deposit, body.notes)
        .await?;
    Ok(Json(payment))
}

async fn record_refund(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(body): Json<RefundBody>,
) -> Result<Json<Payment>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let payment = state
        .ledger
        .record_refund(actor, id, body.amount, body.original_payment_id, body.reason)
        .await?;
    Ok(Json(payment))
}

async fn cancel_booking(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelBody>,
) -> Result<Json<Cancellation>, AppError> {
    let actor = authenticate(&state, bearer.token())?;
    let cancellation = state.cancellations.cancel_booking(actor, id, body.reason).await?;
    Ok(Json(cancellation))
}
