use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use gala_core::{
    format_sequence, ConflictKind, EventDirectory, EventSummary, SequenceIssuer, SequenceKind,
    VendorDirectory, VendorProfile, WorkflowError,
};
use gala_workflow::models::{
    Booking, BookingRequest, BookingStatus, Cancellation, CancellationInitiator, Payment,
    PaymentState, PaymentStatus, Quote, QuoteStatus, RequestStatus,
};
use gala_workflow::repository::{BookingRepository, QuoteRepository, RequestRepository};

const OPEN_QUOTE_STATES: [&str; 3] = ["DRAFT", "SENT", "VIEWED"];

fn db_err(err: sqlx::Error) -> WorkflowError {
    WorkflowError::infra(err)
}

fn decode_err(err: impl std::fmt::Display) -> WorkflowError {
    WorkflowError::infra(format!("corrupt row: {err}"))
}

/// Postgres-backed store. Compound operations run in a transaction with a
/// row lock on the request for acceptance; the booking hot path uses
/// version-conditional updates so concurrent writers retry instead of
/// losing updates.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, WorkflowError> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(url)
            .await
            .map_err(db_err)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), WorkflowError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| WorkflowError::infra(e))
    }
}

fn request_from_row(row: &PgRow) -> Result<BookingRequest, WorkflowError> {
    let status: String = row.try_get("status").map_err(db_err)?;
    Ok(BookingRequest {
        id: row.try_get("id").map_err(db_err)?,
        event_id: row.try_get("event_id").map_err(db_err)?,
        vendor_id: row.try_get("vendor_id").map_err(db_err)?,
        organizer_id: row.try_get("organizer_id").map_err(db_err)?,
        status: RequestStatus::from_str(&status)
            .ok_or_else(|| decode_err(format!("request status {status}")))?,
        title: row.try_get("title").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        event_date: row.try_get("event_date").map_err(db_err)?,
        event_end_date: row.try_get("event_end_date").map_err(db_err)?,
        venue_name: row.try_get("venue_name").map_err(db_err)?,
        venue_address: row.try_get("venue_address").map_err(db_err)?,
        guest_count: row.try_get("guest_count").map_err(db_err)?,
        budget_min: row.try_get("budget_min").map_err(db_err)?,
        budget_max: row.try_get("budget_max").map_err(db_err)?,
        currency: row.try_get("currency").map_err(db_err)?,
        response_deadline: row.try_get("response_deadline").map_err(db_err)?,
        expires_at: row.try_get("expires_at").map_err(db_err)?,
        viewed_by_vendor: row.try_get("viewed_by_vendor").map_err(db_err)?,
        viewed_at: row.try_get("viewed_at").map_err(db_err)?,
        responded_at: row.try_get("responded_at").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn quote_from_row(row: &PgRow) -> Result<Quote, WorkflowError> {
    let status: String = row.try_get("status").map_err(db_err)?;
    let items: serde_json::Value = row.try_get("items").map_err(db_err)?;
    Ok(Quote {
        id: row.try_get("id").map_err(db_err)?,
        request_id: row.try_get("request_id").map_err(db_err)?,
        vendor_id: row.try_get("vendor_id").map_err(db_err)?,
        quote_number: row.try_get("quote_number").map_err(db_err)?,
        version: row.try_get("version").map_err(db_err)?,
        previous_quote_id: row.try_get("previous_quote_id").map_err(db_err)?,
        status: QuoteStatus::from_str(&status)
            .ok_or_else(|| decode_err(format!("quote status {status}")))?,
        items: serde_json::from_value(items).map_err(decode_err)?,
        subtotal: row.try_get("subtotal").map_err(db_err)?,
        tax_rate: row.try_get("tax_rate").map_err(db_err)?,
        tax_amount: row.try_get("tax_amount").map_err(db_err)?,
        discount_amount: row.try_get("discount_amount").map_err(db_err)?,
        discount_reason: row.try_get("discount_reason").map_err(db_err)?,
        total_amount: row.try_get("total_amount").map_err(db_err)?,
        currency: row.try_get("currency").map_err(db_err)?,
        deposit_percentage: row.try_get("deposit_percentage").map_err(db_err)?,
        deposit_amount: row.try_get("deposit_amount").map_err(db_err)?,
        valid_until: row.try_get("valid_until").map_err(db_err)?,
        notes: row.try_get("notes").map_err(db_err)?,
        rejection_reason: row.try_get("rejection_reason").map_err(db_err)?,
        sent_at: row.try_get("sent_at").map_err(db_err)?,
        viewed_at: row.try_get("viewed_at").map_err(db_err)?,
        accepted_at: row.try_get("accepted_at").map_err(db_err)?,
        rejected_at: row.try_get("rejected_at").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn booking_from_row(row: &PgRow) -> Result<Booking, WorkflowError> {
    let status: String = row.try_get("status").map_err(db_err)?;
    let payment_status: String = row.try_get("payment_status").map_err(db_err)?;
    let schedule: serde_json::Value = row.try_get("refund_schedule").map_err(db_err)?;
    Ok(Booking {
        id: row.try_get("id").map_err(db_err)?,
        booking_number: row.try_get("booking_number").map_err(db_err)?,
        request_id: row.try_get("request_id").map_err(db_err)?,
        quote_id: row.try_get("quote_id").map_err(db_err)?,
        event_id: row.try_get("event_id").map_err(db_err)?,
        vendor_id: row.try_get("vendor_id").map_err(db_err)?,
        organizer_id: row.try_get("organizer_id").map_err(db_err)?,
        status: BookingStatus::from_str(&status)
            .ok_or_else(|| decode_err(format!("booking status {status}")))?,
        event_date: row.try_get("event_date").map_err(db_err)?,
        event_end_date: row.try_get("event_end_date").map_err(db_err)?,
        venue_name: row.try_get("venue_name").map_err(db_err)?,
        venue_address: row.try_get("venue_address").map_err(db_err)?,
        guest_count: row.try_get("guest_count").map_err(db_err)?,
        total_amount: row.try_get("total_amount").map_err(db_err)?,
        deposit_amount: row.try_get("deposit_amount").map_err(db_err)?,
        amount_paid: row.try_get("amount_paid").map_err(db_err)?,
        amount_due: row.try_get("amount_due").map_err(db_err)?,
        currency: row.try_get("currency").map_err(db_err)?,
        payment_status: PaymentStatus::from_str(&payment_status)
            .ok_or_else(|| decode_err(format!("payment status {payment_status}")))?,
        commission_rate: row.try_get("commission_rate").map_err(db_err)?,
        commission_amount: row.try_get("commission_amount").map_err(db_err)?,
        cancellation_policy: row.try_get("cancellation_policy").map_err(db_err)?,
        refund_schedule: serde_json::from_value(schedule).map_err(decode_err)?,
        organizer_notes: row.try_get("organizer_notes").map_err(db_err)?,
        completed_at: row.try_get("completed_at").map_err(db_err)?,
        completion_notes: row.try_get("completion_notes").map_err(db_err)?,
        cancelled_at: row.try_get("cancelled_at").map_err(db_err)?,
        version: row.try_get("version").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn payment_from_row(row: &PgRow) -> Result<Payment, WorkflowError> {
    let state: String = row.try_get("state").map_err(db_err)?;
    Ok(Payment {
        id: row.try_get("id").map_err(db_err)?,
        payment_number: row.try_get("payment_number").map_err(db_err)?,
        booking_id: row.try_get("booking_id").map_err(db_err)?,
        payer_id: row.try_get("payer_id").map_err(db_err)?,
        amount: row.try_get("amount").map_err(db_err)?,
        currency: row.try_get("currency").map_err(db_err)?,
        is_deposit: row.try_get("is_deposit").map_err(db_err)?,
        is_refund: row.try_get("is_refund").map_err(db_err)?,
        state: PaymentState::from_str(&state)
            .ok_or_else(|| decode_err(format!("payment state {state}")))?,
        original_payment_id: row.try_get("original_payment_id").map_err(db_err)?,
        refund_reason: row.try_get("refund_reason").map_err(db_err)?,
        notes: row.try_get("notes").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn cancellation_from_row(row: &PgRow) -> Result<Cancellation, WorkflowError> {
    let initiator: String = row.try_get("initiator").map_err(db_err)?;
    Ok(Cancellation {
        id: row.try_get("id").map_err(db_err)?,
        booking_id: row.try_get("booking_id").map_err(db_err)?,
        cancelled_by: row.try_get("cancelled_by").map_err(db_err)?,
        initiator: CancellationInitiator::from_str(&initiator)
            .ok_or_else(|| decode_err(format!("initiator {initiator}")))?,
        reason: row.try_get("reason").map_err(db_err)?,
        lead_days: row.try_get("lead_days").map_err(db_err)?,
        refund_percentage: row.try_get("refund_percentage").map_err(db_err)?,
        refund_amount: row.try_get("refund_amount").map_err(db_err)?,
        penalty_amount: row.try_get("penalty_amount").map_err(db_err)?,
        mutual_agreement: row.try_get("mutual_agreement").map_err(db_err)?,
        organizer_approved: row.try_get("organizer_approved").map_err(db_err)?,
        vendor_approved: row.try_get("vendor_approved").map_err(db_err)?,
        cancelled_at: row.try_get("cancelled_at").map_err(db_err)?,
    })
}

async fn insert_payment_row<'a>(
    tx: &mut sqlx::Transaction<'a, sqlx::Postgres>,
    payment: &Payment,
) -> Result<(), WorkflowError> {
    sqlx::query(
        r#"
        INSERT INTO booking_payments
            (id, payment_number, booking_id, payer_id, amount, currency,
             is_deposit, is_refund, state, original_payment_id, refund_reason,
             notes, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(payment.id)
    .bind(&payment.payment_number)
    .bind(payment.booking_id)
    .bind(payment.payer_id)
    .bind(payment.amount)
    .bind(&payment.currency)
    .bind(payment.is_deposit)
    .bind(payment.is_refund)
    .bind(payment.state.as_str())
    .bind(payment.original_payment_id)
    .bind(&payment.refund_reason)
    .bind(&payment.notes)
    .bind(payment.created_at)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(())
}

#[async_trait]
impl RequestRepository for PgStore {
    async fn insert_request(&self, request: &BookingRequest) -> Result<(), WorkflowError> {
        sqlx::query(
            r#"
            INSERT INTO booking_requests
                (id, event_id, vendor_id, organizer_id, status, title, description,
                 event_date, event_end_date, venue_name, venue_address, guest_count,
                 budget_min, budget_max, currency, response_deadline, expires_at,
                 viewed_by_vendor, viewed_at, responded_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22)
            "#,
        )
        .bind(request.id)
        .bind(request.event_id)
        .bind(request.vendor_id)
        .bind(request.organizer_id)
        .bind(request.status.as_str())
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.event_date)
        .bind(request.event_end_date)
        .bind(&request.venue_name)
        .bind(&request.venue_address)
        .bind(request.guest_count)
        .bind(request.budget_min)
        .bind(request.budget_max)
        .bind(&request.currency)
        .bind(request.response_deadline)
        .bind(request.expires_at)
        .bind(request.viewed_by_vendor)
        .bind(request.viewed_at)
        .bind(request.responded_at)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<BookingRequest>, WorkflowError> {
        let row = sqlx::query("SELECT * FROM booking_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(request_from_row).transpose()
    }

    async fn update_request_details(
        &self,
        request: &BookingRequest,
        expected: &[RequestStatus],
    ) -> Result<bool, WorkflowError> {
        let expected: Vec<String> = expected.iter().map(|s| s.as_str().to_string()).collect();
        let result = sqlx::query(
            r#"
            UPDATE booking_requests
            SET title = $2, description = $3, event_date = $4, event_end_date = $5,
                venue_name = $6, venue_address = $7, guest_count = $8,
                budget_min = $9, budget_max = $10, response_deadline = $11,
                expires_at = $12, updated_at = $13
            WHERE id = $1 AND status = ANY($14)
            "#,
        )
        .bind(request.id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.event_date)
        .bind(request.event_end_date)
        .bind(&request.venue_name)
        .bind(&request.venue_address)
        .bind(request.guest_count)
        .bind(request.budget_min)
        .bind(request.budget_max)
        .bind(request.response_deadline)
        .bind(request.expires_at)
        .bind(request.updated_at)
        .bind(&expected)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_request_status(
        &self,
        id: Uuid,
        from: &[RequestStatus],
        to: RequestStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkflowError> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let result = sqlx::query(
            r#"
            UPDATE booking_requests
            SET status = $2,
                responded_at = CASE WHEN $2 = 'QUOTED'
                                    THEN COALESCE(responded_at, $3)
                                    ELSE responded_at END,
                updated_at = $3
            WHERE id = $1 AND status = ANY($4)
            "#,
        )
        .bind(id)
        .bind(to.as_str())
        .bind(now)
        .bind(&from)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_request_viewed(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        let result = sqlx::query(
            r#"
            UPDATE booking_requests
            SET viewed_by_vendor = TRUE,
                viewed_at = COALESCE(viewed_at, $2),
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(WorkflowError::not_found("booking request", id));
        }
        Ok(())
    }

    async fn list_expiry_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, WorkflowError> {
        let rows = sqlx::query(
            "SELECT id FROM booking_requests WHERE status IN ('PENDING', 'QUOTED') AND expires_at < $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter()
            .map(|row| row.try_get("id").map_err(db_err))
            .collect()
    }

    async fn expire_request_with_quotes(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkflowError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let result = sqlx::query(
            r#"
            UPDATE booking_requests
            SET status = 'EXPIRED', updated_at = $2
            WHERE id = $1 AND status IN ('PENDING', 'QUOTED')
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        sqlx::query(
            r#"
            UPDATE quotes
            SET status = 'EXPIRED', updated_at = $2
            WHERE request_id = $1 AND status = ANY($3)
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(OPEN_QUOTE_STATES.map(String::from).to_vec())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(true)
    }
}

#[async_trait]
impl QuoteRepository for PgStore {
    async fn insert_quote(&self, quote: &Quote) -> Result<(), WorkflowError> {
        let items = serde_json::to_value(&quote.items).map_err(decode_err)?;
        let result = sqlx::query(
            r#"
            INSERT INTO quotes
                (id, request_id, vendor_id, quote_number, version, previous_quote_id,
                 status, items, subtotal, tax_rate, tax_amount, discount_amount,
                 discount_reason, total_amount, currency, deposit_percentage,
                 deposit_amount, valid_until, notes, rejection_reason, sent_at,
                 viewed_at, accepted_at, rejected_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)
            "#,
        )
        .bind(quote.id)
        .bind(quote.request_id)
        .bind(quote.vendor_id)
        .bind(&quote.quote_number)
        .bind(quote.version)
        .bind(quote.previous_quote_id)
        .bind(quote.status.as_str())
        .bind(items)
        .bind(quote.subtotal)
        .bind(quote.tax_rate)
        .bind(quote.tax_amount)
        .bind(quote.discount_amount)
        .bind(&quote.discount_reason)
        .bind(quote.total_amount)
        .bind(&quote.currency)
        .bind(quote.deposit_percentage)
        .bind(quote.deposit_amount)
        .bind(quote.valid_until)
        .bind(&quote.notes)
        .bind(&quote.rejection_reason)
        .bind(quote.sent_at)
        .bind(quote.viewed_at)
        .bind(quote.accepted_at)
        .bind(quote.rejected_at)
        .bind(quote.created_at)
        .bind(quote.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let constraint = err
                    .as_database_error()
                    .and_then(|db| db.constraint())
                    .map(str::to_owned);
                if constraint.as_deref() == Some("quotes_one_open_per_request") {
                    return Err(WorkflowError::conflict(
                        ConflictKind::QuoteAlreadyOpen,
                        "booking request",
                        quote.request_id,
                        "OPEN",
                    ));
                }
                Err(db_err(err))
            }
        }
    }

    async fn get_quote(&self, id: Uuid) -> Result<Option<Quote>, WorkflowError> {
        let row = sqlx::query("SELECT * FROM quotes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(quote_from_row).transpose()
    }

    async fn list_quotes_for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<Quote>, WorkflowError> {
        let rows = sqlx::query(
            "SELECT * FROM quotes WHERE request_id = $1 ORDER BY version DESC, created_at DESC",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(quote_from_row).collect()
    }

    async fn set_quote_status(
        &self,
        id: Uuid,
        from: &[QuoteStatus],
        to: QuoteStatus,
        now: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<bool, WorkflowError> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let result = sqlx::query(
            r#"
            UPDATE quotes
            SET status = $2,
                sent_at = CASE WHEN $2 = 'SENT' THEN $3 ELSE sent_at END,
                viewed_at = CASE WHEN $2 = 'VIEWED' THEN $3 ELSE viewed_at END,
                accepted_at = CASE WHEN $2 = 'ACCEPTED' THEN $3 ELSE accepted_at END,
                rejected_at = CASE WHEN $2 = 'REJECTED' THEN $3 ELSE rejected_at END,
                rejection_reason = COALESCE($4, rejection_reason),
                updated_at = $3
            WHERE id = $1 AND status = ANY($5)
            "#,
        )
        .bind(id)
        .bind(to.as_str())
        .bind(now)
        .bind(reason)
        .bind(&from)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl BookingRepository for PgStore {
    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, WorkflowError> {
        let row = sqlx::query("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn list_payments(&self, booking_id: Uuid) -> Result<Vec<Payment>, WorkflowError> {
        let rows = sqlx::query(
            "SELECT * FROM booking_payments WHERE booking_id = $1 ORDER BY created_at",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(payment_from_row).collect()
    }

    async fn get_cancellation(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<Cancellation>, WorkflowError> {
        let row = sqlx::query("SELECT * FROM booking_cancellations WHERE booking_id = $1")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(cancellation_from_row).transpose()
    }

    async fn commit_acceptance(
        &self,
        request_id: Uuid,
        quote_id: Uuid,
        booking: &Booking,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // The request row is the acceptance lock: whoever gets it first in
        // an eligible state wins; everyone else observes the winner.
        let row = sqlx::query("SELECT status FROM booking_requests WHERE id = $1 FOR UPDATE")
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| WorkflowError::not_found("booking request", request_id))?;
        let status: String = row.try_get("status").map_err(db_err)?;
        let request_status = RequestStatus::from_str(&status)
            .ok_or_else(|| decode_err(format!("request status {status}")))?;
        if !matches!(request_status, RequestStatus::Pending | RequestStatus::Quoted) {
            return Err(WorkflowError::conflict(
                ConflictKind::RequestAlreadyResolved,
                "booking request",
                request_id,
                request_status,
            ));
        }

        let row = sqlx::query("SELECT status FROM quotes WHERE id = $1 FOR UPDATE")
            .bind(quote_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| WorkflowError::not_found("quote", quote_id))?;
        let status: String = row.try_get("status").map_err(db_err)?;
        let quote_status = QuoteStatus::from_str(&status)
            .ok_or_else(|| decode_err(format!("quote status {status}")))?;
        if !quote_status.is_acceptable() {
            return Err(WorkflowError::conflict(
                ConflictKind::QuoteNotOpen,
                "quote",
                quote_id,
                quote_status,
            ));
        }

        sqlx::query(
            "UPDATE quotes SET status = 'ACCEPTED', accepted_at = $2, updated_at = $2 WHERE id = $1",
        )
        .bind(quote_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            UPDATE quotes
            SET status = 'EXPIRED', updated_at = $3
            WHERE request_id = $1 AND id <> $2 AND status = ANY($4)
            "#,
        )
        .bind(request_id)
        .bind(quote_id)
        .bind(now)
        .bind(OPEN_QUOTE_STATES.map(String::from).to_vec())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            UPDATE booking_requests
            SET status = 'ACCEPTED',
                responded_at = COALESCE(responded_at, $2),
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(request_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let schedule = serde_json::to_value(&booking.refund_schedule).map_err(decode_err)?;
        sqlx::query(
            r#"
            INSERT INTO bookings
                (id, booking_number, request_id, quote_id, event_id, vendor_id,
                 organizer_id, status, event_date, event_end_date, venue_name,
                 venue_address, guest_count, total_amount, deposit_amount,
                 amount_paid, amount_due, currency, payment_status, commission_rate,
                 commission_amount, cancellation_policy, refund_schedule,
                 organizer_notes, completed_at, completion_notes, cancelled_at,
                 version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                    $27, $28, $29, $30)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.booking_number)
        .bind(booking.request_id)
        .bind(booking.quote_id)
        .bind(booking.event_id)
        .bind(booking.vendor_id)
        .bind(booking.organizer_id)
        .bind(booking.status.as_str())
        .bind(booking.event_date)
        .bind(booking.event_end_date)
        .bind(&booking.venue_name)
        .bind(&booking.venue_address)
        .bind(booking.guest_count)
        .bind(booking.total_amount)
        .bind(booking.deposit_amount)
        .bind(booking.amount_paid)
        .bind(booking.amount_due)
        .bind(&booking.currency)
        .bind(booking.payment_status.as_str())
        .bind(booking.commission_rate)
        .bind(booking.commission_amount)
        .bind(&booking.cancellation_policy)
        .bind(schedule)
        .bind(&booking.organizer_notes)
        .bind(booking.completed_at)
        .bind(&booking.completion_notes)
        .bind(booking.cancelled_at)
        .bind(booking.version)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn update_booking_details(
        &self,
        booking: &Booking,
        expected_version: i64,
    ) -> Result<bool, WorkflowError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET venue_name = $2, venue_address = $3, guest_count = $4,
                organizer_notes = $5, version = $6, updated_at = $7
            WHERE id = $1 AND version = $8
            "#,
        )
        .bind(booking.id)
        .bind(&booking.venue_name)
        .bind(&booking.venue_address)
        .bind(booking.guest_count)
        .bind(&booking.organizer_notes)
        .bind(booking.version)
        .bind(booking.updated_at)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn complete_booking(
        &self,
        id: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
        expected_version: i64,
    ) -> Result<bool, WorkflowError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'COMPLETED', completed_at = $2, completion_notes = $3,
                version = version + 1, updated_at = $2
            WHERE id = $1 AND version = $4 AND status = 'CONFIRMED'
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(notes)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_payment(
        &self,
        payment: &Payment,
        updated: &Booking,
        expected_version: i64,
    ) -> Result<bool, WorkflowError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET amount_paid = $2, amount_due = $3, payment_status = $4,
                version = $5, updated_at = $6
            WHERE id = $1 AND version = $7
            "#,
        )
        .bind(updated.id)
        .bind(updated.amount_paid)
        .bind(updated.amount_due)
        .bind(updated.payment_status.as_str())
        .bind(updated.version)
        .bind(updated.updated_at)
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        insert_payment_row(&mut tx, payment).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn commit_cancellation(
        &self,
        cancellation: &Cancellation,
        updated: &Booking,
        refund: Option<&Payment>,
        expected_version: i64,
    ) -> Result<bool, WorkflowError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'CANCELLED', cancelled_at = $2, amount_paid = $3,
                amount_due = $4, payment_status = $5, version = $6, updated_at = $7
            WHERE id = $1 AND version = $8
            "#,
        )
        .bind(updated.id)
        .bind(updated.cancelled_at)
        .bind(updated.amount_paid)
        .bind(updated.amount_due)
        .bind(updated.payment_status.as_str())
        .bind(updated.version)
        .bind(updated.updated_at)
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO booking_cancellations
                (id, booking_id, cancelled_by, initiator, reason, lead_days,
                 refund_percentage, refund_amount, penalty_amount, mutual_agreement,
                 organizer_approved, vendor_approved, cancelled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(cancellation.id)
        .bind(cancellation.booking_id)
        .bind(cancellation.cancelled_by)
        .bind(cancellation.initiator.as_str())
        .bind(&cancellation.reason)
        .bind(cancellation.lead_days)
        .bind(cancellation.refund_percentage)
        .bind(cancellation.refund_amount)
        .bind(cancellation.penalty_amount)
        .bind(cancellation.mutual_agreement)
        .bind(cancellation.organizer_approved)
        .bind(cancellation.vendor_approved)
        .bind(cancellation.cancelled_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if let Some(refund) = refund {
            insert_payment_row(&mut tx, refund).await?;
        }

        sqlx::query(
            r#"
            UPDATE booking_requests
            SET status = 'CANCELLED', updated_at = $2
            WHERE id = $1 AND status = 'ACCEPTED'
            "#,
        )
        .bind(updated.request_id)
        .bind(updated.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(true)
    }
}

/// Read-only view over the platform's vendor and event directories. The
/// workflow treats these as external collaborators; only identity,
/// eligibility and policy facts are read.
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VendorDirectory for PgDirectory {
    async fn vendor(&self, id: Uuid) -> Result<Option<VendorProfile>, WorkflowError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_user_id, display_name, commission_rate,
                   cancellation_policy, active
            FROM vendors WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(|row| {
            Ok(VendorProfile {
                id: row.try_get("id").map_err(db_err)?,
                owner_user_id: row.try_get("owner_user_id").map_err(db_err)?,
                display_name: row.try_get("display_name").map_err(db_err)?,
                commission_rate: row.try_get("commission_rate").map_err(db_err)?,
                cancellation_policy: row.try_get("cancellation_policy").map_err(db_err)?,
                active: row.try_get("active").map_err(db_err)?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl EventDirectory for PgDirectory {
    async fn event(&self, id: Uuid) -> Result<Option<EventSummary>, WorkflowError> {
        let row = sqlx::query(
            "SELECT id, organizer_id, title, created_at FROM events WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(|row| {
            Ok(EventSummary {
                id: row.try_get("id").map_err(db_err)?,
                organizer_id: row.try_get("organizer_id").map_err(db_err)?,
                title: row.try_get("title").map_err(db_err)?,
                created_at: row.try_get("created_at").map_err(db_err)?,
            })
        })
        .transpose()
    }
}

/// Sequence issuer backed by one counter row per `(kind, year)`, advanced
/// with the store's native atomic upsert-and-return. Contention stays
/// scoped to the single key's row.
pub struct PgSequenceIssuer {
    pool: PgPool,
}

impl PgSequenceIssuer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SequenceIssuer for PgSequenceIssuer {
    async fn next(&self, kind: SequenceKind, year: i32) -> Result<String, WorkflowError> {
        let row = sqlx::query(
            r#"
            INSERT INTO sequence_counters (kind, year, value)
            VALUES ($1, $2, 1)
            ON CONFLICT (kind, year)
            DO UPDATE SET value = sequence_counters.value + 1
            RETURNING value
            "#,
        )
        .bind(kind.prefix())
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        let value: i64 = row.try_get("value").map_err(db_err)?;
        Ok(format_sequence(kind, year, value as u64))
    }
}
