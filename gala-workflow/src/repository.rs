use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use gala_core::WorkflowError;

use crate::models::{
    Booking, BookingRequest, Cancellation, Payment, Quote, QuoteStatus, RequestStatus,
};

/// Store contract for booking requests.
///
/// Status transitions are compare-and-set: a write only lands when the
/// current status is still one the caller observed, so the expiry sweep can
/// never regress a request another caller just resolved.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn insert_request(&self, request: &BookingRequest) -> Result<(), WorkflowError>;

    async fn get_request(&self, id: Uuid) -> Result<Option<BookingRequest>, WorkflowError>;

    /// Persist edited fields iff the current status is in `expected`.
    /// Returns false when the request has since moved on.
    async fn update_request_details(
        &self,
        request: &BookingRequest,
        expected: &[RequestStatus],
    ) -> Result<bool, WorkflowError>;

    /// CAS `from` → `to`. Sets `responded_at` when entering QUOTED.
    async fn set_request_status(
        &self,
        id: Uuid,
        from: &[RequestStatus],
        to: RequestStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkflowError>;

    /// Idempotent: flags the request as viewed by the vendor.
    async fn mark_request_viewed(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), WorkflowError>;

    /// Ids of PENDING/QUOTED requests whose `expires_at` has passed.
    async fn list_expiry_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, WorkflowError>;

    /// Atomically CAS PENDING|QUOTED → EXPIRED and expire the request's
    /// open quotes. Returns false when the request was no longer eligible.
    async fn expire_request_with_quotes(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkflowError>;
}

/// Store contract for quotes.
#[async_trait]
pub trait QuoteRepository: Send + Sync {
    /// Inserts a quote. Fails with a QUOTE_ALREADY_OPEN state conflict when
    /// the request already holds another non-terminal quote (one active
    /// quote per request at a time).
    async fn insert_quote(&self, quote: &Quote) -> Result<(), WorkflowError>;

    async fn get_quote(&self, id: Uuid) -> Result<Option<Quote>, WorkflowError>;

    async fn list_quotes_for_request(&self, request_id: Uuid)
        -> Result<Vec<Quote>, WorkflowError>;

    /// CAS `from` → `to`, stamping the matching tracking timestamp
    /// (sent_at/viewed_at/accepted_at/rejected_at) and storing `reason` on
    /// rejection. Returns false when the current status was not in `from`.
    async fn set_quote_status(
        &self,
        id: Uuid,
        from: &[QuoteStatus],
        to: QuoteStatus,
        now: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<bool, WorkflowError>;
}

/// Store contract for bookings, their ledger and their cancellation record.
///
/// The compound operations are the transaction boundaries of the workflow:
/// each commits all of its writes or none of them. Version-checked writes
/// take the version the caller read and refuse to land (returning false)
/// when the row has moved, so read-modify-write cycles retry instead of
/// losing updates. Callers pass the updated row with `version` already
/// bumped by one.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, WorkflowError>;

    async fn list_payments(&self, booking_id: Uuid) -> Result<Vec<Payment>, WorkflowError>;

    async fn get_cancellation(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<Cancellation>, WorkflowError>;

    /// The acceptance transaction: CAS the request PENDING|QUOTED →
    /// ACCEPTED (losers get a REQUEST_ALREADY_RESOLVED conflict carrying
    /// the winning state), CAS the quote SENT|VIEWED → ACCEPTED, expire
    /// every remaining open sibling quote of the request, and insert the
    /// booking. Exactly one concurrent caller can succeed.
    async fn commit_acceptance(
        &self,
        request_id: Uuid,
        quote_id: Uuid,
        booking: &Booking,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError>;

    /// Version-checked full-row update of the organizer-editable fields.
    async fn update_booking_details(
        &self,
        booking: &Booking,
        expected_version: i64,
    ) -> Result<bool, WorkflowError>;

    /// Version-checked CONFIRMED → COMPLETED.
    async fn complete_booking(
        &self,
        id: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
        expected_version: i64,
    ) -> Result<bool, WorkflowError>;

    /// Insert a ledger row and write the re-derived booking amounts in one
    /// transaction, iff the booking still has `expected_version`.
    async fn apply_payment(
        &self,
        payment: &Payment,
        updated: &Booking,
        expected_version: i64,
    ) -> Result<bool, WorkflowError>;

    /// The cancellation transaction: insert the cancellation record, insert
    /// the refund ledger row when present, write the cancelled booking, and
    /// CAS the originating request ACCEPTED → CANCELLED, all iff the
    /// booking still has `expected_version`.
    async fn commit_cancellation(
        &self,
        cancellation: &Cancellation,
        updated: &Booking,
        refund: Option<&Payment>,
        expected_version: i64,
    ) -> Result<bool, WorkflowError>;
}
