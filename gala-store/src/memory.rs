use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use gala_core::{
    format_sequence, ConflictKind, EventDirectory, EventSummary, SequenceIssuer, SequenceKind,
    VendorDirectory, VendorProfile, WorkflowError,
};
use gala_workflow::models::{
    Booking, BookingRequest, Cancellation, Payment, Quote, QuoteStatus, RequestStatus,
};
use gala_workflow::repository::{BookingRepository, QuoteRepository, RequestRepository};

#[derive(Default)]
struct Inner {
    requests: HashMap<Uuid, BookingRequest>,
    quotes: HashMap<Uuid, Quote>,
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
    cancellations: HashMap<Uuid, Cancellation>,
}

/// In-memory store for tests and local runs. Every compound operation runs
/// under a single write guard, which gives it the same all-or-nothing and
/// compare-and-set semantics the Postgres store gets from transactions.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestRepository for MemoryStore {
    async fn insert_request(&self, request: &BookingRequest) -> Result<(), WorkflowError> {
        let mut inner = self.inner.write().await;
        inner.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<BookingRequest>, WorkflowError> {
        Ok(self.inner.read().await.requests.get(&id).cloned())
    }

    async fn update_request_details(
        &self,
        request: &BookingRequest,
        expected: &[RequestStatus],
    ) -> Result<bool, WorkflowError> {
        let mut inner = self.inner.write().await;
        match inner.requests.get_mut(&request.id) {
            Some(current) if expected.contains(&current.status) => {
                let status = current.status;
                *current = request.clone();
                current.status = status;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(WorkflowError::not_found("booking request", request.id)),
        }
    }

    async fn set_request_status(
        &self,
        id: Uuid,
        from: &[RequestStatus],
        to: RequestStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkflowError> {
        let mut inner = self.inner.write().await;
        match inner.requests.get_mut(&id) {
            Some(request) if from.contains(&request.status) => {
                request.status = to;
                if to == RequestStatus::Quoted && request.responded_at.is_none() {
                    request.responded_at = Some(now);
                }
                request.updated_at = now;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(WorkflowError::not_found("booking request", id)),
        }
    }

    async fn mark_request_viewed(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        let mut inner = self.inner.write().await;
        let request = inner
            .requests
            .get_mut(&id)
            .ok_or_else(|| WorkflowError::not_found("booking request", id))?;
        request.viewed_by_vendor = true;
        if request.viewed_at.is_none() {
            request.viewed_at = Some(now);
            request.updated_at = now;
        }
        Ok(())
    }

    async fn list_expiry_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, WorkflowError> {
        let inner = self.inner.read().await;
        Ok(inner
            .requests
            .values()
            .filter(|r| {
                matches!(r.status, RequestStatus::Pending | RequestStatus::Quoted)
                    && r.expires_at < now
            })
            .map(|r| r.id)
            .collect())
    }

    async fn expire_request_with_quotes(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkflowError> {
        let mut inner = self.inner.write().await;
        match inner.requests.get_mut(&id) {
            Some(request)
                if matches!(request.status, RequestStatus::Pending | RequestStatus::Quoted) =>
            {
                request.status = RequestStatus::Expired;
                request.updated_at = now;
            }
            Some(_) => return Ok(false),
            None => return Err(WorkflowError::not_found("booking request", id)),
        }
        for quote in inner.quotes.values_mut() {
            if quote.request_id == id && quote.status.is_open() {
                quote.status = QuoteStatus::Expired;
                quote.updated_at = now;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl QuoteRepository for MemoryStore {
    async fn insert_quote(&self, quote: &Quote) -> Result<(), WorkflowError> {
        let mut inner = self.inner.write().await;
        if let Some(open) = inner
            .quotes
            .values()
            .find(|q| q.request_id == quote.request_id && q.status.is_open())
        {
            return Err(WorkflowError::conflict(
                ConflictKind::QuoteAlreadyOpen,
                "quote",
                open.id,
                open.status,
            ));
        }
        inner.quotes.insert(quote.id, quote.clone());
        Ok(())
    }

    async fn get_quote(&self, id: Uuid) -> Result<Option<Quote>, WorkflowError> {
        Ok(self.inner.read().await.quotes.get(&id).cloned())
    }

    async fn list_quotes_for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<Quote>, WorkflowError> {
        let inner = self.inner.read().await;
        let mut quotes: Vec<Quote> = inner
            .quotes
            .values()
            .filter(|q| q.request_id == request_id)
            .cloned()
            .collect();
        quotes.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(quotes)
    }

    async fn set_quote_status(
        &self,
        id: Uuid,
        from: &[QuoteStatus],
        to: QuoteStatus,
        now: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<bool, WorkflowError> {
        let mut inner = self.inner.write().await;
        match inner.quotes.get_mut(&id) {
            Some(quote) if from.contains(&quote.status) => {
                quote.status = to;
                quote.updated_at = now;
                match to {
                    QuoteStatus::Sent => quote.sent_at = Some(now),
                    QuoteStatus::Viewed => quote.viewed_at = Some(now),
                    QuoteStatus::Accepted => quote.accepted_at = Some(now),
                    QuoteStatus::Rejected => {
                        quote.rejected_at = Some(now);
                        if reason.is_some() {
                            quote.rejection_reason = reason;
                        }
                    }
                    _ => {}
                }
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(WorkflowError::not_found("quote", id)),
        }
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, WorkflowError> {
        Ok(self.inner.read().await.bookings.get(&id).cloned())
    }

    async fn list_payments(&self, booking_id: Uuid) -> Result<Vec<Payment>, WorkflowError> {
        let inner = self.inner.read().await;
        let mut payments: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn get_cancellation(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<Cancellation>, WorkflowError> {
        Ok(self.inner.read().await.cancellations.get(&booking_id).cloned())
    }

    async fn commit_acceptance(
        &self,
        request_id: Uuid,
        quote_id: Uuid,
        booking: &Booking,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        let mut inner = self.inner.write().await;

        let request_status = inner
            .requests
            .get(&request_id)
            .map(|r| r.status)
            .ok_or_else(|| WorkflowError::not_found("booking request", request_id))?;
        if !matches!(request_status, RequestStatus::Pending | RequestStatus::Quoted) {
            return Err(WorkflowError::conflict(
                ConflictKind::RequestAlreadyResolved,
                "booking request",
                request_id,
                request_status,
            ));
        }

        let quote_status = inner
            .quotes
            .get(&quote_id)
            .map(|q| q.status)
            .ok_or_else(|| WorkflowError::not_found("quote", quote_id))?;
        if !quote_status.is_acceptable() {
            return Err(WorkflowError::conflict(
                ConflictKind::QuoteNotOpen,
                "quote",
                quote_id,
                quote_status,
            ));
        }

        for quote in inner.quotes.values_mut() {
            if quote.id == quote_id {
                quote.status = QuoteStatus::Accepted;
                quote.accepted_at = Some(now);
                quote.updated_at = now;
            } else if quote.request_id == request_id && quote.status.is_open() {
                quote.status = QuoteStatus::Expired;
                quote.updated_at = now;
            }
        }

        if let Some(request) = inner.requests.get_mut(&request_id) {
            request.status = RequestStatus::Accepted;
            if request.responded_at.is_none() {
                request.responded_at = Some(now);
            }
            request.updated_at = now;
        }

        inner.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn update_booking_details(
        &self,
        booking: &Booking,
        expected_version: i64,
    ) -> Result<bool, WorkflowError> {
        let mut inner = self.inner.write().await;
        match inner.bookings.get_mut(&booking.id) {
            Some(current) if current.version == expected_version => {
                *current = booking.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(WorkflowError::not_found("booking", booking.id)),
        }
    }

    async fn complete_booking(
        &self,
        id: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
        expected_version: i64,
    ) -> Result<bool, WorkflowError> {
        let mut inner = self.inner.write().await;
        match inner.bookings.get_mut(&id) {
            Some(booking)
                if booking.version == expected_version
                    && booking.status == gala_workflow::models::BookingStatus::Confirmed =>
            {
                booking.status = gala_workflow::models::BookingStatus::Completed;
                booking.completed_at = Some(now);
                booking.completion_notes = notes;
                booking.version += 1;
                booking.updated_at = now;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(WorkflowError::not_found("booking", id)),
        }
    }

    async fn apply_payment(
        &self,
        payment: &Payment,
        updated: &Booking,
        expected_version: i64,
    ) -> Result<bool, WorkflowError> {
        let mut inner = self.inner.write().await;
        match inner.bookings.get(&updated.id) {
            Some(current) if current.version == expected_version => {}
            Some(_) => return Ok(false),
            None => return Err(WorkflowError::not_found("booking", updated.id)),
        }
        inner.payments.insert(payment.id, payment.clone());
        inner.bookings.insert(updated.id, updated.clone());
        Ok(true)
    }

    async fn commit_cancellation(
        &self,
        cancellation: &Cancellation,
        updated: &Booking,
        refund: Option<&Payment>,
        expected_version: i64,
    ) -> Result<bool, WorkflowError> {
        let mut inner = self.inner.write().await;
        match inner.bookings.get(&updated.id) {
            Some(current) if current.version == expected_version => {}
            Some(_) => return Ok(false),
            None => return Err(WorkflowError::not_found("booking", updated.id)),
        }
        inner.cancellations.insert(cancellation.booking_id, cancellation.clone());
        if let Some(refund) = refund {
            inner.payments.insert(refund.id, refund.clone());
        }
        inner.bookings.insert(updated.id, updated.clone());

        let request_id = updated.request_id;
        if let Some(request) = inner.requests.get_mut(&request_id) {
            if request.status == RequestStatus::Accepted {
                request.status = RequestStatus::Cancelled;
                request.updated_at = updated.updated_at;
            }
        }
        Ok(true)
    }
}

/// Per-`(kind, year)` counters behind a mutex.
#[derive(Default)]
pub struct MemorySequenceIssuer {
    counters: Mutex<HashMap<(SequenceKind, i32), u64>>,
}

impl MemorySequenceIssuer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SequenceIssuer for MemorySequenceIssuer {
    async fn next(&self, kind: SequenceKind, year: i32) -> Result<String, WorkflowError> {
        let mut counters = self.counters.lock().await;
        let value = counters.entry((kind, year)).or_insert(0);
        *value += 1;
        Ok(format_sequence(kind, year, *value))
    }
}

/// Seedable vendor/event directory for tests and local runs.
#[derive(Default)]
pub struct MemoryDirectory {
    vendors: RwLock<HashMap<Uuid, VendorProfile>>,
    events: RwLock<HashMap<Uuid, EventSummary>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_vendor(&self, vendor: VendorProfile) {
        self.vendors.write().await.insert(vendor.id, vendor);
    }

    pub async fn put_event(&self, event: EventSummary) {
        self.events.write().await.insert(event.id, event);
    }
}

#[async_trait]
impl VendorDirectory for MemoryDirectory {
    async fn vendor(&self, id: Uuid) -> Result<Option<VendorProfile>, WorkflowError> {
        Ok(self.vendors.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl EventDirectory for MemoryDirectory {
    async fn event(&self, id: Uuid) -> Result<Option<EventSummary>, WorkflowError> {
        Ok(self.events.read().await.get(&id).cloned())
    }
}
