use std::sync::Arc;

use chrono::{Datelike, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gala_core::{
    ConflictKind, EventSink, SequenceIssuer, SequenceKind, VendorDirectory, WorkflowError,
};
use gala_shared::events::{
    QuoteAcceptedEvent, QuoteRejectedEvent, RequestQuotedEvent, WorkflowEvent,
};
use gala_shared::Actor;

use crate::bookings::{AcceptanceToken, BookingLifecycle};
use crate::models::{Booking, BookingRequest, Quote, QuoteStatus, RequestStatus};
use crate::pricing::{compute_totals, price_items, NewQuoteItem};
use crate::repository::{QuoteRepository, RequestRepository};

/// Vendor input for a new quote against a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuote {
    pub request_id: Uuid,
    pub items: Vec<NewQuoteItem>,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    pub discount_reason: Option<String>,
    pub deposit_percentage: Decimal,
    pub validity_days: Option<i64>,
    pub notes: Option<String>,
}

/// Vendor input for revising a rejected quote. The revision is a fresh
/// draft with its own number, linked to its predecessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRevision {
    pub items: Vec<NewQuoteItem>,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    pub discount_reason: Option<String>,
    pub deposit_percentage: Decimal,
    pub validity_days: Option<i64>,
    pub notes: Option<String>,
}

/// Builds and prices vendor responses to inquiries and drives the quote
/// state machine through to acceptance or rejection.
pub struct QuoteEngine {
    requests: Arc<dyn RequestRepository>,
    quotes: Arc<dyn QuoteRepository>,
    sequences: Arc<dyn SequenceIssuer>,
    vendors: Arc<dyn VendorDirectory>,
    bookings: Arc<BookingLifecycle>,
    events: Arc<dyn EventSink>,
    default_validity_days: i64,
}

impl QuoteEngine {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        quotes: Arc<dyn QuoteRepository>,
        sequences: Arc<dyn SequenceIssuer>,
        vendors: Arc<dyn VendorDirectory>,
        bookings: Arc<BookingLifecycle>,
        events: Arc<dyn EventSink>,
        default_validity_days: i64,
    ) -> Self {
        Self {
            requests,
            quotes,
            sequences,
            vendors,
            bookings,
            events,
            default_validity_days,
        }
    }

    pub async fn create_quote(&self, actor: Actor, input: NewQuote) -> Result<Quote, WorkflowError> {
        let request = self
            .requests
            .get_request(input.request_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("booking request", input.request_id))?;
        self.check_vendor_access(actor, &request.vendor_id).await?;

        if !matches!(request.status, RequestStatus::Pending | RequestStatus::Quoted) {
            return Err(WorkflowError::conflict(
                ConflictKind::RequestNotQuotable,
                "booking request",
                request.id,
                request.status,
            ));
        }

        let quote = self
            .build_quote(
                &request,
                input.items,
                input.tax_rate,
                input.discount_amount,
                input.discount_reason,
                input.deposit_percentage,
                input.validity_days,
                input.notes,
                1,
                None,
            )
            .await?;
        self.quotes.insert_quote(&quote).await?;

        // First quote moves the request to QUOTED; the CAS loses quietly on
        // every later quote.
        let now = Utc::now();
        let first = self
            .requests
            .set_request_status(request.id, &[RequestStatus::Pending], RequestStatus::Quoted, now)
            .await?;
        if first {
            self.events.publish(WorkflowEvent::RequestQuoted(RequestQuotedEvent {
                request_id: request.id,
                quote_id: quote.id,
                vendor_id: quote.vendor_id,
                timestamp: now.timestamp(),
            }));
        }
        tracing::info!(quote = %quote.quote_number, request = %request.id, "quote created");
        Ok(quote)
    }

    pub async fn send_quote(&self, actor: Actor, quote_id: Uuid) -> Result<Quote, WorkflowError> {
        let quote = self.load_quote(quote_id).await?;
        self.check_vendor_access(actor, &quote.vendor_id).await?;

        let sent = self
            .quotes
            .set_quote_status(quote_id, &[QuoteStatus::Draft], QuoteStatus::Sent, Utc::now(), None)
            .await?;
        if !sent {
            return Err(self.quote_conflict(quote_id, ConflictKind::QuoteNotOpen).await);
        }
        self.load_quote(quote_id).await
    }

    /// Organizer opened the quote. Idempotent: already viewed (or resolved)
    /// quotes are left untouched.
    pub async fn mark_viewed(&self, actor: Actor, quote_id: Uuid) -> Result<Quote, WorkflowError> {
        let quote = self.load_quote(quote_id).await?;
        let request = self.load_request(quote.request_id).await?;
        if request.organizer_id != actor.user_id && !actor.admin {
            return Err(WorkflowError::forbidden("no permission to access this quote"));
        }
        if quote.status == QuoteStatus::Draft {
            // Unsent quotes are invisible to the organizer.
            return Err(WorkflowError::not_found("quote", quote_id));
        }

        if quote.status == QuoteStatus::Sent {
            self.quotes
                .set_quote_status(
                    quote_id,
                    &[QuoteStatus::Sent],
                    QuoteStatus::Viewed,
                    Utc::now(),
                    None,
                )
                .await?;
        }
        self.load_quote(quote_id).await
    }

    /// Accept the quote and create the booking. Atomic and exclusive: the
    /// request closes exactly one quote, concurrent acceptances get exactly
    /// one winner, and any other open quote on the request expires.
    pub async fn accept_quote(&self, actor: Actor, quote_id: Uuid) -> Result<Booking, WorkflowError> {
        let now = Utc::now();
        let quote = self.load_quote(quote_id).await?;
        let request = self.load_request(quote.request_id).await?;

        if request.organizer_id != actor.user_id && !actor.admin {
            return Err(WorkflowError::forbidden("only the organizer can accept a quote"));
        }
        if !quote.status.is_acceptable() {
            let kind = match quote.status {
                QuoteStatus::Expired => ConflictKind::QuoteExpired,
                _ => ConflictKind::QuoteNotOpen,
            };
            return Err(WorkflowError::conflict(kind, "quote", quote_id, quote.status));
        }
        if quote.is_expired(now) {
            // Validity lapsed without the sweep noticing yet; record the
            // expiry and refuse.
            self.quotes
                .set_quote_status(
                    quote_id,
                    &[QuoteStatus::Sent, QuoteStatus::Viewed],
                    QuoteStatus::Expired,
                    now,
                    None,
                )
                .await?;
            return Err(WorkflowError::conflict(
                ConflictKind::QuoteExpired,
                "quote",
                quote_id,
                QuoteStatus::Expired,
            ));
        }

        let booking = self
            .bookings
            .create_from_quote(AcceptanceToken::grant(), &quote, &request, now)
            .await?;

        self.events.publish(WorkflowEvent::QuoteAccepted(QuoteAcceptedEvent {
            quote_id,
            request_id: request.id,
            booking_id: booking.id,
            timestamp: now.timestamp(),
        }));
        Ok(booking)
    }

    pub async fn reject_quote(
        &self,
        actor: Actor,
        quote_id: Uuid,
        reason: Option<String>,
    ) -> Result<Quote, WorkflowError> {
        let now = Utc::now();
        let quote = self.load_quote(quote_id).await?;
        let request = self.load_request(quote.request_id).await?;
        if request.organizer_id != actor.user_id && !actor.admin {
            return Err(WorkflowError::forbidden("only the organizer can reject a quote"));
        }

        let rejected = self
            .quotes
            .set_quote_status(
                quote_id,
                &[QuoteStatus::Sent, QuoteStatus::Viewed],
                QuoteStatus::Rejected,
                now,
                reason,
            )
            .await?;
        if !rejected {
            return Err(self.quote_conflict(quote_id, ConflictKind::QuoteNotOpen).await);
        }

        // Mirror the decision onto the request; a later revision may
        // re-open it.
        self.requests
            .set_request_status(request.id, &[RequestStatus::Quoted], RequestStatus::Rejected, now)
            .await?;

        self.events.publish(WorkflowEvent::QuoteRejected(QuoteRejectedEvent {
            quote_id,
            request_id: request.id,
            timestamp: now.timestamp(),
        }));
        self.load_quote(quote_id).await
    }

    /// Issue a new draft version of a rejected quote, linked through
    /// `previous_quote_id`, and re-open the request for it.
    pub async fn revise_quote(
        &self,
        actor: Actor,
        quote_id: Uuid,
        input: QuoteRevision,
    ) -> Result<Quote, WorkflowError> {
        let original = self.load_quote(quote_id).await?;
        self.check_vendor_access(actor, &original.vendor_id).await?;

        if original.status != QuoteStatus::Rejected {
            return Err(WorkflowError::conflict(
                ConflictKind::QuoteNotOpen,
                "quote",
                quote_id,
                original.status,
            ));
        }
        let request = self.load_request(original.request_id).await?;

        let revision = self
            .build_quote(
                &request,
                input.items,
                input.tax_rate,
                input.discount_amount,
                input.discount_reason,
                input.deposit_percentage,
                input.validity_days,
                input.notes,
                original.version + 1,
                Some(original.id),
            )
            .await?;
        self.quotes.insert_quote(&revision).await?;

        self.requests
            .set_request_status(
                request.id,
                &[RequestStatus::Rejected, RequestStatus::Quoted, RequestStatus::Pending],
                RequestStatus::Quoted,
                Utc::now(),
            )
            .await?;

        tracing::info!(
            quote = %revision.quote_number,
            previous = %original.quote_number,
            version = revision.version,
            "quote revised"
        );
        Ok(revision)
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_quote(
        &self,
        request: &BookingRequest,
        items: Vec<NewQuoteItem>,
        tax_rate: Decimal,
        discount_amount: Decimal,
        discount_reason: Option<String>,
        deposit_percentage: Decimal,
        validity_days: Option<i64>,
        notes: Option<String>,
        version: i32,
        previous_quote_id: Option<Uuid>,
    ) -> Result<Quote, WorkflowError> {
        let validity_days = validity_days.unwrap_or(self.default_validity_days);
        if validity_days <= 0 {
            return Err(WorkflowError::validation("validity must be at least one day"));
        }

        let (items, subtotal) = price_items(&items)?;
        let totals = compute_totals(subtotal, tax_rate, discount_amount, deposit_percentage)?;

        let now = Utc::now();
        let quote_number = self.sequences.next(SequenceKind::Quote, now.year()).await?;
        Ok(Quote {
            id: Uuid::new_v4(),
            request_id: request.id,
            vendor_id: request.vendor_id,
            quote_number,
            version,
            previous_quote_id,
            status: QuoteStatus::Draft,
            items,
            subtotal: totals.subtotal,
            tax_rate,
            tax_amount: totals.tax_amount,
            discount_amount,
            discount_reason,
            total_amount: totals.total_amount,
            currency: request.currency.clone(),
            deposit_percentage,
            deposit_amount: totals.deposit_amount,
            valid_until: now + Duration::days(validity_days),
            notes,
            rejection_reason: None,
            sent_at: None,
            viewed_at: None,
            accepted_at: None,
            rejected_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn load_quote(&self, id: Uuid) -> Result<Quote, WorkflowError> {
        self.quotes
            .get_quote(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("quote", id))
    }

    async fn load_request(&self, id: Uuid) -> Result<BookingRequest, WorkflowError> {
        self.requests
            .get_request(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("booking request", id))
    }

    async fn check_vendor_access(&self, actor: Actor, vendor_id: &Uuid) -> Result<(), WorkflowError> {
        if actor.admin {
            return Ok(());
        }
        let vendor = self
            .vendors
            .vendor(*vendor_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("vendor", vendor_id))?;
        if vendor.owner_user_id == actor.user_id {
            return Ok(());
        }
        Err(WorkflowError::forbidden("only the vendor can perform this action"))
    }

    /// Re-read the quote to attach its authoritative state to a conflict.
    async fn quote_conflict(&self, quote_id: Uuid, kind: ConflictKind) -> WorkflowError {
        let current = match self.quotes.get_quote(quote_id).await {
            Ok(Some(q)) => q.status.to_string(),
            _ => "UNKNOWN".into(),
        };
        WorkflowError::conflict(kind, "quote", quote_id, current)
    }
}
