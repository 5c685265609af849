#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use gala_core::{EventSummary, NullSink, VendorProfile};
use gala_shared::Actor;
use gala_store::{MemoryDirectory, MemorySequenceIssuer, MemoryStore};
use gala_workflow::pricing::NewQuoteItem;
use gala_workflow::{
    Booking, BookingLifecycle, CancellationPolicyEngine, NewQuote, NewRequest, PaymentLedger,
    Quote, QuoteEngine, RefundSchedule, RequestLifecycle,
};

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub sequences: Arc<MemorySequenceIssuer>,
    pub directory: Arc<MemoryDirectory>,
    pub requests: Arc<RequestLifecycle>,
    pub quotes: Arc<QuoteEngine>,
    pub bookings: Arc<BookingLifecycle>,
    pub ledger: Arc<PaymentLedger>,
    pub cancellations: Arc<CancellationPolicyEngine>,
    pub organizer: Actor,
    pub vendor_owner: Actor,
    pub outsider: Actor,
    pub vendor_id: Uuid,
    pub event_id: Uuid,
}

pub async fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let sequences = Arc::new(MemorySequenceIssuer::new());
    let directory = Arc::new(MemoryDirectory::new());
    let sink = Arc::new(NullSink);

    let organizer = Actor::user(Uuid::new_v4());
    let vendor_owner = Actor::user(Uuid::new_v4());
    let outsider = Actor::user(Uuid::new_v4());
    let vendor_id = Uuid::new_v4();
    let event_id = Uuid::new_v4();

    directory
        .put_vendor(VendorProfile {
            id: vendor_id,
            owner_user_id: vendor_owner.user_id,
            display_name: "Velvet Catering".into(),
            commission_rate: dec!(0.10),
            cancellation_policy: "Tiered refunds by lead time.".into(),
            active: true,
        })
        .await;
    directory
        .put_event(EventSummary {
            id: event_id,
            organizer_id: organizer.user_id,
            title: "Rooftop reception".into(),
            created_at: Utc::now(),
        })
        .await;

    let requests = Arc::new(RequestLifecycle::new(
        store.clone(),
        directory.clone(),
        directory.clone(),
        sink.clone(),
        30,
    ));
    let bookings = Arc::new(BookingLifecycle::new(
        store.clone(),
        sequences.clone(),
        directory.clone(),
        sink.clone(),
        RefundSchedule::default(),
    ));
    let quotes = Arc::new(QuoteEngine::new(
        store.clone(),
        store.clone(),
        sequences.clone(),
        directory.clone(),
        bookings.clone(),
        sink.clone(),
        14,
    ));
    let ledger = Arc::new(PaymentLedger::new(
        store.clone(),
        directory.clone(),
        sequences.clone(),
        sink.clone(),
    ));
    let cancellations = Arc::new(CancellationPolicyEngine::new(
        store.clone(),
        directory.clone(),
        ledger.clone(),
        sink.clone(),
    ));

    Harness {
        store,
        sequences,
        directory,
        requests,
        quotes,
        bookings,
        ledger,
        cancellations,
        organizer,
        vendor_owner,
        outsider,
        vendor_id,
        event_id,
    }
}

/// Inquiry for an event `days_out` days from now (plus a two-hour guard so
/// truncating lead-time math lands on exactly `days_out`).
pub fn request_input(h: &Harness, days_out: i64) -> NewRequest {
    let event_date = Utc::now() + Duration::days(days_out) + Duration::hours(2);
    NewRequest {
        event_id: h.event_id,
        vendor_id: h.vendor_id,
        title: "Catering for 80 guests".into(),
        description: "Three-course dinner with service staff.".into(),
        event_date,
        event_end_date: Some(event_date + Duration::hours(6)),
        venue_name: Some("Glasshouse Hall".into()),
        venue_address: None,
        guest_count: Some(80),
        budget_min: Some(dec!(1000)),
        budget_max: Some(dec!(2000)),
        currency: "EUR".into(),
        response_deadline: None,
    }
}

pub fn quote_input(request_id: Uuid, total: Decimal, deposit_pct: Decimal) -> NewQuote {
    NewQuote {
        request_id,
        items: vec![NewQuoteItem {
            name: "Dinner service".into(),
            description: None,
            quantity: dec!(1),
            unit_price: total,
            discount_percentage: dec!(0),
        }],
        tax_rate: dec!(0),
        discount_amount: dec!(0),
        discount_reason: None,
        deposit_percentage: deposit_pct,
        validity_days: None,
        notes: None,
    }
}

/// Request → quote (sent) for an event `days_out` days from now.
pub async fn sent_quote(h: &Harness, days_out: i64, total: Decimal) -> (Uuid, Quote) {
    let request = h
        .requests
        .create_request(h.organizer, request_input(h, days_out))
        .await
        .expect("create request");
    let quote = h
        .quotes
        .create_quote(h.vendor_owner, quote_input(request.id, total, dec!(30)))
        .await
        .expect("create quote");
    let quote = h.quotes.send_quote(h.vendor_owner, quote.id).await.expect("send quote");
    (request.id, quote)
}

/// Full happy path up to a confirmed booking with the deposit paid.
pub async fn booked_with_deposit(h: &Harness, days_out: i64) -> Booking {
    let (_, quote) = sent_quote(h, days_out, dec!(1500)).await;
    let booking = h.quotes.accept_quote(h.organizer, quote.id).await.expect("accept quote");
    h.ledger
        .record_payment(h.organizer, booking.id, dec!(450), true, None)
        .await
        .expect("pay deposit");
    h.bookings.get_booking(h.organizer, booking.id).await.expect("reload booking")
}

pub fn far_future(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}
