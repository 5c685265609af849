use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct RequestQuotedEvent {
    pub request_id: Uuid,
    pub quote_id: Uuid,
    pub vendor_id: Uuid,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct QuoteAcceptedEvent {
    pub quote_id: Uuid,
    pub request_id: Uuid,
    pub booking_id: Uuid,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct QuoteRejectedEvent {
    pub quote_id: Uuid,
    pub request_id: Uuid,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub booking_number: String,
    pub vendor_id: Uuid,
    pub organizer_id: Uuid,
    pub total_amount: Decimal,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PaymentRecordedEvent {
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub is_refund: bool,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCompletedEvent {
    pub booking_id: Uuid,
    pub vendor_id: Uuid,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub request_id: Uuid,
    pub refund_amount: Decimal,
    pub penalty_amount: Decimal,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct RequestExpiredEvent {
    pub request_id: Uuid,
    pub timestamp: i64,
}

/// Envelope published to the notification boundary after each successful
/// transition. Delivery is fire-and-forget; the core never awaits it.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    RequestQuoted(RequestQuotedEvent),
    QuoteAccepted(QuoteAcceptedEvent),
    QuoteRejected(QuoteRejectedEvent),
    BookingConfirmed(BookingConfirmedEvent),
    PaymentRecorded(PaymentRecordedEvent),
    BookingCompleted(BookingCompletedEvent),
    BookingCancelled(BookingCancelledEvent),
    RequestExpired(RequestExpiredEvent),
}

impl WorkflowEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            WorkflowEvent::RequestQuoted(_) => "request.quoted",
            WorkflowEvent::QuoteAccepted(_) => "quote.accepted",
            WorkflowEvent::QuoteRejected(_) => "quote.rejected",
            WorkflowEvent::BookingConfirmed(_) => "booking.confirmed",
            WorkflowEvent::PaymentRecorded(_) => "booking.payment_recorded",
            WorkflowEvent::BookingCompleted(_) => "booking.completed",
            WorkflowEvent::BookingCancelled(_) => "booking.cancelled",
            WorkflowEvent::RequestExpired(_) => "request.expired",
        }
    }
}
