use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cancellation::RefundSchedule;

/// Status of an organizer's inquiry to a vendor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Draft,
    Pending,
    Quoted,
    Accepted,
    Rejected,
    Expired,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Draft => "DRAFT",
            RequestStatus::Pending => "PENDING",
            RequestStatus::Quoted => "QUOTED",
            RequestStatus::Accepted => "ACCEPTED",
            RequestStatus::Rejected => "REJECTED",
            RequestStatus::Expired => "EXPIRED",
            RequestStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(RequestStatus::Draft),
            "PENDING" => Some(RequestStatus::Pending),
            "QUOTED" => Some(RequestStatus::Quoted),
            "ACCEPTED" => Some(RequestStatus::Accepted),
            "REJECTED" => Some(RequestStatus::Rejected),
            "EXPIRED" => Some(RequestStatus::Expired),
            "CANCELLED" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Accepted
                | RequestStatus::Rejected
                | RequestStatus::Expired
                | RequestStatus::Cancelled
        )
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Viewed,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "DRAFT",
            QuoteStatus::Sent => "SENT",
            QuoteStatus::Viewed => "VIEWED",
            QuoteStatus::Accepted => "ACCEPTED",
            QuoteStatus::Rejected => "REJECTED",
            QuoteStatus::Expired => "EXPIRED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(QuoteStatus::Draft),
            "SENT" => Some(QuoteStatus::Sent),
            "VIEWED" => Some(QuoteStatus::Viewed),
            "ACCEPTED" => Some(QuoteStatus::Accepted),
            "REJECTED" => Some(QuoteStatus::Rejected),
            "EXPIRED" => Some(QuoteStatus::Expired),
            _ => None,
        }
    }

    /// Open quotes are the ones still in play: not yet accepted, rejected
    /// or expired.
    pub fn is_open(&self) -> bool {
        matches!(self, QuoteStatus::Draft | QuoteStatus::Sent | QuoteStatus::Viewed)
    }

    /// States from which an organizer may act on the quote.
    pub fn is_acceptable(&self) -> bool {
        matches!(self, QuoteStatus::Sent | QuoteStatus::Viewed)
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "COMPLETED" => Some(BookingStatus::Completed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate payment position of a booking, derived from the ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    DepositPaid,
    Partial,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::DepositPaid => "DEPOSIT_PAID",
            PaymentStatus::Partial => "PARTIAL",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "DEPOSIT_PAID" => Some(PaymentStatus::DepositPaid),
            "PARTIAL" => Some(PaymentStatus::Partial),
            "PAID" => Some(PaymentStatus::Paid),
            "REFUNDED" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single ledger entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Pending,
    Succeeded,
    Failed,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "PENDING",
            PaymentState::Succeeded => "SUCCEEDED",
            PaymentState::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentState::Pending),
            "SUCCEEDED" => Some(PaymentState::Succeeded),
            "FAILED" => Some(PaymentState::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationInitiator {
    Organizer,
    Vendor,
    Admin,
    System,
}

impl CancellationInitiator {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationInitiator::Organizer => "ORGANIZER",
            CancellationInitiator::Vendor => "VENDOR",
            CancellationInitiator::Admin => "ADMIN",
            CancellationInitiator::System => "SYSTEM",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ORGANIZER" => Some(CancellationInitiator::Organizer),
            "VENDOR" => Some(CancellationInitiator::Vendor),
            "ADMIN" => Some(CancellationInitiator::Admin),
            "SYSTEM" => Some(CancellationInitiator::System),
            _ => None,
        }
    }
}

/// An organizer's inquiry to one vendor for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub id: Uuid,
    pub event_id: Uuid,
    pub vendor_id: Uuid,
    pub organizer_id: Uuid,
    pub status: RequestStatus,
    pub title: String,
    pub description: String,
    pub event_date: DateTime<Utc>,
    pub event_end_date: Option<DateTime<Utc>>,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub guest_count: Option<i32>,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub currency: String,
    pub response_deadline: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub viewed_by_vendor: bool,
    pub viewed_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingRequest {
    /// End of the event window; single-day events end on the event date.
    pub fn event_end(&self) -> DateTime<Utc> {
        self.event_end_date.unwrap_or(self.event_date)
    }
}

/// One priced line within a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Per-item discount in percent, 0..=100.
    pub discount_percentage: Decimal,
    pub line_total: Decimal,
}

/// A vendor's priced, time-bounded proposal against a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub id: Uuid,
    pub request_id: Uuid,
    pub vendor_id: Uuid,
    pub quote_number: String,
    pub version: i32,
    pub previous_quote_id: Option<Uuid>,
    pub status: QuoteStatus,
    pub items: Vec<QuoteItem>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub discount_reason: Option<String>,
    pub total_amount: Decimal,
    pub currency: String,
    pub deposit_percentage: Decimal,
    pub deposit_amount: Decimal,
    pub valid_until: DateTime<Utc>,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_until
    }
}

/// The confirmed transaction, created exactly once per accepted quote.
/// Mutated only through the lifecycle operations; every write to the
/// financial fields goes through a version check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub booking_number: String,
    pub request_id: Uuid,
    pub quote_id: Uuid,
    pub event_id: Uuid,
    pub vendor_id: Uuid,
    pub organizer_id: Uuid,
    pub status: BookingStatus,
    pub event_date: DateTime<Utc>,
    pub event_end_date: Option<DateTime<Utc>>,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub guest_count: Option<i32>,
    pub total_amount: Decimal,
    pub deposit_amount: Decimal,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub currency: String,
    pub payment_status: PaymentStatus,
    /// Platform cut, fixed from the vendor's rate at creation time.
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    /// Vendor's cancellation policy text, snapshotted at creation.
    pub cancellation_policy: String,
    /// Refund tier table snapshotted at creation; cancellation consults
    /// this, never the live configuration.
    pub refund_schedule: RefundSchedule,
    pub organizer_notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completion_notes: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn event_end(&self) -> DateTime<Utc> {
        self.event_end_date.unwrap_or(self.event_date)
    }

    /// "In progress" is time-derived, never stored: a confirmed booking
    /// whose event window contains `now`.
    pub fn in_progress(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Confirmed
            && now >= self.event_date
            && now <= self.event_end()
    }
}

/// One monetary movement against a booking: a charge, or a refund when
/// `is_refund` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub payment_number: String,
    pub booking_id: Uuid,
    pub payer_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub is_deposit: bool,
    pub is_refund: bool,
    pub state: PaymentState,
    pub original_payment_id: Option<Uuid>,
    pub refund_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Cancellation record, one-to-one with a cancelled booking. The refund
/// split is computed once at cancellation time and is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cancellation {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub cancelled_by: Uuid,
    pub initiator: CancellationInitiator,
    pub reason: String,
    /// Whole days between cancellation and the event.
    pub lead_days: i64,
    pub refund_percentage: Decimal,
    pub refund_amount: Decimal,
    pub penalty_amount: Decimal,
    pub mutual_agreement: bool,
    pub organizer_approved: bool,
    pub vendor_approved: bool,
    pub cancelled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn booking_at(event_date: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            booking_number: "B-2025-00001".into(),
            request_id: Uuid::new_v4(),
            quote_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            organizer_id: Uuid::new_v4(),
            status: BookingStatus::Confirmed,
            event_date,
            event_end_date: end,
            venue_name: None,
            venue_address: None,
            guest_count: None,
            total_amount: dec!(1500),
            deposit_amount: dec!(450),
            amount_paid: dec!(0),
            amount_due: dec!(1500),
            currency: "EUR".into(),
            payment_status: PaymentStatus::Pending,
            commission_rate: dec!(0.10),
            commission_amount: dec!(150.00),
            cancellation_policy: String::new(),
            refund_schedule: RefundSchedule::default(),
            organizer_notes: None,
            completed_at: None,
            completion_notes: None,
            cancelled_at: None,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn in_progress_is_time_derived() {
        let now = Utc::now();
        let running = booking_at(now - Duration::hours(1), Some(now + Duration::hours(3)));
        assert!(running.in_progress(now));

        let upcoming = booking_at(now + Duration::days(2), None);
        assert!(!upcoming.in_progress(now));

        let mut cancelled = booking_at(now - Duration::hours(1), Some(now + Duration::hours(3)));
        cancelled.status = BookingStatus::Cancelled;
        assert!(!cancelled.in_progress(now));
    }

    #[test]
    fn open_and_terminal_statuses() {
        assert!(QuoteStatus::Draft.is_open());
        assert!(QuoteStatus::Viewed.is_open());
        assert!(!QuoteStatus::Accepted.is_open());
        assert!(QuoteStatus::Viewed.is_acceptable());
        assert!(!QuoteStatus::Draft.is_acceptable());
        assert!(RequestStatus::Accepted.is_terminal());
        assert!(!RequestStatus::Quoted.is_terminal());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for s in [
            RequestStatus::Draft,
            RequestStatus::Pending,
            RequestStatus::Quoted,
            RequestStatus::Accepted,
            RequestStatus::Rejected,
            RequestStatus::Expired,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(RequestStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(PaymentStatus::from_str("DEPOSIT_PAID"), Some(PaymentStatus::DepositPaid));
        assert_eq!(QuoteStatus::from_str("NOPE"), None);
    }
}
