pub mod bookings;
pub mod cancellation;
pub mod ledger;
pub mod models;
pub mod pricing;
pub mod quotes;
pub mod repository;
pub mod requests;

pub use bookings::{AcceptanceToken, BookingChanges, BookingLifecycle};
pub use cancellation::{CancellationPolicyEngine, RefundSchedule, RefundTier};
pub use ledger::{derive_payment_status, PaymentLedger};
pub use models::{
    Booking, BookingRequest, BookingStatus, Cancellation, CancellationInitiator, Payment,
    PaymentState, PaymentStatus, Quote, QuoteItem, QuoteStatus, RequestStatus,
};
pub use quotes::{NewQuote, QuoteEngine, QuoteRevision};
pub use requests::{NewRequest, RequestChanges, RequestLifecycle};
