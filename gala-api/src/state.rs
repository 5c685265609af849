use std::sync::Arc;

use gala_store::EventBus;
use gala_workflow::{
    BookingLifecycle, CancellationPolicyEngine, PaymentLedger, QuoteEngine, RequestLifecycle,
};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub requests: Arc<RequestLifecycle>,
    pub quotes: Arc<QuoteEngine>,
    pub bookings: Arc<BookingLifecycle>,
    pub ledger: Arc<PaymentLedger>,
    pub cancellations: Arc<CancellationPolicyEngine>,
    pub bus: EventBus,
    pub auth: AuthConfig,
}
