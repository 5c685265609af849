use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::WorkflowError;

/// Point-in-time vendor facts supplied by the vendor directory. The
/// workflow snapshots commission rate and cancellation policy at booking
/// creation and never re-reads them afterwards.
#[derive(Debug, Clone)]
pub struct VendorProfile {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub display_name: String,
    /// Platform cut as a fraction, e.g. 0.10 for 10%.
    pub commission_rate: Decimal,
    pub cancellation_policy: String,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct EventSummary {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait VendorDirectory: Send + Sync {
    async fn vendor(&self, id: Uuid) -> Result<Option<VendorProfile>, WorkflowError>;
}

#[async_trait]
pub trait EventDirectory: Send + Sync {
    async fn event(&self, id: Uuid) -> Result<Option<EventSummary>, WorkflowError>;
}
