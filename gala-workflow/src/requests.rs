use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gala_core::{
    ConflictKind, EventDirectory, EventSink, VendorDirectory, WorkflowError,
};
use gala_shared::events::{RequestExpiredEvent, WorkflowEvent};
use gala_shared::money::{is_minor_exact, valid_currency};
use gala_shared::Actor;

use crate::models::{BookingRequest, RequestStatus};
use crate::repository::RequestRepository;

/// Organizer input for a new inquiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRequest {
    pub event_id: Uuid,
    pub vendor_id: Uuid,
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
}

/// Organizer edits; only set fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<DateTime<Utc>>,
    pub event_end_date: Option<DateTime<Utc>>,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub guest_count: Option<i32>,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub response_deadline: Option<DateTime<Utc>>,
}

/// Manages the inquiry state machine from creation to its terminal state.
pub struct RequestLifecycle {
    requests: Arc<dyn RequestRepository>,
    vendors: Arc<dyn VendorDirectory>,
    event_directory: Arc<dyn EventDirectory>,
    events: Arc<dyn EventSink>,
    /// Untouched requests expire this many days after creation.
    expiry_days: i64,
}

impl RequestLifecycle {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        vendors: Arc<dyn VendorDirectory>,
        event_directory: Arc<dyn EventDirectory>,
        events: Arc<dyn EventSink>,
        expiry_days: i64,
    ) -> Self {
        Self { requests, vendors, event_directory, events, expiry_days }
    }

    pub async fn create_request(
        &self,
        actor: Actor,
        input: NewRequest,
    ) -> Result<BookingRequest, WorkflowError> {
        let now = Utc::now();
        validate_texts(&input.title, &input.description)?;
        validate_schedule(input.event_date, input.event_end_date, now)?;
        validate_budget(input.budget_min, input.budget_max)?;
        if !valid_currency(&input.currency) {
            return Err(WorkflowError::validation(format!(
                "invalid currency code '{}'",
                input.currency
            )));
        }
        if let Some(count) = input.guest_count {
            if count <= 0 {
                return Err(WorkflowError::validation("guest count must be positive"));
            }
        }
        if let Some(deadline) = input.response_deadline {
            if deadline <= now {
                return Err(WorkflowError::validation("response deadline is already past"));
            }
        }

        let event = self
            .event_directory
            .event(input.event_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("event", input.event_id))?;
        if event.organizer_id != actor.user_id && !actor.admin {
            return Err(WorkflowError::forbidden("event does not belong to the caller"));
        }

        let vendor = self
            .vendors
            .vendor(input.vendor_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("vendor", input.vendor_id))?;
        if !vendor.active {
            return Err(WorkflowError::validation(
                "vendor is not currently accepting bookings",
            ));
        }

        let request = BookingRequest {
            id: Uuid::new_v4(),
            event_id: input.event_id,
            vendor_id: input.vendor_id,
            organizer_id: event.organizer_id,
            status: RequestStatus::Pending,
            title: input.title,
            description: input.description,
            event_date: input.event_date,
            event_end_date: input.event_end_date,
            venue_name: input.venue_name,
            venue_address: input.venue_address,
            guest_count: input.guest_count,
            budget_min: input.budget_min,
            budget_max: input.budget_max,
            currency: input.currency,
            response_deadline: input.response_deadline,
            expires_at: input
                .response_deadline
                .unwrap_or(now + Duration::days(self.expiry_days)),
            viewed_by_vendor: false,
            viewed_at: None,
            responded_at: None,
            created_at: now,
            updated_at: now,
        };
        self.requests.insert_request(&request).await?;
        tracing::info!(request = %request.id, vendor = %request.vendor_id, "booking request created");
        Ok(request)
    }

    pub async fn get_request(
        &self,
        actor: Actor,
        id: Uuid,
    ) -> Result<BookingRequest, WorkflowError> {
        let request = self
            .requests
            .get_request(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("booking request", id))?;
        self.check_party_access(actor, &request).await?;
        Ok(request)
    }

    pub async fn update_request(
        &self,
        actor: Actor,
        id: Uuid,
        changes: RequestChanges,
    ) -> Result<BookingRequest, WorkflowError> {
        let now = Utc::now();
        let mut request = self
            .requests
            .get_request(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("booking request", id))?;

        if request.organizer_id != actor.user_id && !actor.admin {
            return Err(WorkflowError::forbidden("only the organizer can edit the request"));
        }
        if !matches!(request.status, RequestStatus::Draft | RequestStatus::Pending) {
            return Err(WorkflowError::conflict(
                ConflictKind::RequestNotEditable,
                "booking request",
                id,
                request.status,
            ));
        }

        if let Some(title) = changes.title {
            request.title = title;
        }
        if let Some(description) = changes.description {
            request.description = description;
        }
        if let Some(date) = changes.event_date {
            request.event_date = date;
        }
        if changes.event_end_date.is_some() {
            request.event_end_date = changes.event_end_date;
        }
        if changes.venue_name.is_some() {
            request.venue_name = changes.venue_name;
        }
        if changes.venue_address.is_some() {
            request.venue_address = changes.venue_address;
        }
        if changes.guest_count.is_some() {
            request.guest_count = changes.guest_count;
        }
        if changes.budget_min.is_some() {
            request.budget_min = changes.budget_min;
        }
        if changes.budget_max.is_some() {
            request.budget_max = changes.budget_max;
        }
        if let Some(deadline) = changes.response_deadline {
            if deadline <= now {
                return Err(WorkflowError::validation("response deadline is already past"));
            }
            request.response_deadline = Some(deadline);
            request.expires_at = deadline;
        }

        validate_texts(&request.title, &request.description)?;
        validate_schedule(request.event_date, request.event_end_date, now)?;
        validate_budget(request.budget_min, request.budget_max)?;
        if let Some(count) = request.guest_count {
            if count <= 0 {
                return Err(WorkflowError::validation("guest count must be positive"));
            }
        }
        request.updated_at = now;

        let landed = self
            .requests
            .update_request_details(&request, &[RequestStatus::Draft, RequestStatus::Pending])
            .await?;
        if !landed {
            let current = self
                .requests
                .get_request(id)
                .await?
                .map(|r| r.status.to_string())
                .unwrap_or_else(|| "UNKNOWN".into());
            return Err(WorkflowError::conflict(
                ConflictKind::RequestNotEditable,
                "booking request",
                id,
                current,
            ));
        }
        Ok(request)
    }

    pub async fn mark_viewed_by_vendor(
        &self,
        actor: Actor,
        id: Uuid,
    ) -> Result<BookingRequest, WorkflowError> {
        let request = self
            .requests
            .get_request(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("booking request", id))?;
        self.check_vendor_access(actor, &request).await?;

        self.requests.mark_request_viewed(id, Utc::now()).await?;
        self.requests
            .get_request(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("booking request", id))
    }

    /// Expire every PENDING/QUOTED request past its deadline, cascading to
    /// its open quotes. Idempotent and safe to run concurrently with
    /// accept/reject: the store only transitions rows still in an eligible
    /// state. Returns how many requests were expired by this run.
    pub async fn expire_stale_requests(&self, now: DateTime<Utc>) -> Result<usize, WorkflowError> {
        let candidates = self.requests.list_expiry_candidates(now).await?;
        let mut expired = 0;
        for id in candidates {
            if self.requests.expire_request_with_quotes(id, now).await? {
                expired += 1;
                self.events.publish(WorkflowEvent::RequestExpired(RequestExpiredEvent {
                    request_id: id,
                    timestamp: now.timestamp(),
                }));
            }
        }
        if expired > 0 {
            tracing::info!(count = expired, "expired stale booking requests");
        }
        Ok(expired)
    }

    async fn check_party_access(
        &self,
        actor: Actor,
        request: &BookingRequest,
    ) -> Result<(), WorkflowError> {
        if actor.admin || actor.user_id == request.organizer_id {
            return Ok(());
        }
        if let Some(vendor) = self.vendors.vendor(request.vendor_id).await? {
            if vendor.owner_user_id == actor.user_id {
                return Ok(());
            }
        }
        Err(WorkflowError::forbidden("no permission to access this booking request"))
    }

    async fn check_vendor_access(
        &self,
        actor: Actor,
        request: &BookingRequest,
    ) -> Result<(), WorkflowError> {
        if actor.admin {
            return Ok(());
        }
        if let Some(vendor) = self.vendors.vendor(request.vendor_id).await? {
            if vendor.owner_user_id == actor.user_id {
                return Ok(());
            }
        }
        Err(WorkflowError::forbidden("only the vendor can perform this action"))
    }
}

fn validate_texts(title: &str, description: &str) -> Result<(), WorkflowError> {
    if title.trim().is_empty() {
        return Err(WorkflowError::validation("title must not be empty"));
    }
    if description.trim().is_empty() {
        return Err(WorkflowError::validation("description must not be empty"));
    }
    Ok(())
}

fn validate_schedule(
    event_date: DateTime<Utc>,
    event_end_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    if event_date < now {
        return Err(WorkflowError::validation("event date must not be in the past"));
    }
    if let Some(end) = event_end_date {
        if end < event_date {
            return Err(WorkflowError::validation("event end must not precede its start"));
        }
    }
    Ok(())
}

fn validate_budget(min: Option<Decimal>, max: Option<Decimal>) -> Result<(), WorkflowError> {
    for amount in [min, max].into_iter().flatten() {
        if amount < Decimal::ZERO {
            return Err(WorkflowError::validation("budget must not be negative"));
        }
        if !is_minor_exact(amount) {
            return Err(WorkflowError::validation("budget has sub-minor-unit digits"));
        }
    }
    if let (Some(min), Some(max)) = (min, max) {
        if max < min {
            return Err(WorkflowError::validation(format!(
                "budget maximum {max} below minimum {min}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn budget_pair_is_ordered() {
        assert!(validate_budget(Some(dec!(1000)), Some(dec!(2000))).is_ok());
        assert!(validate_budget(Some(dec!(2000)), Some(dec!(1000))).is_err());
        assert!(validate_budget(None, Some(dec!(2000))).is_ok());
        assert!(validate_budget(Some(dec!(-1)), None).is_err());
    }

    #[test]
    fn event_dates_must_be_coherent() {
        let now = Utc::now();
        assert!(validate_schedule(now + Duration::days(10), None, now).is_ok());
        assert!(validate_schedule(now - Duration::days(1), None, now).is_err());
        assert!(validate_schedule(
            now + Duration::days(10),
            Some(now + Duration::days(9)),
            now
        )
        .is_err());
    }
}
