use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gala_core::{ConflictKind, EventSink, VendorDirectory, WorkflowError};
use gala_shared::events::{BookingCancelledEvent, WorkflowEvent};
use gala_shared::money::percent_of;
use gala_shared::Actor;

use crate::ledger::PaymentLedger;
use crate::models::{
    Booking, BookingStatus, Cancellation, CancellationInitiator, PaymentStatus,
};
use crate::repository::BookingRepository;

const MAX_VERSION_RETRIES: usize = 8;

/// One refund tier: cancellations at least `min_lead_days` before the event
/// refund `refund_percentage` of the amount paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundTier {
    pub min_lead_days: i64,
    pub refund_percentage: Decimal,
}

/// Refund tier table, ordered by descending lead time. Snapshotted onto
/// each booking at creation; the engine never consults live configuration
/// for an existing booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundSchedule {
    tiers: Vec<RefundTier>,
}

impl Default for RefundSchedule {
    fn default() -> Self {
        Self {
            tiers: vec![
                RefundTier { min_lead_days: 60, refund_percentage: Decimal::ONE_HUNDRED },
                RefundTier { min_lead_days: 30, refund_percentage: Decimal::from(75) },
                RefundTier { min_lead_days: 14, refund_percentage: Decimal::from(50) },
                RefundTier { min_lead_days: 7, refund_percentage: Decimal::from(25) },
            ],
        }
    }
}

impl RefundSchedule {
    /// Build a schedule from unordered tiers. Percentages must lie in
    /// 0..=100; tiers are sorted by descending lead time.
    pub fn new(mut tiers: Vec<RefundTier>) -> Result<Self, WorkflowError> {
        for tier in &tiers {
            if tier.refund_percentage < Decimal::ZERO
                || tier.refund_percentage > Decimal::ONE_HUNDRED
            {
                return Err(WorkflowError::validation(format!(
                    "refund percentage {} outside 0..=100",
                    tier.refund_percentage
                )));
            }
            if tier.min_lead_days < 0 {
                return Err(WorkflowError::validation("refund tier lead days must not be negative"));
            }
        }
        tiers.sort_by(|a, b| b.min_lead_days.cmp(&a.min_lead_days));
        Ok(Self { tiers })
    }

    /// Percentage refunded for a cancellation `lead_days` before the event.
    /// Lead times below every tier (including negative) refund nothing.
    pub fn refund_percentage(&self, lead_days: i64) -> Decimal {
        self.tiers
            .iter()
            .find(|tier| lead_days >= tier.min_lead_days)
            .map(|tier| tier.refund_percentage)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Terminates a confirmed booking, splitting the amount paid into refund
/// and penalty from the booking's snapshotted schedule. The split is
/// computed exactly once, at cancellation time, and persisted immutably.
pub struct CancellationPolicyEngine {
    bookings: Arc<dyn BookingRepository>,
    vendors: Arc<dyn VendorDirectory>,
    ledger: Arc<PaymentLedger>,
    events: Arc<dyn EventSink>,
}

impl CancellationPolicyEngine {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        vendors: Arc<dyn VendorDirectory>,
        ledger: Arc<PaymentLedger>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self { bookings, vendors, ledger, events }
    }

    pub async fn cancel_booking(
        &self,
        actor: Actor,
        booking_id: Uuid,
        reason: String,
    ) -> Result<Cancellation, WorkflowError> {
        if reason.trim().is_empty() {
            return Err(WorkflowError::validation("cancellation reason must not be empty"));
        }
        let now = Utc::now();

        for _ in 0..MAX_VERSION_RETRIES {
            let booking = self
                .bookings
                .get_booking(booking_id)
                .await?
                .ok_or_else(|| WorkflowError::not_found("booking", booking_id))?;

            let initiator = self.resolve_initiator(actor, &booking).await?;

            if booking.status != BookingStatus::Confirmed {
                return Err(WorkflowError::conflict(
                    ConflictKind::BookingNotCancellable,
                    "booking",
                    booking_id,
                    booking.status,
                ));
            }

            // Lead time is only meaningful now; the split must never be
            // recomputed after the fact.
            let lead_days = (booking.event_date - now).num_days();
            let refund_percentage = booking.refund_schedule.refund_percentage(lead_days);
            let refund_amount = percent_of(booking.amount_paid, refund_percentage);
            let penalty_amount = booking.amount_paid - refund_amount;

            let refund = if refund_amount > Decimal::ZERO {
                Some(
                    self.ledger
                        .cancellation_refund(&booking, refund_amount, &reason, actor.user_id, now)
                        .await?,
                )
            } else {
                None
            };

            let cancellation = Cancellation {
                id: Uuid::new_v4(),
                booking_id,
                cancelled_by: actor.user_id,
                initiator,
                reason: reason.clone(),
                lead_days,
                refund_percentage,
                refund_amount,
                penalty_amount,
                mutual_agreement: false,
                organizer_approved: initiator == CancellationInitiator::Organizer,
                vendor_approved: initiator == CancellationInitiator::Vendor,
                cancelled_at: now,
            };

            let new_paid = booking.amount_paid - refund_amount;
            let updated = Booking {
                status: BookingStatus::Cancelled,
                cancelled_at: Some(now),
                amount_paid: new_paid,
                amount_due: booking.total_amount - new_paid,
                payment_status: if refund.is_some() {
                    PaymentStatus::Refunded
                } else {
                    booking.payment_status
                },
                version: booking.version + 1,
                updated_at: now,
                ..booking.clone()
            };

            if self
                .bookings
                .commit_cancellation(&cancellation, &updated, refund.as_ref(), booking.version)
                .await?
            {
                tracing::info!(
                    booking = %booking.booking_number,
                    %lead_days,
                    %refund_amount,
                    %penalty_amount,
                    "booking cancelled"
                );
                self.events.publish(WorkflowEvent::BookingCancelled(BookingCancelledEvent {
                    booking_id,
                    request_id: booking.request_id,
                    refund_amount,
                    penalty_amount,
                    timestamp: now.timestamp(),
                }));
                return Ok(cancellation);
            }
            tracing::debug!(%booking_id, "cancellation lost version race, retrying");
        }
        Err(WorkflowError::infra("cancellation contention exhausted retries"))
    }

    async fn resolve_initiator(
        &self,
        actor: Actor,
        booking: &Booking,
    ) -> Result<CancellationInitiator, WorkflowError> {
        if actor.user_id == booking.organizer_id {
            return Ok(CancellationInitiator::Organizer);
        }
        if actor.admin {
            return Ok(CancellationInitiator::Admin);
        }
        let vendor = self
            .vendors
            .vendor(booking.vendor_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("vendor", booking.vendor_id))?;
        if vendor.owner_user_id == actor.user_id {
            return Ok(CancellationInitiator::Vendor);
        }
        Err(WorkflowError::forbidden("no permission to cancel this booking"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_tiers_at_every_boundary() {
        let schedule = RefundSchedule::default();
        assert_eq!(schedule.refund_percentage(60), dec!(100));
        assert_eq!(schedule.refund_percentage(59), dec!(75));
        assert_eq!(schedule.refund_percentage(30), dec!(75));
        assert_eq!(schedule.refund_percentage(29), dec!(50));
        assert_eq!(schedule.refund_percentage(14), dec!(50));
        assert_eq!(schedule.refund_percentage(13), dec!(25));
        assert_eq!(schedule.refund_percentage(7), dec!(25));
        assert_eq!(schedule.refund_percentage(6), dec!(0));
        assert_eq!(schedule.refund_percentage(0), dec!(0));
        assert_eq!(schedule.refund_percentage(-3), dec!(0));
        assert_eq!(schedule.refund_percentage(365), dec!(100));
    }

    #[test]
    fn custom_schedule_is_sorted_on_build() {
        let schedule = RefundSchedule::new(vec![
            RefundTier { min_lead_days: 10, refund_percentage: dec!(50) },
            RefundTier { min_lead_days: 90, refund_percentage: dec!(100) },
        ])
        .unwrap();
        assert_eq!(schedule.refund_percentage(95), dec!(100));
        assert_eq!(schedule.refund_percentage(40), dec!(50));
        assert_eq!(schedule.refund_percentage(5), dec!(0));
    }

    #[test]
    fn out_of_range_percentage_is_rejected() {
        let err = RefundSchedule::new(vec![RefundTier {
            min_lead_days: 10,
            refund_percentage: dec!(120),
        }]);
        assert!(err.is_err());
    }

    #[test]
    fn split_sums_to_amount_paid() {
        let schedule = RefundSchedule::default();
        let paid = dec!(450);
        for lead in [-5i64, 0, 6, 7, 13, 14, 29, 30, 59, 60, 120] {
            let pct = schedule.refund_percentage(lead);
            let refund = percent_of(paid, pct);
            let penalty = paid - refund;
            assert_eq!(refund + penalty, paid);
        }
        assert_eq!(percent_of(paid, schedule.refund_percentage(10)), dec!(112.50));
    }
}
