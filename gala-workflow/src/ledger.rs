use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use gala_core::{
    ConflictKind, EventSink, SequenceIssuer, SequenceKind, VendorDirectory, WorkflowError,
};
use gala_shared::events::{PaymentRecordedEvent, WorkflowEvent};
use gala_shared::money::is_minor_exact;
use gala_shared::Actor;

use crate::models::{Booking, BookingStatus, Payment, PaymentState, PaymentStatus};
use crate::repository::BookingRepository;

/// Bound on optimistic retries of the booking hot path.
const MAX_VERSION_RETRIES: usize = 8;

/// Derive the booking-level payment position from the ledger totals.
/// Thresholds: nothing or less than the deposit keeps PENDING; exactly the
/// deposit is DEPOSIT_PAID; between deposit and total is PARTIAL; the full
/// total is PAID.
pub fn derive_payment_status(paid: Decimal, deposit: Decimal, total: Decimal) -> PaymentStatus {
    if paid >= total {
        PaymentStatus::Paid
    } else if paid.is_zero() || paid < deposit {
        PaymentStatus::Pending
    } else if paid == deposit {
        PaymentStatus::DepositPaid
    } else {
        PaymentStatus::Partial
    }
}

fn derive_after_refund(paid: Decimal, deposit: Decimal, total: Decimal) -> PaymentStatus {
    if paid.is_zero() {
        PaymentStatus::Refunded
    } else {
        derive_payment_status(paid, deposit, total)
    }
}

/// Records settlement facts reported by the payment collaborator and keeps
/// the booking's derived amounts consistent with the ledger. Never talks to
/// a gateway.
pub struct PaymentLedger {
    bookings: Arc<dyn BookingRepository>,
    vendors: Arc<dyn VendorDirectory>,
    sequences: Arc<dyn SequenceIssuer>,
    events: Arc<dyn EventSink>,
}

impl PaymentLedger {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        vendors: Arc<dyn VendorDirectory>,
        sequences: Arc<dyn SequenceIssuer>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self { bookings, vendors, sequences, events }
    }

    fn validate_amount(amount: Decimal) -> Result<(), WorkflowError> {
        if amount <= Decimal::ZERO {
            return Err(WorkflowError::validation("amount must be positive"));
        }
        if !is_minor_exact(amount) {
            return Err(WorkflowError::validation("amount has sub-minor-unit digits"));
        }
        Ok(())
    }

    /// Record a charge against a booking. A charge above the amount due is
    /// rejected, never clamped.
    pub async fn record_payment(
        &self,
        actor: Actor,
        booking_id: Uuid,
        amount: Decimal,
        is_deposit: bool,
        notes: Option<String>,
    ) -> Result<Payment, WorkflowError> {
        Self::validate_amount(amount)?;
        let now = Utc::now();
        let number = self.sequences.next(SequenceKind::Payment, now.year()).await?;

        for _ in 0..MAX_VERSION_RETRIES {
            let booking = self
                .bookings
                .get_booking(booking_id)
                .await?
                .ok_or_else(|| WorkflowError::not_found("booking", booking_id))?;

            if actor.user_id != booking.organizer_id && !actor.admin {
                return Err(WorkflowError::forbidden("only the organizer can record payments"));
            }
            if booking.status == BookingStatus::Cancelled {
                return Err(WorkflowError::conflict(
                    ConflictKind::BookingClosed,
                    "booking",
                    booking_id,
                    booking.status,
                ));
            }
            if amount > booking.amount_due {
                return Err(WorkflowError::invariant(format!(
                    "payment {amount} exceeds amount due {}",
                    booking.amount_due
                )));
            }

            let new_paid = booking.amount_paid + amount;
            let payment = Payment {
                id: Uuid::new_v4(),
                payment_number: number.clone(),
                booking_id,
                payer_id: actor.user_id,
                amount,
                currency: booking.currency.clone(),
                is_deposit,
                is_refund: false,
                state: PaymentState::Succeeded,
                original_payment_id: None,
                refund_reason: None,
                notes: notes.clone(),
                created_at: now,
            };
            let updated = Booking {
                amount_paid: new_paid,
                amount_due: booking.total_amount - new_paid,
                payment_status: derive_payment_status(
                    new_paid,
                    booking.deposit_amount,
                    booking.total_amount,
                ),
                version: booking.version + 1,
                updated_at: now,
                ..booking.clone()
            };

            if self.bookings.apply_payment(&payment, &updated, booking.version).await? {
                tracing::info!(
                    booking = %booking.booking_number,
                    payment = %payment.payment_number,
                    %amount,
                    "payment recorded"
                );
                self.events.publish(WorkflowEvent::PaymentRecorded(PaymentRecordedEvent {
                    payment_id: payment.id,
                    booking_id,
                    amount,
                    is_refund: false,
                    timestamp: now.timestamp(),
                }));
                return Ok(payment);
            }
            tracing::debug!(%booking_id, "payment lost version race, retrying");
        }
        Err(WorkflowError::infra("payment contention exhausted retries"))
    }

    /// Record a refund reported by the payment collaborator. Rejected when
    /// it would push the amount paid negative.
    pub async fn record_refund(
        &self,
        actor: Actor,
        booking_id: Uuid,
        amount: Decimal,
        original_payment_id: Option<Uuid>,
        reason: String,
    ) -> Result<Payment, WorkflowError> {
        Self::validate_amount(amount)?;
        if reason.trim().is_empty() {
            return Err(WorkflowError::validation("refund reason must not be empty"));
        }
        let now = Utc::now();
        let number = self.sequences.next(SequenceKind::Payment, now.year()).await?;

        for _ in 0..MAX_VERSION_RETRIES {
            let booking = self
                .bookings
                .get_booking(booking_id)
                .await?
                .ok_or_else(|| WorkflowError::not_found("booking", booking_id))?;

            self.check_refund_access(actor, &booking).await?;

            if let Some(original_id) = original_payment_id {
                let payments = self.bookings.list_payments(booking_id).await?;
                let original = payments
                    .iter()
                    .find(|p| p.id == original_id)
                    .ok_or_else(|| {
                        WorkflowError::validation("original payment does not belong to this booking")
                    })?;
                if original.is_refund {
                    return Err(WorkflowError::validation("cannot refund a refund"));
                }
                if original.state != PaymentState::Succeeded {
                    return Err(WorkflowError::validation("original payment did not succeed"));
                }
            }

            let new_paid = booking.amount_paid - amount;
            if new_paid < Decimal::ZERO {
                return Err(WorkflowError::invariant(format!(
                    "refund {amount} exceeds amount paid {}",
                    booking.amount_paid
                )));
            }

            let payment = Payment {
                id: Uuid::new_v4(),
                payment_number: number.clone(),
                booking_id,
                payer_id: actor.user_id,
                amount,
                currency: booking.currency.clone(),
                is_deposit: false,
                is_refund: true,
                state: PaymentState::Succeeded,
                original_payment_id,
                refund_reason: Some(reason.clone()),
                notes: None,
                created_at: now,
            };
            let updated = Booking {
                amount_paid: new_paid,
                amount_due: booking.total_amount - new_paid,
                payment_status: derive_after_refund(
                    new_paid,
                    booking.deposit_amount,
                    booking.total_amount,
                ),
                version: booking.version + 1,
                updated_at: now,
                ..booking.clone()
            };

            if self.bookings.apply_payment(&payment, &updated, booking.version).await? {
                tracing::info!(
                    booking = %booking.booking_number,
                    payment = %payment.payment_number,
                    %amount,
                    "refund recorded"
                );
                self.events.publish(WorkflowEvent::PaymentRecorded(PaymentRecordedEvent {
                    payment_id: payment.id,
                    booking_id,
                    amount,
                    is_refund: true,
                    timestamp: now.timestamp(),
                }));
                return Ok(payment);
            }
            tracing::debug!(%booking_id, "refund lost version race, retrying");
        }
        Err(WorkflowError::infra("refund contention exhausted retries"))
    }

    /// Build the refund ledger row for a cancellation. The cancellation
    /// engine persists it inside its own transaction so the refund and the
    /// terminal transition commit together.
    pub(crate) async fn cancellation_refund(
        &self,
        booking: &Booking,
        amount: Decimal,
        reason: &str,
        recorded_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Payment, WorkflowError> {
        let number = self.sequences.next(SequenceKind::Payment, now.year()).await?;
        Ok(Payment {
            id: Uuid::new_v4(),
            payment_number: number,
            booking_id: booking.id,
            payer_id: recorded_by,
            amount,
            currency: booking.currency.clone(),
            is_deposit: false,
            is_refund: true,
            state: PaymentState::Succeeded,
            original_payment_id: None,
            refund_reason: Some(reason.to_string()),
            notes: None,
            created_at: now,
        })
    }

    async fn check_refund_access(&self, actor: Actor, booking: &Booking) -> Result<(), WorkflowError> {
        if actor.admin {
            return Ok(());
        }
        let vendor = self
            .vendors
            .vendor(booking.vendor_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("vendor", booking.vendor_id))?;
        if vendor.owner_user_id == actor.user_id {
            return Ok(());
        }
        Err(WorkflowError::forbidden("only the vendor or an admin can record refunds"))
    }
}
