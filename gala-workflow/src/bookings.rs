use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gala_core::{
    ConflictKind, EventSink, SequenceIssuer, SequenceKind, VendorDirectory, WorkflowError,
};
use gala_shared::events::{BookingCompletedEvent, BookingConfirmedEvent, WorkflowEvent};
use gala_shared::money::round_minor;
use gala_shared::Actor;

use crate::cancellation::RefundSchedule;
use crate::models::{
    Booking, BookingRequest, BookingStatus, PaymentStatus, Quote,
};
use crate::repository::BookingRepository;

const MAX_VERSION_RETRIES: usize = 8;

/// Capability required to create a booking. Only quote acceptance can mint
/// one: the constructor is crate-private, so no external caller can reach
/// `create_from_quote` with a token of its own.
pub struct AcceptanceToken(());

impl AcceptanceToken {
    pub(crate) fn grant() -> Self {
        Self(())
    }
}

/// Organizer edits to a confirmed booking; only set fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingChanges {
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub guest_count: Option<i32>,
    pub organizer_notes: Option<String>,
}

/// Creates and manages the confirmed booking once a quote is accepted.
pub struct BookingLifecycle {
    bookings: Arc<dyn BookingRepository>,
    sequences: Arc<dyn SequenceIssuer>,
    vendors: Arc<dyn VendorDirectory>,
    events: Arc<dyn EventSink>,
    /// Platform refund tier table snapshotted onto each new booking.
    refund_schedule: RefundSchedule,
}

impl BookingLifecycle {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        sequences: Arc<dyn SequenceIssuer>,
        vendors: Arc<dyn VendorDirectory>,
        events: Arc<dyn EventSink>,
        refund_schedule: RefundSchedule,
    ) -> Self {
        Self { bookings, sequences, vendors, events, refund_schedule }
    }

    /// The acceptance transaction. Snapshots the event window and venue
    /// from the request, the amounts from the quote, and the vendor's
    /// current commission rate and cancellation policy, all point-in-time
    /// values never re-read afterwards. Commits the booking together with
    /// the request/quote transitions; concurrent losers surface the
    /// winner's state.
    pub async fn create_from_quote(
        &self,
        _token: AcceptanceToken,
        quote: &Quote,
        request: &BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking, WorkflowError> {
        let vendor = self
            .vendors
            .vendor(quote.vendor_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("vendor", quote.vendor_id))?;

        let booking_number = self.sequences.next(SequenceKind::Booking, now.year()).await?;
        let commission_amount = round_minor(quote.total_amount * vendor.commission_rate);

        let booking = Booking {
            id: Uuid::new_v4(),
            booking_number,
            request_id: request.id,
            quote_id: quote.id,
            event_id: request.event_id,
            vendor_id: request.vendor_id,
            organizer_id: request.organizer_id,
            status: BookingStatus::Confirmed,
            event_date: request.event_date,
            event_end_date: request.event_end_date,
            venue_name: request.venue_name.clone(),
            venue_address: request.venue_address.clone(),
            guest_count: request.guest_count,
            total_amount: quote.total_amount,
            deposit_amount: quote.deposit_amount,
            amount_paid: rust_decimal::Decimal::ZERO,
            amount_due: quote.total_amount,
            currency: quote.currency.clone(),
            payment_status: PaymentStatus::Pending,
            commission_rate: vendor.commission_rate,
            commission_amount,
            cancellation_policy: vendor.cancellation_policy.clone(),
            refund_schedule: self.refund_schedule.clone(),
            organizer_notes: None,
            completed_at: None,
            completion_notes: None,
            cancelled_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        self.bookings
            .commit_acceptance(request.id, quote.id, &booking, now)
            .await?;

        tracing::info!(
            booking = %booking.booking_number,
            quote = %quote.quote_number,
            total = %booking.total_amount,
            "booking created from accepted quote"
        );
        self.events.publish(WorkflowEvent::BookingConfirmed(BookingConfirmedEvent {
            booking_id: booking.id,
            booking_number: booking.booking_number.clone(),
            vendor_id: booking.vendor_id,
            organizer_id: booking.organizer_id,
            total_amount: booking.total_amount,
            timestamp: now.timestamp(),
        }));
        Ok(booking)
    }

    pub async fn get_booking(&self, actor: Actor, id: Uuid) -> Result<Booking, WorkflowError> {
        let booking = self
            .bookings
            .get_booking(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("booking", id))?;
        self.check_party_access(actor, &booking).await?;
        Ok(booking)
    }

    /// Organizer edits, permitted only while the booking is confirmed and
    /// the event has not started.
    pub async fn update_details(
        &self,
        actor: Actor,
        id: Uuid,
        changes: BookingChanges,
    ) -> Result<Booking, WorkflowError> {
        let now = Utc::now();
        for _ in 0..MAX_VERSION_RETRIES {
            let booking = self
                .bookings
                .get_booking(id)
                .await?
                .ok_or_else(|| WorkflowError::not_found("booking", id))?;

            if booking.organizer_id != actor.user_id && !actor.admin {
                return Err(WorkflowError::forbidden("only the organizer can edit the booking"));
            }
            if booking.status != BookingStatus::Confirmed || now >= booking.event_date {
                return Err(WorkflowError::conflict(
                    ConflictKind::BookingNotEditable,
                    "booking",
                    id,
                    booking.status,
                ));
            }

            if let Some(count) = changes.guest_count {
                if count <= 0 {
                    return Err(WorkflowError::validation("guest count must be positive"));
                }
            }

            let mut updated = booking.clone();
            if changes.venue_name.is_some() {
                updated.venue_name = changes.venue_name.clone();
            }
            if changes.venue_address.is_some() {
                updated.venue_address = changes.venue_address.clone();
            }
            if changes.guest_count.is_some() {
                updated.guest_count = changes.guest_count;
            }
            if changes.organizer_notes.is_some() {
                updated.organizer_notes = changes.organizer_notes.clone();
            }
            updated.version = booking.version + 1;
            updated.updated_at = now;

            if self.bookings.update_booking_details(&updated, booking.version).await? {
                return Ok(updated);
            }
            tracing::debug!(booking = %id, "booking edit lost version race, retrying");
        }
        Err(WorkflowError::infra("booking edit contention exhausted retries"))
    }

    /// Vendor closes out a delivered booking. Only possible once the event
    /// window has ended.
    pub async fn complete_booking(
        &self,
        actor: Actor,
        id: Uuid,
        notes: Option<String>,
    ) -> Result<Booking, WorkflowError> {
        let now = Utc::now();
        for _ in 0..MAX_VERSION_RETRIES {
            let booking = self
                .bookings
                .get_booking(id)
                .await?
                .ok_or_else(|| WorkflowError::not_found("booking", id))?;

            self.check_vendor_access(actor, &booking).await?;

            if booking.status != BookingStatus::Confirmed {
                return Err(WorkflowError::conflict(
                    ConflictKind::BookingNotCompletable,
                    "booking",
                    id,
                    booking.status,
                ));
            }
            if now < booking.event_end() {
                return Err(WorkflowError::conflict(
                    ConflictKind::BookingNotCompletable,
                    "booking",
                    id,
                    format!("{} (event not finished)", booking.status),
                ));
            }

            if self
                .bookings
                .complete_booking(id, notes.clone(), now, booking.version)
                .await?
            {
                tracing::info!(booking = %booking.booking_number, "booking completed");
                self.events.publish(WorkflowEvent::BookingCompleted(BookingCompletedEvent {
                    booking_id: id,
                    vendor_id: booking.vendor_id,
                    timestamp: now.timestamp(),
                }));
                return self
                    .bookings
                    .get_booking(id)
                    .await?
                    .ok_or_else(|| WorkflowError::not_found("booking", id));
            }
            tracing::debug!(booking = %id, "completion lost version race, retrying");
        }
        Err(WorkflowError::infra("completion contention exhausted retries"))
    }

    async fn check_party_access(&self, actor: Actor, booking: &Booking) -> Result<(), WorkflowError> {
        if actor.admin || actor.user_id == booking.organizer_id {
            return Ok(());
        }
        if let Some(vendor) = self.vendors.vendor(booking.vendor_id).await? {
            if vendor.owner_user_id == actor.user_id {
                return Ok(());
            }
        }
        Err(WorkflowError::forbidden("no permission to access this booking"))
    }

    async fn check_vendor_access(&self, actor: Actor, booking: &Booking) -> Result<(), WorkflowError> {
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
        Err(WorkflowError::forbidden("only the vendor can perform this action"))
    }
}
