mod common;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{booked_with_deposit, harness, quote_input, request_input, sent_quote};
use gala_core::{ConflictKind, WorkflowError};
use gala_workflow::models::{
    BookingStatus, PaymentStatus, QuoteStatus, RequestStatus,
};
use gala_workflow::repository::{BookingRepository, QuoteRepository, RequestRepository};
use gala_workflow::{BookingChanges, Quote, QuoteRevision, RequestChanges};

#[tokio::test]
async fn quote_to_cancellation_scenario() {
    let h = harness().await;

    // Inquiry with budget 1000..2000, event in ten days.
    let request = h
        .requests
        .create_request(h.organizer, request_input(&h, 10))
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Pending);

    // Vendor quotes 1500 with a 30% deposit.
    let quote = h
        .quotes
        .create_quote(h.vendor_owner, quote_input(request.id, dec!(1500), dec!(30)))
        .await
        .unwrap();
    assert!(quote.quote_number.starts_with("Q-") && quote.quote_number.ends_with("-00001"));
    assert_eq!(quote.total_amount, dec!(1500.00));
    assert_eq!(quote.deposit_amount, dec!(450.00));
    let reloaded = h.requests.get_request(h.organizer, request.id).await.unwrap();
    assert_eq!(reloaded.status, RequestStatus::Quoted);

    let quote = h.quotes.send_quote(h.vendor_owner, quote.id).await.unwrap();
    assert_eq!(quote.status, QuoteStatus::Sent);
    assert!(quote.sent_at.is_some());

    // Organizer opens and accepts.
    let quote = h.quotes.mark_viewed(h.organizer, quote.id).await.unwrap();
    assert_eq!(quote.status, QuoteStatus::Viewed);
    let booking = h.quotes.accept_quote(h.organizer, quote.id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.amount_due, dec!(1500.00));
    assert_eq!(booking.commission_amount, dec!(150.00));
    assert_eq!(booking.payment_status, PaymentStatus::Pending);

    let request = h.requests.get_request(h.organizer, request.id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Accepted);

    // Deposit payment.
    let payment = h
        .ledger
        .record_payment(h.organizer, booking.id, dec!(450), true, None)
        .await
        .unwrap();
    assert!(payment.payment_number.starts_with("P-"));
    let booking = h.bookings.get_booking(h.organizer, booking.id).await.unwrap();
    assert_eq!(booking.payment_status, PaymentStatus::DepositPaid);
    assert_eq!(booking.amount_paid, dec!(450.00));
    assert_eq!(booking.amount_due, dec!(1050.00));

    // Cancellation ten days out: 25% tier.
    let cancellation = h
        .cancellations
        .cancel_booking(h.organizer, booking.id, "venue fell through".into())
        .await
        .unwrap();
    assert_eq!(cancellation.lead_days, 10);
    assert_eq!(cancellation.refund_percentage, dec!(25));
    assert_eq!(cancellation.refund_amount, dec!(112.50));
    assert_eq!(cancellation.penalty_amount, dec!(337.50));
    assert_eq!(
        cancellation.refund_amount + cancellation.penalty_amount,
        dec!(450.00)
    );

    let booking = h.bookings.get_booking(h.organizer, booking.id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);
    assert_eq!(booking.payment_status, PaymentStatus::Refunded);
    assert_eq!(booking.amount_paid, dec!(337.50));
    assert_eq!(booking.amount_due, booking.total_amount - booking.amount_paid);

    let request = h.requests.get_request(h.organizer, request.id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Cancelled);

    let payments = h.store.list_payments(booking.id).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert!(payments.iter().any(|p| p.is_refund && p.amount == dec!(112.50)));

    let stored = h.store.get_cancellation(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.refund_amount, dec!(112.50));
}

#[tokio::test]
async fn rejected_quote_can_be_revised_and_only_the_revision_accepted() {
    let h = harness().await;
    let (request_id, v1) = sent_quote(&h, 30, dec!(1800)).await;

    let v1 = h
        .quotes
        .reject_quote(h.organizer, v1.id, Some("over budget".into()))
        .await
        .unwrap();
    assert_eq!(v1.status, QuoteStatus::Rejected);
    assert_eq!(v1.rejection_reason.as_deref(), Some("over budget"));
    let request = h.requests.get_request(h.organizer, request_id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Rejected);

    let v2 = h
        .quotes
        .revise_quote(
            h.vendor_owner,
            v1.id,
            QuoteRevision {
                items: quote_input(request_id, dec!(1500), dec!(30)).items,
                tax_rate: dec!(0),
                discount_amount: dec!(0),
                discount_reason: None,
                deposit_percentage: dec!(30),
                validity_days: None,
                notes: Some("reduced menu".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(v2.version, 2);
    assert_eq!(v2.previous_quote_id, Some(v1.id));
    let request = h.requests.get_request(h.organizer, request_id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Quoted);

    let v2 = h.quotes.send_quote(h.vendor_owner, v2.id).await.unwrap();

    // The rejected original is no longer acceptable.
    let err = h.quotes.accept_quote(h.organizer, v1.id).await.unwrap_err();
    assert_eq!(err.conflict_kind(), Some(ConflictKind::QuoteNotOpen));

    let booking = h.quotes.accept_quote(h.organizer, v2.id).await.unwrap();
    assert_eq!(booking.quote_id, v2.id);
    assert_eq!(booking.total_amount, dec!(1500.00));
}

#[tokio::test]
async fn one_open_quote_per_request() {
    let h = harness().await;
    let (request_id, _quote) = sent_quote(&h, 30, dec!(1500)).await;

    let err = h
        .quotes
        .create_quote(h.vendor_owner, quote_input(request_id, dec!(1400), dec!(20)))
        .await
        .unwrap_err();
    assert_eq!(err.conflict_kind(), Some(ConflictKind::QuoteAlreadyOpen));
}

#[tokio::test]
async fn quote_creation_guards() {
    let h = harness().await;
    let (request_id, quote) = sent_quote(&h, 30, dec!(1500)).await;
    h.quotes.accept_quote(h.organizer, quote.id).await.unwrap();

    // Resolved requests take no further quotes.
    let err = h
        .quotes
        .create_quote(h.vendor_owner, quote_input(request_id, dec!(1400), dec!(20)))
        .await
        .unwrap_err();
    assert_eq!(err.conflict_kind(), Some(ConflictKind::RequestNotQuotable));

    // Malformed quotes never reach the store.
    let request = h
        .requests
        .create_request(h.organizer, request_input(&h, 20))
        .await
        .unwrap();
    let mut empty = quote_input(request.id, dec!(1500), dec!(30));
    empty.items.clear();
    let err = h.quotes.create_quote(h.vendor_owner, empty).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let err = h
        .quotes
        .create_quote(h.vendor_owner, quote_input(request.id, dec!(1500), dec!(120)))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
}

#[tokio::test]
async fn party_checks_are_relational() {
    let h = harness().await;
    let (request_id, quote) = sent_quote(&h, 30, dec!(1500)).await;

    // Vendors cannot accept their own quotes; outsiders see forbidden.
    let err = h.quotes.accept_quote(h.vendor_owner, quote.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
    let err = h.requests.get_request(h.outsider, request_id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    // Organizers cannot issue quotes.
    let request = h
        .requests
        .create_request(h.organizer, request_input(&h, 25))
        .await
        .unwrap();
    let err = h
        .quotes
        .create_quote(h.organizer, quote_input(request.id, dec!(900), dec!(10)))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
}

#[tokio::test]
async fn mark_viewed_is_idempotent() {
    let h = harness().await;
    let (_, quote) = sent_quote(&h, 30, dec!(1500)).await;

    let first = h.quotes.mark_viewed(h.organizer, quote.id).await.unwrap();
    assert_eq!(first.status, QuoteStatus::Viewed);
    let second = h.quotes.mark_viewed(h.organizer, quote.id).await.unwrap();
    assert_eq!(second.status, QuoteStatus::Viewed);
    assert_eq!(first.viewed_at, second.viewed_at);
}

#[tokio::test]
async fn accepting_a_lapsed_quote_expires_it() {
    let h = harness().await;
    let request = h
        .requests
        .create_request(h.organizer, request_input(&h, 30))
        .await
        .unwrap();

    // A sent quote whose validity lapsed before anyone touched it.
    let now = Utc::now();
    let quote = Quote {
        id: Uuid::new_v4(),
        request_id: request.id,
        vendor_id: h.vendor_id,
        quote_number: "Q-2025-09999".into(),
        version: 1,
        previous_quote_id: None,
        status: QuoteStatus::Sent,
        items: Vec::new(),
        subtotal: dec!(1500),
        tax_rate: dec!(0),
        tax_amount: dec!(0),
        discount_amount: dec!(0),
        discount_reason: None,
        total_amount: dec!(1500),
        currency: "EUR".into(),
        deposit_percentage: dec!(30),
        deposit_amount: dec!(450),
        valid_until: now - Duration::hours(1),
        notes: None,
        rejection_reason: None,
        sent_at: Some(now - Duration::days(15)),
        viewed_at: None,
        accepted_at: None,
        rejected_at: None,
        created_at: now - Duration::days(15),
        updated_at: now - Duration::days(15),
    };
    h.store.insert_quote(&quote).await.unwrap();

    let err = h.quotes.accept_quote(h.organizer, quote.id).await.unwrap_err();
    assert_eq!(err.conflict_kind(), Some(ConflictKind::QuoteExpired));
    let quote = h.store.get_quote(quote.id).await.unwrap().unwrap();
    assert_eq!(quote.status, QuoteStatus::Expired);
}

#[tokio::test]
async fn ledger_rejects_overpayment_and_negative_balances() {
    let h = harness().await;
    let booking = booked_with_deposit(&h, 30).await;

    // Over the due amount: rejected, not clamped.
    let err = h
        .ledger
        .record_payment(h.organizer, booking.id, dec!(2000), false, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Invariant(_)));

    // Non-positive and sub-cent amounts are malformed input.
    let err = h
        .ledger
        .record_payment(h.organizer, booking.id, dec!(0), false, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
    let err = h
        .ledger
        .record_payment(h.organizer, booking.id, dec!(10.005), false, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    // Refund beyond what was paid would push the balance negative.
    let err = h
        .ledger
        .record_refund(h.vendor_owner, booking.id, dec!(500), None, "goodwill".into())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Invariant(_)));

    // The derived identity holds after every ledger write.
    let payments = [dec!(300), dec!(750)];
    for amount in payments {
        h.ledger
            .record_payment(h.organizer, booking.id, amount, false, None)
            .await
            .unwrap();
        let b = h.bookings.get_booking(h.organizer, booking.id).await.unwrap();
        assert_eq!(b.amount_due, b.total_amount - b.amount_paid);
        assert!(b.amount_due >= dec!(0));
    }
    let b = h.bookings.get_booking(h.organizer, booking.id).await.unwrap();
    assert_eq!(b.payment_status, PaymentStatus::Paid);
    assert_eq!(b.amount_due, dec!(0.00));
}

#[tokio::test]
async fn vendor_refund_adjusts_the_position() {
    let h = harness().await;
    let booking = booked_with_deposit(&h, 30).await;
    let payments = h.store.list_payments(booking.id).await.unwrap();
    let deposit_payment = payments.first().unwrap().clone();

    // Organizer cannot refund themselves.
    let err = h
        .ledger
        .record_refund(h.organizer, booking.id, dec!(100), None, "oops".into())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    let refund = h
        .ledger
        .record_refund(
            h.vendor_owner,
            booking.id,
            dec!(450),
            Some(deposit_payment.id),
            "date moved".into(),
        )
        .await
        .unwrap();
    assert!(refund.is_refund);
    assert_eq!(refund.original_payment_id, Some(deposit_payment.id));

    let b = h.bookings.get_booking(h.organizer, booking.id).await.unwrap();
    assert_eq!(b.amount_paid, dec!(0.00));
    assert_eq!(b.amount_due, b.total_amount);
    assert_eq!(b.payment_status, PaymentStatus::Refunded);

    // Refunding a refund is malformed.
    let err = h
        .ledger
        .record_refund(h.vendor_owner, booking.id, dec!(1), Some(refund.id), "again".into())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
}

#[tokio::test]
async fn completion_waits_for_the_event_to_end() {
    let h = harness().await;
    let booking = booked_with_deposit(&h, 30).await;

    let err = h
        .bookings
        .complete_booking(h.vendor_owner, booking.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.conflict_kind(), Some(ConflictKind::BookingNotCompletable));

    // Only the vendor may complete.
    let err = h
        .bookings
        .complete_booking(h.organizer, booking.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
}

#[tokio::test]
async fn completed_bookings_are_terminal() {
    let h = harness().await;

    // An event that ends almost immediately.
    let mut input = request_input(&h, 0);
    input.event_date = Utc::now() + Duration::milliseconds(200);
    input.event_end_date = None;
    let request = h.requests.create_request(h.organizer, input).await.unwrap();
    let quote = h
        .quotes
        .create_quote(h.vendor_owner, quote_input(request.id, dec!(1500), dec!(30)))
        .await
        .unwrap();
    let quote = h.quotes.send_quote(h.vendor_owner, quote.id).await.unwrap();
    let booking = h.quotes.accept_quote(h.organizer, quote.id).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    let booking = h
        .bookings
        .complete_booking(h.vendor_owner, booking.id, Some("delivered".into()))
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Completed);
    assert!(booking.completed_at.is_some());

    // Terminal: neither cancellable nor completable again.
    let err = h
        .cancellations
        .cancel_booking(h.organizer, booking.id, "too late".into())
        .await
        .unwrap_err();
    assert_eq!(err.conflict_kind(), Some(ConflictKind::BookingNotCancellable));
    let err = h
        .bookings
        .complete_booking(h.vendor_owner, booking.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.conflict_kind(), Some(ConflictKind::BookingNotCompletable));

    // Settling the balance after the event is still allowed.
    h.ledger
        .record_payment(h.organizer, booking.id, dec!(1500), false, None)
        .await
        .unwrap();
    let b = h.bookings.get_booking(h.organizer, booking.id).await.unwrap();
    assert_eq!(b.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn cancellation_with_nothing_paid_records_a_zero_split() {
    let h = harness().await;
    let (_, quote) = sent_quote(&h, 40, dec!(1500)).await;
    let booking = h.quotes.accept_quote(h.organizer, quote.id).await.unwrap();

    let cancellation = h
        .cancellations
        .cancel_booking(h.vendor_owner, booking.id, "double booked".into())
        .await
        .unwrap();
    assert_eq!(cancellation.refund_amount, dec!(0.00));
    assert_eq!(cancellation.penalty_amount, dec!(0.00));
    assert_eq!(
        cancellation.initiator,
        gala_workflow::CancellationInitiator::Vendor
    );

    let payments = h.store.list_payments(booking.id).await.unwrap();
    assert!(payments.is_empty());
    let b = h.bookings.get_booking(h.organizer, booking.id).await.unwrap();
    assert_eq!(b.payment_status, PaymentStatus::Pending);

    // Second cancellation finds a terminal booking.
    let err = h
        .cancellations
        .cancel_booking(h.organizer, booking.id, "me too".into())
        .await
        .unwrap_err();
    assert_eq!(err.conflict_kind(), Some(ConflictKind::BookingNotCancellable));
}

#[tokio::test]
async fn refund_tiers_at_every_boundary() {
    for (days_out, expected_pct) in [
        (60i64, dec!(100)),
        (59, dec!(75)),
        (30, dec!(75)),
        (29, dec!(50)),
        (14, dec!(50)),
        (13, dec!(25)),
        (7, dec!(25)),
        (6, dec!(0)),
    ] {
        let h = harness().await;
        let booking = booked_with_deposit(&h, days_out).await;
        let cancellation = h
            .cancellations
            .cancel_booking(h.organizer, booking.id, "plans changed".into())
            .await
            .unwrap();
        assert_eq!(cancellation.lead_days, days_out, "lead days at {days_out}");
        assert_eq!(
            cancellation.refund_percentage, expected_pct,
            "tier at {days_out} days"
        );
        assert_eq!(
            cancellation.refund_amount + cancellation.penalty_amount,
            dec!(450.00),
            "split must cover the paid amount at {days_out} days"
        );
    }
}

#[tokio::test]
async fn expiry_sweep_is_idempotent_and_cascades() {
    let h = harness().await;
    let mut input = request_input(&h, 30);
    input.response_deadline = Some(Utc::now() + Duration::hours(1));
    let request = h.requests.create_request(h.organizer, input).await.unwrap();
    let quote = h
        .quotes
        .create_quote(h.vendor_owner, quote_input(request.id, dec!(1500), dec!(30)))
        .await
        .unwrap();
    let quote = h.quotes.send_quote(h.vendor_owner, quote.id).await.unwrap();

    let sweep_time = Utc::now() + Duration::hours(2);
    assert_eq!(h.requests.expire_stale_requests(sweep_time).await.unwrap(), 1);
    assert_eq!(h.requests.expire_stale_requests(sweep_time).await.unwrap(), 0);

    let request = h.requests.get_request(h.organizer, request.id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Expired);
    let quote = h.store.get_quote(quote.id).await.unwrap().unwrap();
    assert_eq!(quote.status, QuoteStatus::Expired);

    let err = h.quotes.accept_quote(h.organizer, quote.id).await.unwrap_err();
    assert_eq!(err.conflict_kind(), Some(ConflictKind::QuoteExpired));
}

#[tokio::test]
async fn sweep_never_regresses_resolved_requests() {
    let h = harness().await;
    let (request_id, quote) = sent_quote(&h, 30, dec!(1500)).await;
    h.quotes.accept_quote(h.organizer, quote.id).await.unwrap();

    // Even a direct store-level expiry attempt refuses to touch it.
    let moved = h
        .store
        .expire_request_with_quotes(request_id, Utc::now() + Duration::days(90))
        .await
        .unwrap();
    assert!(!moved);
    let request = h.requests.get_request(h.organizer, request_id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Accepted);
}

#[tokio::test]
async fn request_edits_are_gated_by_status_and_party() {
    let h = harness().await;
    let request = h
        .requests
        .create_request(h.organizer, request_input(&h, 30))
        .await
        .unwrap();

    let updated = h
        .requests
        .update_request(
            h.organizer,
            request.id,
            RequestChanges { guest_count: Some(120), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(updated.guest_count, Some(120));

    let err = h
        .requests
        .update_request(
            h.vendor_owner,
            request.id,
            RequestChanges { title: Some("hijack".into()), ..Default::default() },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    // Budget pair must stay ordered.
    let err = h
        .requests
        .update_request(
            h.organizer,
            request.id,
            RequestChanges { budget_max: Some(dec!(500)), ..Default::default() },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    // Once quoted, edits are refused with the authoritative state.
    h.quotes
        .create_quote(h.vendor_owner, quote_input(request.id, dec!(1500), dec!(30)))
        .await
        .unwrap();
    let err = h
        .requests
        .update_request(
            h.organizer,
            request.id,
            RequestChanges { guest_count: Some(90), ..Default::default() },
        )
        .await
        .unwrap_err();
    assert_eq!(err.conflict_kind(), Some(ConflictKind::RequestNotEditable));
}

#[tokio::test]
async fn booking_edits_only_before_the_event() {
    let h = harness().await;
    let booking = booked_with_deposit(&h, 30).await;

    let updated = h
        .bookings
        .update_details(
            h.organizer,
            booking.id,
            BookingChanges {
                guest_count: Some(95),
                organizer_notes: Some("head table seats ten".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.guest_count, Some(95));

    let err = h
        .bookings
        .update_details(
            h.vendor_owner,
            booking.id,
            BookingChanges { guest_count: Some(10), ..Default::default() },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
}

#[tokio::test]
async fn vendor_views_are_tracked_idempotently() {
    let h = harness().await;
    let request = h
        .requests
        .create_request(h.organizer, request_input(&h, 30))
        .await
        .unwrap();
    assert!(!request.viewed_by_vendor);

    let viewed = h
        .requests
        .mark_viewed_by_vendor(h.vendor_owner, request.id)
        .await
        .unwrap();
    assert!(viewed.viewed_by_vendor);
    let again = h
        .requests
        .mark_viewed_by_vendor(h.vendor_owner, request.id)
        .await
        .unwrap();
    assert_eq!(viewed.viewed_at, again.viewed_at);
}
