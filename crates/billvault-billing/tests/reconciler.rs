// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciler behavior against the SQLite subscription store.

use billvault_billing::{ApplyOutcome, BillingEventKind};
use billvault_core::{BillvaultError, SubscriptionStore, UserId};
use billvault_test_utils::TestHarness;
use billvault_test_utils::events::{change, checkout};
use tracing_test::traced_test;

const T0: i64 = 1_700_000_000;

#[tokio::test]
async fn checkout_then_duplicate_is_idempotent() {
    let harness = TestHarness::builder().build().await.unwrap();
    let event = checkout("user-1", "sub_1", T0);

    assert_eq!(harness.reconciler.apply(&event).await.unwrap(), ApplyOutcome::Created);
    let first = harness
        .reconciler
        .subscription_for(&UserId::from("user-1"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(harness.reconciler.apply(&event).await.unwrap(), ApplyOutcome::Replaced);
    let second = harness
        .reconciler
        .subscription_for(&UserId::from("user-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn duplicate_change_leaves_same_state() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.reconciler.apply(&checkout("user-1", "sub_1", T0)).await.unwrap();

    let update = change(BillingEventKind::SubscriptionUpdated, "sub_1", "past_due", T0 + 60);
    assert_eq!(harness.reconciler.apply(&update).await.unwrap(), ApplyOutcome::Applied);
    let once = harness.subscriptions.get_by_subscription_ref("sub_1").await.unwrap();
    assert_eq!(harness.reconciler.apply(&update).await.unwrap(), ApplyOutcome::Applied);
    let twice = harness.subscriptions.get_by_subscription_ref("sub_1").await.unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice.unwrap().status, "past_due");
}

#[tokio::test]
async fn newer_event_wins_in_either_arrival_order() {
    let newer = change(BillingEventKind::SubscriptionUpdated, "sub_1", "active", T0 + 200);
    let older = change(BillingEventKind::PaymentFailed, "sub_1", "past_due", T0 + 100);

    for order in [[&newer, &older], [&older, &newer]] {
        let harness = TestHarness::builder().build().await.unwrap();
        harness.reconciler.apply(&checkout("user-1", "sub_1", T0)).await.unwrap();
        for event in order {
            harness.reconciler.apply(event).await.unwrap();
        }
        let record = harness
            .reconciler
            .subscription_for(&UserId::from("user-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, "active");
        assert_eq!(record.updated_at.timestamp(), T0 + 200);
    }
}

#[tokio::test]
async fn cancellation_survives_late_duplicates() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.reconciler.apply(&checkout("user-1", "sub_1", T0)).await.unwrap();

    let early_update = change(BillingEventKind::SubscriptionUpdated, "sub_1", "active", T0 + 10);
    let cancel = change(BillingEventKind::SubscriptionDeleted, "sub_1", "canceled", T0 + 20);
    assert_eq!(harness.reconciler.apply(&cancel).await.unwrap(), ApplyOutcome::Applied);

    // Redelivered after the cancellation.
    match harness.reconciler.apply(&early_update).await.unwrap() {
        ApplyOutcome::Stale { recorded_at } => assert_eq!(recorded_at.timestamp(), T0 + 20),
        other => panic!("expected stale outcome, got {other:?}"),
    }
    assert_eq!(harness.reconciler.apply(&cancel).await.unwrap(), ApplyOutcome::Applied);

    let record = harness
        .reconciler
        .subscription_for(&UserId::from("user-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, "canceled");
}

#[tokio::test]
#[traced_test]
async fn redelivered_checkout_does_not_reactivate_canceled_subscription() {
    let harness = TestHarness::builder().build().await.unwrap();
    let first_checkout = checkout("user-1", "sub_1", T0);
    harness.reconciler.apply(&first_checkout).await.unwrap();

    let cancel = change(BillingEventKind::SubscriptionDeleted, "sub_1", "canceled", T0 + 100);
    assert_eq!(harness.reconciler.apply(&cancel).await.unwrap(), ApplyOutcome::Applied);

    match harness.reconciler.apply(&first_checkout).await.unwrap() {
        ApplyOutcome::Stale { recorded_at } => assert_eq!(recorded_at.timestamp(), T0 + 100),
        other => panic!("expected stale outcome, got {other:?}"),
    }
    assert!(logs_contain("dropped stale checkout"));

    // The replay must not have moved updated_at back past this event.
    let failed = change(BillingEventKind::PaymentFailed, "sub_1", "past_due", T0 + 50);
    assert!(matches!(
        harness.reconciler.apply(&failed).await.unwrap(),
        ApplyOutcome::Stale { .. }
    ));

    let record = harness
        .reconciler
        .subscription_for(&UserId::from("user-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, "canceled");
    assert_eq!(record.updated_at.timestamp(), T0 + 100);
}

#[tokio::test]
#[traced_test]
async fn untracked_subscription_is_a_logged_no_op() {
    let harness = TestHarness::builder().build().await.unwrap();
    let event = change(BillingEventKind::SubscriptionUpdated, "sub_ghost", "active", T0);

    let outcome = harness.reconciler.apply(&event).await.unwrap();
    assert_eq!(outcome, ApplyOutcome::Untracked);
    assert!(!outcome.changed_state());
    assert!(
        harness
            .subscriptions
            .get_by_subscription_ref("sub_ghost")
            .await
            .unwrap()
            .is_none()
    );
    assert!(logs_contain("untracked subscription"));
}

#[tokio::test]
async fn malformed_event_is_rejected_without_writing() {
    let harness = TestHarness::builder().build().await.unwrap();

    let mut no_user = checkout("user-1", "sub_1", T0);
    no_user.user_id = None;
    assert!(matches!(
        harness.reconciler.apply(&no_user).await,
        Err(BillvaultError::Validation(_))
    ));

    let mut inverted = checkout("user-1", "sub_1", T0);
    inverted.period_end = Some(T0 - 1);
    assert!(matches!(
        harness.reconciler.apply(&inverted).await,
        Err(BillvaultError::Validation(_))
    ));

    assert!(
        harness
            .reconciler
            .subscription_for(&UserId::from("user-1"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn checkout_moves_user_to_new_subscription() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.reconciler.apply(&checkout("user-1", "sub_old", T0)).await.unwrap();
    assert_eq!(
        harness
            .reconciler
            .apply(&checkout("user-1", "sub_new", T0 + 500))
            .await
            .unwrap(),
        ApplyOutcome::Replaced
    );

    let record = harness
        .reconciler
        .subscription_for(&UserId::from("user-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.subscription_ref, "sub_new");

    // The old reference no longer routes anywhere.
    let late = change(BillingEventKind::SubscriptionDeleted, "sub_old", "canceled", T0 + 600);
    assert_eq!(harness.reconciler.apply(&late).await.unwrap(), ApplyOutcome::Untracked);
    assert!(
        harness
            .reconciler
            .subscription_for(&UserId::from("other"))
            .await
            .unwrap()
            .is_none()
    );
}
