//! Return machine end-to-end scenarios.

use anyhow::Result;
use returnflow::{
    ItemSelector, OperationInput, RecordRefundInput, RefundStatus, ReturnRequestInput, ReturnState,
};
use serde_json::json;

use crate::support::fixtures::{ORDER_ID, ORDER_TOTAL};
use crate::support::TestApp;

fn request_input(key: &str) -> ReturnRequestInput {
    ReturnRequestInput {
        order_id: ORDER_ID.into(),
        return_id: Some("ret_01".into()),
        idempotency_key: key.into(),
        reason_code: "DEFECTIVE".into(),
        items: vec![ItemSelector::by_sku("TEE-M", 1)],
        ..Default::default()
    }
}

#[tokio::test]
async fn full_flow_through_refund() -> Result<()> {
    let app = TestApp::new();
    app.store.set_stock("inv_tee", "loc_qc", 0);

    let outcome = app.engine.return_request(request_input("req-1")).await?;
    assert!(outcome.changed);
    assert_eq!(outcome.intent.state, ReturnState::Requested);

    // A pending refund is seeded at the order total.
    let refund = outcome.intent.refund.expect("refund seeded");
    assert_eq!(refund.status, RefundStatus::Pending);
    assert_eq!(refund.amount, ORDER_TOTAL);

    app.engine
        .return_approve(OperationInput::new(ORDER_ID, "approve-1").with_actor("agent_7"))
        .await?;

    let outcome = app
        .engine
        .return_receive(OperationInput::new(ORDER_ID, "receive-1"))
        .await?;
    assert_eq!(outcome.intent.state, ReturnState::Received);
    assert_eq!(app.store.stock("inv_tee", "loc_qc"), 1);

    let outcome = app
        .engine
        .return_qc_pass(OperationInput::new(ORDER_ID, "qc-1"))
        .await?;
    assert_eq!(app.store.stock("inv_tee", "loc_qc"), 0);
    assert_eq!(app.store.stock("inv_tee", "loc_main"), 1);
    assert_eq!(outcome.intent.inventory_movements.len(), 2);

    let outcome = app
        .engine
        .return_record_refund(RecordRefundInput {
            order_id: ORDER_ID.into(),
            idempotency_key: "refund-1".into(),
            reference: Some("rp_settlement_42".into()),
            ..Default::default()
        })
        .await?;
    assert_eq!(outcome.intent.state, ReturnState::Refunded);
    let refund = outcome.intent.refund.expect("refund present");
    assert_eq!(refund.status, RefundStatus::Recorded);
    assert_eq!(refund.amount, ORDER_TOTAL);
    assert_eq!(refund.reference.as_deref(), Some("rp_settlement_42"));

    let outcome = app
        .engine
        .return_close(OperationInput::new(ORDER_ID, "close-1"))
        .await?;
    assert_eq!(outcome.intent.state, ReturnState::Closed);
    assert_eq!(
        app.metadata_string(ORDER_ID, "return_state_v1").as_deref(),
        Some("closed")
    );

    // One history entry per state change, one event per state change.
    assert_eq!(outcome.intent.status_history.len(), 6);
    let events: Vec<_> = app
        .store
        .emitted_events()
        .iter()
        .map(|event| event.name)
        .collect();
    assert_eq!(
        events,
        vec![
            "return.requested",
            "return.approved",
            "return.received",
            "return.qc_passed",
            "return.refund_recorded",
            "return.closed",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn replay_returns_prior_outcome_unchanged() -> Result<()> {
    let app = TestApp::new();
    app.engine.return_request(request_input("req-1")).await?;

    let first = app
        .engine
        .return_approve(OperationInput::new(ORDER_ID, "approve-1"))
        .await?;
    assert!(first.changed);

    let second = app
        .engine
        .return_approve(OperationInput::new(ORDER_ID, "approve-1"))
        .await?;
    assert!(!second.changed);
    assert_eq!(second.intent, first.intent);

    // No extra history, no extra event.
    assert_eq!(second.intent.status_history.len(), 2);
    assert_eq!(app.store.emitted_events().len(), 2);
    Ok(())
}

#[tokio::test]
async fn creation_replay_matches_on_key_alone() -> Result<()> {
    let app = TestApp::new();

    // No explicit id: the slug is generated, so a retry cannot name it.
    let input = ReturnRequestInput {
        return_id: None,
        ..request_input("req-1")
    };
    let first = app.engine.return_request(input.clone()).await?;
    let second = app.engine.return_request(input).await?;

    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(second.intent.id, first.intent.id);
    Ok(())
}

#[tokio::test]
async fn key_reuse_for_different_action_conflicts() -> Result<()> {
    let app = TestApp::new();
    app.engine.return_request(request_input("req-1")).await?;
    app.engine
        .return_approve(OperationInput::new(ORDER_ID, "shared-key"))
        .await?;

    let err = app
        .engine
        .return_receive(OperationInput::new(ORDER_ID, "shared-key"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "IDEMPOTENCY_KEY_CONFLICT");

    // State and history untouched.
    let intent = app.return_intent(ORDER_ID, "ret_01");
    assert_eq!(intent.state, ReturnState::Approved);
    assert_eq!(intent.status_history.len(), 2);
    Ok(())
}

#[tokio::test]
async fn illegal_transition_leaves_intent_unmodified() -> Result<()> {
    let app = TestApp::new();
    app.engine.return_request(request_input("req-1")).await?;

    let err = app
        .engine
        .return_qc_pass(OperationInput::new(ORDER_ID, "qc-1"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_RETURN_STATE_TRANSITION");

    let intent = app.return_intent(ORDER_ID, "ret_01");
    assert_eq!(intent.state, ReturnState::Requested);
    assert!(intent.inventory_movements.is_empty());
    assert!(app.store.adjustment_batches().is_empty());
    Ok(())
}

#[tokio::test]
async fn self_transition_records_only_the_key() -> Result<()> {
    let app = TestApp::new();
    app.engine.return_request(request_input("req-1")).await?;
    app.engine
        .return_approve(OperationInput::new(ORDER_ID, "approve-1"))
        .await?;

    // Fresh key, same target state: legal no-op.
    let outcome = app
        .engine
        .return_approve(OperationInput::new(ORDER_ID, "approve-2"))
        .await?;
    assert!(!outcome.changed);
    assert_eq!(outcome.intent.status_history.len(), 2);
    assert!(outcome.intent.idempotency_log.contains_key("approve-2"));
    assert_eq!(app.store.emitted_events().len(), 2);
    Ok(())
}

#[tokio::test]
async fn qc_fail_moves_stock_to_damage() -> Result<()> {
    let app = TestApp::new();
    app.engine.return_request(request_input("req-1")).await?;
    app.engine
        .return_approve(OperationInput::new(ORDER_ID, "approve-1"))
        .await?;
    app.engine
        .return_receive(OperationInput::new(ORDER_ID, "receive-1"))
        .await?;

    let outcome = app
        .engine
        .return_qc_fail(
            OperationInput::new(ORDER_ID, "qc-1").with_reason("seam torn beyond repair"),
        )
        .await?;

    assert_eq!(outcome.intent.state, ReturnState::QcFailed);
    assert_eq!(app.store.stock("inv_tee", "loc_qc"), 0);
    assert_eq!(app.store.stock("inv_tee", "loc_damage"), 1);
    let last = outcome.intent.status_history.last().expect("history entry");
    assert_eq!(last.reason.as_deref(), Some("seam torn beyond repair"));
    Ok(())
}

#[tokio::test]
async fn validation_and_not_found_errors() -> Result<()> {
    let app = TestApp::new();

    let err = app
        .engine
        .return_request(ReturnRequestInput {
            order_id: "".into(),
            ..request_input("req-1")
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ORDER_ID_REQUIRED");

    let err = app
        .engine
        .return_request(ReturnRequestInput {
            idempotency_key: "".into(),
            ..request_input("req-1")
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "IDEMPOTENCY_KEY_REQUIRED");

    let err = app
        .engine
        .return_request(ReturnRequestInput {
            reason_code: "JUST_BECAUSE".into(),
            ..request_input("req-1")
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_RETURN_REASON");

    let err = app
        .engine
        .return_request(ReturnRequestInput {
            order_id: "order_99".into(),
            ..request_input("req-1")
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ORDER_NOT_FOUND");

    let err = app
        .engine
        .return_request(ReturnRequestInput {
            items: vec![ItemSelector::by_sku("TEE-M", 5)],
            ..request_input("req-1")
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "RETURN_ITEM_INVALID");

    let err = app
        .engine
        .return_approve(OperationInput::new(ORDER_ID, "approve-1"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "RETURN_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn duplicate_id_with_fresh_key_already_exists() -> Result<()> {
    let app = TestApp::new();
    app.engine.return_request(request_input("req-1")).await?;

    let err = app
        .engine
        .return_request(request_input("req-2"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "RETURN_ALREADY_EXISTS");
    Ok(())
}

#[tokio::test]
async fn emit_failure_does_not_roll_back_persisted_state() -> Result<()> {
    let app = TestApp::new();
    app.engine.return_request(request_input("req-1")).await?;

    app.store.fail_emits(true);
    let outcome = app
        .engine
        .return_approve(OperationInput::new(ORDER_ID, "approve-1"))
        .await?;

    assert!(outcome.changed);
    let intent = app.return_intent(ORDER_ID, "ret_01");
    assert_eq!(intent.state, ReturnState::Approved);
    // Only the creation event made it out.
    assert_eq!(app.store.emitted_events().len(), 1);
    Ok(())
}

#[tokio::test]
async fn metadata_merge_preserves_unrelated_keys() -> Result<()> {
    let app = TestApp::new();
    let mut order = app.store.order(ORDER_ID).expect("order");
    order
        .metadata
        .insert("loyalty_tier".into(), json!("gold"));
    app.store.insert_order(order);

    app.engine.return_request(request_input("req-1")).await?;

    let order = app.store.order(ORDER_ID).expect("order");
    assert_eq!(order.metadata["loyalty_tier"], json!("gold"));
    assert!(order.metadata.get("return_intents_v1").is_some());
    Ok(())
}
