//! Exchange machine end-to-end scenarios.

use anyhow::Result;
use returnflow::{
    ExchangeRequestInput, ExchangeState, ItemSelector, MovementMode, OperationInput,
};

use crate::support::fixtures::ORDER_ID;
use crate::support::TestApp;

fn request_input(key: &str) -> ExchangeRequestInput {
    ExchangeRequestInput {
        order_id: ORDER_ID.into(),
        exchange_id: Some("exc_01".into()),
        idempotency_key: key.into(),
        reason_code: "WRONG_ITEM".into(),
        return_items: vec![ItemSelector::by_variant("var_02", 1)],
        ..Default::default()
    }
}

/// Drive `exc_01` to the given state.
async fn advance(app: &TestApp, to: ExchangeState) -> Result<()> {
    let steps: &[(ExchangeState, &str)] = &[
        (ExchangeState::Approved, "approve-1"),
        (ExchangeState::ReturnReceived, "receive-1"),
        (ExchangeState::ReplacementReserved, "reserve-1"),
        (ExchangeState::ReplacementShipped, "ship-1"),
        (ExchangeState::Delivered, "deliver-1"),
    ];
    for (state, key) in steps {
        let input = OperationInput::new(ORDER_ID, *key);
        match state {
            ExchangeState::Approved => app.engine.exchange_approve(input).await?,
            ExchangeState::ReturnReceived => app.engine.exchange_receive_return(input).await?,
            ExchangeState::ReplacementReserved => {
                app.engine.exchange_reserve_replacement(input).await?
            }
            ExchangeState::ReplacementShipped => {
                app.engine.exchange_ship_replacement(input).await?
            }
            ExchangeState::Delivered => app.engine.exchange_mark_delivered(input).await?,
            _ => unreachable!(),
        };
        if *state == to {
            break;
        }
    }
    Ok(())
}

#[tokio::test]
async fn full_exchange_flow_with_reservation_and_shipment() -> Result<()> {
    let app = TestApp::new();
    app.store.set_stock("inv_mug", "loc_main", 2);

    let outcome = app.engine.exchange_request(request_input("req-1")).await?;
    assert!(outcome.changed);
    // Replacements mirror the return items when none are supplied.
    assert_eq!(outcome.intent.replacement_items.len(), 1);
    assert_eq!(outcome.intent.replacement_items[0].variant_id, "var_02");

    advance(&app, ExchangeState::ReturnReceived).await?;
    assert_eq!(app.store.stock("inv_mug", "loc_qc"), 1);

    let outcome = app
        .engine
        .exchange_reserve_replacement(OperationInput::new(ORDER_ID, "reserve-1"))
        .await?;
    assert_eq!(outcome.intent.state, ExchangeState::ReplacementReserved);
    assert_eq!(app.store.stock("inv_mug", "loc_main"), 1);
    assert_eq!(app.store.stock("inv_mug", "loc_exchange"), 1);

    let reserve = outcome
        .intent
        .inventory_movements
        .last()
        .expect("reserve movement");
    assert_eq!(reserve.mode, MovementMode::ReserveReplacement);
    assert_eq!(reserve.adjustments.len(), 2);
    let sellable_delta = reserve
        .adjustments
        .iter()
        .find(|adjustment| adjustment.location_id == "loc_main")
        .expect("sellable delta");
    assert_eq!(sellable_delta.adjustment, -1);
    let hold_delta = reserve
        .adjustments
        .iter()
        .find(|adjustment| adjustment.location_id == "loc_exchange")
        .expect("hold delta");
    assert_eq!(hold_delta.adjustment, 1);

    let outcome = app
        .engine
        .exchange_ship_replacement(OperationInput::new(ORDER_ID, "ship-1"))
        .await?;
    assert_eq!(app.store.stock("inv_mug", "loc_exchange"), 0);
    let ship = outcome
        .intent
        .inventory_movements
        .last()
        .expect("ship movement");
    assert_eq!(ship.mode, MovementMode::ShipReplacement);
    // Consumed, no destination bucket.
    assert_eq!(ship.adjustments.len(), 1);
    assert_eq!(ship.adjustments[0].adjustment, -1);

    let outcome = app
        .engine
        .exchange_close(OperationInput::new(ORDER_ID, "close-1"))
        .await?;
    assert_eq!(outcome.intent.state, ExchangeState::Closed);
    assert_eq!(
        app.metadata_string(ORDER_ID, "exchange_state_v1").as_deref(),
        Some("closed")
    );

    let events: Vec<_> = app
        .store
        .emitted_events()
        .iter()
        .map(|event| event.name)
        .collect();
    assert_eq!(
        events,
        vec![
            "exchange.requested",
            "exchange.approved",
            "exchange.return_received",
            "exchange.replacement_reserved",
            "exchange.replacement_shipped",
            "exchange.closed",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn reserve_with_no_stock_fails_before_any_write() -> Result<()> {
    let app = TestApp::new();
    // Sellable availability is 0 at reserve time.
    app.store.set_stock("inv_mug", "loc_main", 0);

    app.engine.exchange_request(request_input("req-1")).await?;
    advance(&app, ExchangeState::ReturnReceived).await?;
    let batches_before = app.store.adjustment_batches().len();

    let err = app
        .engine
        .exchange_reserve_replacement(OperationInput::new(ORDER_ID, "reserve-1"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OUT_OF_STOCK");
    assert!(err.to_string().contains("MUG-BLUE"));

    // Intent still at return_received, zero adjustments from the reserve.
    let intent = app.exchange_intent(ORDER_ID, "exc_01");
    assert_eq!(intent.state, ExchangeState::ReturnReceived);
    assert_eq!(app.store.adjustment_batches().len(), batches_before);
    assert_eq!(app.store.stock("inv_mug", "loc_exchange"), 0);
    Ok(())
}

#[tokio::test]
async fn reserve_before_return_received_is_rejected() -> Result<()> {
    let app = TestApp::new();
    app.store.set_stock("inv_mug", "loc_main", 2);

    app.engine.exchange_request(request_input("req-1")).await?;
    advance(&app, ExchangeState::Approved).await?;

    let err = app
        .engine
        .exchange_reserve_replacement(OperationInput::new(ORDER_ID, "reserve-1"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_EXCHANGE_STATE_TRANSITION");

    let intent = app.exchange_intent(ORDER_ID, "exc_01");
    assert_eq!(intent.state, ExchangeState::Approved);
    Ok(())
}

#[tokio::test]
async fn close_is_blocked_until_shipped() -> Result<()> {
    let app = TestApp::new();
    app.store.set_stock("inv_mug", "loc_main", 2);

    app.engine.exchange_request(request_input("req-1")).await?;
    advance(&app, ExchangeState::ReplacementReserved).await?;

    let err = app
        .engine
        .exchange_close(OperationInput::new(ORDER_ID, "close-1"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "EXCHANGE_CLOSE_BLOCKED");

    app.engine
        .exchange_ship_replacement(OperationInput::new(ORDER_ID, "ship-1"))
        .await?;
    let outcome = app
        .engine
        .exchange_close(OperationInput::new(ORDER_ID, "close-2"))
        .await?;
    assert_eq!(outcome.intent.state, ExchangeState::Closed);
    Ok(())
}

#[tokio::test]
async fn close_after_delivery_succeeds() -> Result<()> {
    let app = TestApp::new();
    app.store.set_stock("inv_mug", "loc_main", 2);

    app.engine.exchange_request(request_input("req-1")).await?;
    advance(&app, ExchangeState::Delivered).await?;

    let outcome = app
        .engine
        .exchange_close(OperationInput::new(ORDER_ID, "close-1"))
        .await?;
    assert_eq!(outcome.intent.state, ExchangeState::Closed);
    Ok(())
}

#[tokio::test]
async fn explicit_replacement_resolves_through_catalog() -> Result<()> {
    let app = TestApp::new();

    let outcome = app
        .engine
        .exchange_request(ExchangeRequestInput {
            return_items: vec![ItemSelector::by_sku("TEE-M", 1)],
            replacement_items: vec![ItemSelector::by_sku("TEE-L", 1)],
            ..request_input("req-1")
        })
        .await?;
    assert_eq!(outcome.intent.replacement_items[0].variant_id, "var_03");

    let err = app
        .engine
        .exchange_request(ExchangeRequestInput {
            exchange_id: Some("exc_02".into()),
            idempotency_key: "req-2".into(),
            replacement_items: vec![ItemSelector::by_variant("var_99", 1)],
            ..request_input("req-2")
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VARIANT_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn racing_reserves_serialize_instead_of_overselling() -> Result<()> {
    let app = TestApp::new();
    // Exactly enough stock for one reservation.
    app.store.set_stock("inv_mug", "loc_main", 1);

    app.engine.exchange_request(request_input("req-1")).await?;
    advance(&app, ExchangeState::ReturnReceived).await?;

    let engine_a = app.engine.clone();
    let engine_b = app.engine.clone();
    let a = tokio::spawn(async move {
        engine_a
            .exchange_reserve_replacement(OperationInput::new(ORDER_ID, "reserve-a"))
            .await
    });
    let b = tokio::spawn(async move {
        engine_b
            .exchange_reserve_replacement(OperationInput::new(ORDER_ID, "reserve-b"))
            .await
    });
    let a = a.await??;
    let b = b.await??;

    // The lock serializes the race: one call performs the reservation, the
    // loser lands on the already-reserved state as a self-transition no-op.
    assert_eq!(
        [a.changed, b.changed].iter().filter(|changed| **changed).count(),
        1
    );
    assert_eq!(app.store.stock("inv_mug", "loc_main"), 0);
    assert_eq!(app.store.stock("inv_mug", "loc_exchange"), 1);

    let reserve_batches = app
        .store
        .adjustment_batches()
        .iter()
        .filter(|batch| {
            batch
                .iter()
                .any(|adjustment| adjustment.location_id == "loc_exchange")
        })
        .count();
    assert_eq!(reserve_batches, 1);
    Ok(())
}
