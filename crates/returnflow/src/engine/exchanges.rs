//! Exchange lifecycle entry points.

use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{
    explicit_id, latest_id, movement_summary, now, require, Engine, ExchangeOutcome,
    ExchangeRequestInput, OperationInput,
};
use crate::error::{Error, Result};
use crate::events::LifecycleEvent;
use crate::idempotency::{self, IdempotencyOutcome};
use crate::intent::{ExchangeIntent, ReasonCode};
use crate::inventory::availability;
use crate::inventory::movement::MovementMode;
use crate::inventory::Bucket;
use crate::items;
use crate::machine::{self, ExchangeAction, ExchangeState, LifecycleState, Transition};
use crate::store::metadata;

impl Engine {
    /// Create an exchange intent on an order.
    ///
    /// Return lines resolve against the order; replacement lines resolve
    /// through the catalog, defaulting to a 1:1 mirror of the return lines
    /// when none are supplied.
    pub async fn exchange_request(&self, input: ExchangeRequestInput) -> Result<ExchangeOutcome> {
        require(&input.order_id, Error::OrderIdRequired)?;
        require(&input.idempotency_key, Error::IdempotencyKeyRequired)?;
        let reason_code: ReasonCode = input.reason_code.parse()?;

        let intent_id = explicit_id(input.exchange_id.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("exc_{}", Uuid::new_v4().simple()));
        let _guard = self.locks.acquire(&input.order_id, &intent_id).await;

        let order = self.load_order(&input.order_id).await?;
        let intents = metadata::read_exchange_intents(&order.metadata)?;

        for intent in intents.values() {
            if let IdempotencyOutcome::Replay = idempotency::check(
                &intent.idempotency_log,
                &input.idempotency_key,
                ExchangeAction::Request.as_str(),
            )? {
                return Ok(ExchangeOutcome {
                    changed: false,
                    intent: intent.clone(),
                });
            }
        }
        if intents.contains_key(&intent_id) {
            return Err(Error::ExchangeAlreadyExists(intent_id));
        }

        let return_items = items::resolve_return_items(&order, &input.return_items)?;
        let replacement_items = items::resolve_replacement_items(
            self.catalog.as_ref(),
            &return_items,
            &input.replacement_items,
        )
        .await?;
        let at = now();

        let mut intent = ExchangeIntent::new(
            &intent_id,
            &order.id,
            reason_code,
            return_items,
            replacement_items,
            at,
        );
        intent.record_key(
            &input.idempotency_key,
            ExchangeAction::Request.as_str(),
            input.actor_id.clone(),
            at,
        );
        intent.record_transition(
            ExchangeAction::Request.as_str(),
            ExchangeState::Requested,
            input.actor_id.clone(),
            None,
            at,
        );

        self.persist_exchange(&order, &intent).await?;
        self.emit(exchange_event(
            ExchangeAction::Request,
            &intent,
            input.actor_id,
            None,
            at,
        ))
        .await;

        debug!(order_id = %order.id, exchange_id = %intent.id, "exchange requested");
        Ok(ExchangeOutcome {
            changed: true,
            intent,
        })
    }

    pub async fn exchange_approve(&self, input: OperationInput) -> Result<ExchangeOutcome> {
        self.exchange_transition(input, ExchangeAction::Approve, ExchangeState::Approved)
            .await
    }

    /// The customer's return arrived; returned units enter QC_HOLD.
    pub async fn exchange_receive_return(&self, input: OperationInput) -> Result<ExchangeOutcome> {
        self.exchange_transition(
            input,
            ExchangeAction::ReceiveReturn,
            ExchangeState::ReturnReceived,
        )
        .await
    }

    /// Reserve the replacement: SELLABLE to EXCHANGE_HOLD, gated by the
    /// availability check. Fails with `OUT_OF_STOCK` before any ledger write.
    pub async fn exchange_reserve_replacement(
        &self,
        input: OperationInput,
    ) -> Result<ExchangeOutcome> {
        self.exchange_transition(
            input,
            ExchangeAction::ReserveReplacement,
            ExchangeState::ReplacementReserved,
        )
        .await
    }

    /// Ship the replacement: the EXCHANGE_HOLD reservation is consumed.
    pub async fn exchange_ship_replacement(
        &self,
        input: OperationInput,
    ) -> Result<ExchangeOutcome> {
        self.exchange_transition(
            input,
            ExchangeAction::ShipReplacement,
            ExchangeState::ReplacementShipped,
        )
        .await
    }

    pub async fn exchange_mark_delivered(&self, input: OperationInput) -> Result<ExchangeOutcome> {
        self.exchange_transition(
            input,
            ExchangeAction::MarkDelivered,
            ExchangeState::Delivered,
        )
        .await
    }

    /// Close the exchange. Beyond the graph, closing is only allowed from
    /// `replacement_shipped` or `delivered`.
    pub async fn exchange_close(&self, input: OperationInput) -> Result<ExchangeOutcome> {
        self.exchange_transition(input, ExchangeAction::Close, ExchangeState::Closed)
            .await
    }

    /// Shared transition driver for every non-creation exchange operation.
    async fn exchange_transition(
        &self,
        input: OperationInput,
        action: ExchangeAction,
        target: ExchangeState,
    ) -> Result<ExchangeOutcome> {
        require(&input.order_id, Error::OrderIdRequired)?;
        require(&input.idempotency_key, Error::IdempotencyKeyRequired)?;

        let intent_id = match explicit_id(input.intent_id.as_deref()) {
            Some(id) => id.to_string(),
            None => {
                let order = self.load_order(&input.order_id).await?;
                let intents = metadata::read_exchange_intents(&order.metadata)?;
                latest_id(&intents).ok_or_else(|| Error::ExchangeNotFound {
                    order_id: input.order_id.clone(),
                    exchange_id: "<latest>".to_string(),
                })?
            }
        };

        let _guard = self.locks.acquire(&input.order_id, &intent_id).await;

        let order = self.load_order(&input.order_id).await?;
        let intents = metadata::read_exchange_intents(&order.metadata)?;
        let mut intent = intents
            .get(&intent_id)
            .cloned()
            .ok_or_else(|| Error::ExchangeNotFound {
                order_id: input.order_id.clone(),
                exchange_id: intent_id.clone(),
            })?;

        if let IdempotencyOutcome::Replay = idempotency::check(
            &intent.idempotency_log,
            &input.idempotency_key,
            action.as_str(),
        )? {
            return Ok(ExchangeOutcome {
                changed: false,
                intent,
            });
        }

        // The graph allows `closed` only from shipped/delivered, but the
        // close gate also rejects the self-transition case, so it runs
        // before the edge check.
        if action == ExchangeAction::Close
            && !matches!(
                intent.state,
                ExchangeState::ReplacementShipped | ExchangeState::Delivered
            )
        {
            return Err(Error::ExchangeCloseBlocked {
                state: intent.state.as_str(),
            });
        }

        let transition = machine::validate_transition(intent.state, target)?;
        let at = now();

        if transition == Transition::NoOp {
            intent.record_key(&input.idempotency_key, action.as_str(), input.actor_id, at);
            self.persist_exchange(&order, &intent).await?;
            return Ok(ExchangeOutcome {
                changed: false,
                intent,
            });
        }

        let movement_record = match action {
            ExchangeAction::ReceiveReturn => {
                self.apply_movement(MovementMode::ReturnToQcHold, &intent.return_items, at)
                    .await?
            }
            ExchangeAction::ReserveReplacement => {
                let buckets = self.resolved_buckets().await?;
                availability::assert_available(
                    self.inventory.as_ref(),
                    buckets.location_id(Bucket::Sellable),
                    &intent.replacement_items,
                )
                .await?;
                self.apply_movement_with(
                    MovementMode::ReserveReplacement,
                    &intent.replacement_items,
                    &buckets,
                    at,
                )
                .await?
            }
            ExchangeAction::ShipReplacement => {
                self.apply_movement(MovementMode::ShipReplacement, &intent.replacement_items, at)
                    .await?
            }
            _ => None,
        };

        intent.record_key(
            &input.idempotency_key,
            action.as_str(),
            input.actor_id.clone(),
            at,
        );
        intent.record_transition(
            action.as_str(),
            target,
            input.actor_id.clone(),
            input.reason,
            at,
        );
        if let Some(record) = movement_record.clone() {
            intent.record_movement(record);
        }

        self.persist_exchange(&order, &intent).await?;
        self.emit(exchange_event(
            action,
            &intent,
            input.actor_id,
            movement_record.as_ref().map(movement_summary),
            at,
        ))
        .await;

        debug!(
            order_id = %order.id,
            exchange_id = %intent.id,
            state = intent.state.as_str(),
            action = action.as_str(),
            "exchange transition applied"
        );
        Ok(ExchangeOutcome {
            changed: true,
            intent,
        })
    }
}

fn exchange_event(
    action: ExchangeAction,
    intent: &ExchangeIntent,
    actor_id: Option<String>,
    movement: Option<crate::events::MovementSummary>,
    at: OffsetDateTime,
) -> LifecycleEvent {
    LifecycleEvent {
        name: action.event_name(),
        order_id: intent.order_id.clone(),
        intent_id: intent.id.clone(),
        state: intent.state.as_str().to_string(),
        actor_id,
        movement,
        at,
    }
}
