//! Return lifecycle entry points.

use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{
    explicit_id, latest_id, movement_summary, now, require, Engine, OperationInput,
    RecordRefundInput, ReturnOutcome, ReturnRequestInput,
};
use crate::error::{Error, Result};
use crate::events::LifecycleEvent;
use crate::idempotency::{self, IdempotencyOutcome};
use crate::intent::{ReasonCode, RefundRecord, RefundStatus, ReturnIntent};
use crate::inventory::movement::MovementMode;
use crate::items;
use crate::machine::{self, LifecycleState, ReturnAction, ReturnState, Transition};
use crate::store::{metadata, Order};

impl Engine {
    /// Create a return intent on an order.
    ///
    /// Resolves the requested lines against the order, seeds a pending
    /// refund record when a positive amount is determined, and emits
    /// `return.requested`.
    pub async fn return_request(&self, input: ReturnRequestInput) -> Result<ReturnOutcome> {
        require(&input.order_id, Error::OrderIdRequired)?;
        require(&input.idempotency_key, Error::IdempotencyKeyRequired)?;
        let reason_code: ReasonCode = input.reason_code.parse()?;

        let intent_id = explicit_id(input.return_id.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("ret_{}", Uuid::new_v4().simple()));
        let _guard = self.locks.acquire(&input.order_id, &intent_id).await;

        let order = self.load_order(&input.order_id).await?;
        let intents = metadata::read_return_intents(&order.metadata)?;

        // A retried creation may not resend the defaulted id, so replays are
        // matched on the key across every intent on the order.
        for intent in intents.values() {
            if let IdempotencyOutcome::Replay = idempotency::check(
                &intent.idempotency_log,
                &input.idempotency_key,
                ReturnAction::Request.as_str(),
            )? {
                return Ok(ReturnOutcome {
                    changed: false,
                    intent: intent.clone(),
                });
            }
        }
        if intents.contains_key(&intent_id) {
            return Err(Error::ReturnAlreadyExists(intent_id));
        }

        let resolved = items::resolve_return_items(&order, &input.items)?;
        let at = now();

        let mut intent = ReturnIntent::new(&intent_id, &order.id, reason_code, resolved, at);
        intent.record_key(
            &input.idempotency_key,
            ReturnAction::Request.as_str(),
            input.actor_id.clone(),
            at,
        );
        intent.record_transition(
            ReturnAction::Request.as_str(),
            ReturnState::Requested,
            input.actor_id.clone(),
            None,
            at,
        );

        let amount = input.refund_amount.unwrap_or(order.total_amount);
        if amount > 0 {
            intent.refund = Some(RefundRecord {
                mode: order.payment_method,
                status: RefundStatus::Pending,
                amount,
                reason: None,
                reference: None,
                updated_at: at,
            });
        }

        self.persist_return(&order, &intent).await?;
        self.emit(return_event(
            ReturnAction::Request,
            &intent,
            input.actor_id,
            None,
            at,
        ))
        .await;

        debug!(order_id = %order.id, return_id = %intent.id, "return requested");
        Ok(ReturnOutcome {
            changed: true,
            intent,
        })
    }

    pub async fn return_approve(&self, input: OperationInput) -> Result<ReturnOutcome> {
        self.return_transition(
            input,
            ReturnAction::Approve,
            ReturnState::Approved,
            None,
            |_, _, _| {},
        )
        .await
    }

    /// Mark the returned units as physically received; they enter QC_HOLD.
    pub async fn return_receive(&self, input: OperationInput) -> Result<ReturnOutcome> {
        self.return_transition(
            input,
            ReturnAction::Receive,
            ReturnState::Received,
            Some(MovementMode::ToQcHold),
            |_, _, _| {},
        )
        .await
    }

    /// QC passed: stock moves from QC_HOLD back to SELLABLE.
    pub async fn return_qc_pass(&self, input: OperationInput) -> Result<ReturnOutcome> {
        self.return_transition(
            input,
            ReturnAction::QcPass,
            ReturnState::QcPassed,
            Some(MovementMode::QcHoldToSellable),
            |_, _, _| {},
        )
        .await
    }

    /// QC failed: stock moves from QC_HOLD to DAMAGE.
    pub async fn return_qc_fail(&self, input: OperationInput) -> Result<ReturnOutcome> {
        self.return_transition(
            input,
            ReturnAction::QcFail,
            ReturnState::QcFailed,
            Some(MovementMode::QcHoldToDamage),
            |_, _, _| {},
        )
        .await
    }

    /// Record the refund intent. No settlement happens here; the record
    /// carries the amount and an optional processor reference.
    pub async fn return_record_refund(&self, input: RecordRefundInput) -> Result<ReturnOutcome> {
        let amount = input.amount;
        let reference = input.reference.clone();
        let op = OperationInput {
            order_id: input.order_id,
            intent_id: input.return_id,
            idempotency_key: input.idempotency_key,
            actor_id: input.actor_id,
            reason: input.reason,
        };
        self.return_transition(
            op,
            ReturnAction::RecordRefund,
            ReturnState::Refunded,
            None,
            move |order: &Order, intent: &mut ReturnIntent, at: OffsetDateTime| {
                let record = intent.refund.get_or_insert_with(|| RefundRecord {
                    mode: order.payment_method,
                    status: RefundStatus::Pending,
                    amount: 0,
                    reason: None,
                    reference: None,
                    updated_at: at,
                });
                if let Some(amount) = amount {
                    record.amount = amount;
                } else if record.amount == 0 {
                    record.amount = order.total_amount;
                }
                record.status = RefundStatus::Recorded;
                record.reference = reference;
                record.updated_at = at;
            },
        )
        .await
    }

    pub async fn return_close(&self, input: OperationInput) -> Result<ReturnOutcome> {
        self.return_transition(
            input,
            ReturnAction::Close,
            ReturnState::Closed,
            None,
            |_, _, _| {},
        )
        .await
    }

    /// Shared transition driver for every non-creation return operation.
    async fn return_transition<F>(
        &self,
        input: OperationInput,
        action: ReturnAction,
        target: ReturnState,
        movement: Option<MovementMode>,
        apply: F,
    ) -> Result<ReturnOutcome>
    where
        F: FnOnce(&Order, &mut ReturnIntent, OffsetDateTime),
    {
        require(&input.order_id, Error::OrderIdRequired)?;
        require(&input.idempotency_key, Error::IdempotencyKeyRequired)?;

        let intent_id = match explicit_id(input.intent_id.as_deref()) {
            Some(id) => id.to_string(),
            None => {
                let order = self.load_order(&input.order_id).await?;
                let intents = metadata::read_return_intents(&order.metadata)?;
                latest_id(&intents).ok_or_else(|| Error::ReturnNotFound {
                    order_id: input.order_id.clone(),
                    return_id: "<latest>".to_string(),
                })?
            }
        };

        let _guard = self.locks.acquire(&input.order_id, &intent_id).await;

        // Re-read under the lock so the checks below and the final
        // read-modify-write persist see a serialized view of the intent.
        let order = self.load_order(&input.order_id).await?;
        let intents = metadata::read_return_intents(&order.metadata)?;
        let mut intent = intents
            .get(&intent_id)
            .cloned()
            .ok_or_else(|| Error::ReturnNotFound {
                order_id: input.order_id.clone(),
                return_id: intent_id.clone(),
            })?;

        if let IdempotencyOutcome::Replay = idempotency::check(
            &intent.idempotency_log,
            &input.idempotency_key,
            action.as_str(),
        )? {
            return Ok(ReturnOutcome {
                changed: false,
                intent,
            });
        }

        let transition = machine::validate_transition(intent.state, target)?;
        let at = now();

        if transition == Transition::NoOp {
            // Self-transition: record only the idempotency key.
            intent.record_key(&input.idempotency_key, action.as_str(), input.actor_id, at);
            self.persist_return(&order, &intent).await?;
            return Ok(ReturnOutcome {
                changed: false,
                intent,
            });
        }

        let movement_record = match movement {
            Some(mode) => self.apply_movement(mode, &intent.items, at).await?,
            None => None,
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
        apply(&order, &mut intent, at);
        if let Some(record) = movement_record.clone() {
            intent.record_movement(record);
        }

        self.persist_return(&order, &intent).await?;
        self.emit(return_event(
            action,
            &intent,
            input.actor_id,
            movement_record.as_ref().map(movement_summary),
            at,
        ))
        .await;

        debug!(
            order_id = %order.id,
            return_id = %intent.id,
            state = intent.state.as_str(),
            action = action.as_str(),
            "return transition applied"
        );
        Ok(ReturnOutcome {
            changed: true,
            intent,
        })
    }
}

fn return_event(
    action: ReturnAction,
    intent: &ReturnIntent,
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

