//! Lifecycle engine: orchestration shared by the return and exchange
//! machines.
//!
//! Every public operation follows the same template:
//!
//! 1. Validate required fields
//! 2. Load the order and resolve the intent (under the per-intent lock)
//! 3. Idempotency check — replays return the prior outcome, `changed = false`
//! 4. Transition validation against the machine's graph
//! 5. Creation only: resolve items against the order/catalog
//! 6. Side effects: availability gate, then one batched inventory movement
//! 7. Persist the intent back onto the order's metadata (merge-preserving)
//! 8. Emit one business event
//!
//! A failure at any step guarantees no effect of any later step. Steps 2-7
//! run while holding the `(order_id, intent_id)` lock, so concurrent
//! retries and races against the same intent serialize instead of clobbering
//! each other's read-modify-write.

mod exchanges;
mod returns;

use std::collections::BTreeMap;
use std::sync::Arc;

use time::OffsetDateTime;
use tracing::warn;

use crate::error::{Error, Result};
use crate::events::{LifecycleEvent, MovementSummary};
use crate::intent::{ExchangeIntent, IntentItem, MovementRecord, ReturnIntent};
use crate::inventory::movement::{self, MovementMode};
use crate::inventory::{resolve_buckets, BucketNames, ResolvedBuckets};
use crate::items::ItemSelector;
use crate::lock::IntentLocks;
use crate::store::{
    metadata, EventEmitter, InventoryAdapter, LocationRegistry, Order, OrderStore, ProductCatalog,
};

/// The five collaborator contracts the engine runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub orders: Arc<dyn OrderStore>,
    pub inventory: Arc<dyn InventoryAdapter>,
    pub locations: Arc<dyn LocationRegistry>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub events: Arc<dyn EventEmitter>,
}

impl Collaborators {
    /// Wire every contract to one implementation (e.g.
    /// [`MemoryStore`](crate::store::MemoryStore)).
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: OrderStore
            + InventoryAdapter
            + LocationRegistry
            + ProductCatalog
            + EventEmitter
            + 'static,
    {
        Self {
            orders: store.clone(),
            inventory: store.clone(),
            locations: store.clone(),
            catalog: store.clone(),
            events: store,
        }
    }
}

/// The return/exchange lifecycle engine.
///
/// Operations are independent request-response entry points; the engine
/// holds no background tasks. See the crate docs for the full walkthrough.
pub struct Engine {
    orders: Arc<dyn OrderStore>,
    inventory: Arc<dyn InventoryAdapter>,
    locations: Arc<dyn LocationRegistry>,
    catalog: Arc<dyn ProductCatalog>,
    events: Arc<dyn EventEmitter>,
    buckets: BucketNames,
    locks: IntentLocks,
}

impl Engine {
    pub fn new(collaborators: Collaborators) -> Self {
        Self::with_buckets(collaborators, BucketNames::default())
    }

    pub fn with_buckets(collaborators: Collaborators, buckets: BucketNames) -> Self {
        Self {
            orders: collaborators.orders,
            inventory: collaborators.inventory,
            locations: collaborators.locations,
            catalog: collaborators.catalog,
            events: collaborators.events,
            buckets,
            locks: IntentLocks::new(),
        }
    }

    pub(crate) async fn load_order(&self, order_id: &str) -> Result<Order> {
        self.orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))
    }

    /// Fetch the location registry once and resolve every bucket.
    pub(crate) async fn resolved_buckets(&self) -> Result<ResolvedBuckets> {
        let locations = self.locations.list_locations().await?;
        resolve_buckets(&self.buckets, &locations)
    }

    pub(crate) async fn apply_movement(
        &self,
        mode: MovementMode,
        items: &[IntentItem],
        at: OffsetDateTime,
    ) -> Result<Option<MovementRecord>> {
        let buckets = self.resolved_buckets().await?;
        self.apply_movement_with(mode, items, &buckets, at).await
    }

    /// Plan and apply one movement. An empty plan makes no adapter call and
    /// records nothing.
    pub(crate) async fn apply_movement_with(
        &self,
        mode: MovementMode,
        items: &[IntentItem],
        buckets: &ResolvedBuckets,
        at: OffsetDateTime,
    ) -> Result<Option<MovementRecord>> {
        let Some(batch) = movement::plan(mode, items, buckets) else {
            return Ok(None);
        };
        let adjustments: Vec<_> = batch.into_iter().collect();
        self.inventory.adjust_inventory(&adjustments).await?;
        Ok(Some(MovementRecord {
            mode,
            at,
            adjustments,
        }))
    }

    pub(crate) async fn persist_return(&self, order: &Order, intent: &ReturnIntent) -> Result<()> {
        let merged = metadata::merge_return_intent(&order.metadata, intent)?;
        self.orders.update_order_metadata(&order.id, merged).await
    }

    pub(crate) async fn persist_exchange(
        &self,
        order: &Order,
        intent: &ExchangeIntent,
    ) -> Result<()> {
        let merged = metadata::merge_exchange_intent(&order.metadata, intent)?;
        self.orders.update_order_metadata(&order.id, merged).await
    }

    /// Emission is fire-and-forget: the transition is already persisted, so
    /// a failing sink is logged and swallowed rather than rolled back.
    pub(crate) async fn emit(&self, event: LifecycleEvent) {
        let name = event.name;
        let order_id = event.order_id.clone();
        if let Err(error) = self.events.emit(event).await {
            warn!(event = name, order_id = %order_id, error = %error, "event emission failed");
        }
    }
}

pub(crate) fn movement_summary(record: &MovementRecord) -> MovementSummary {
    MovementSummary {
        mode: record.mode,
        adjustments: record.adjustments.clone(),
    }
}

pub(crate) fn require(value: &str, missing: Error) -> Result<()> {
    if value.trim().is_empty() {
        Err(missing)
    } else {
        Ok(())
    }
}

pub(crate) fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub(crate) fn explicit_id(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|id| !id.is_empty())
}

/// The most recently created intent wins when the caller names none.
pub(crate) fn latest_id<T: CreatedAt>(intents: &BTreeMap<String, T>) -> Option<String> {
    intents
        .values()
        .max_by_key(|intent| intent.created_at())
        .map(|intent| intent.id().to_string())
}

/// Access to the fields `latest_id` sorts on, implemented by both intent
/// types.
pub(crate) trait CreatedAt {
    fn created_at(&self) -> OffsetDateTime;
    fn id(&self) -> &str;
}

impl CreatedAt for ReturnIntent {
    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl CreatedAt for ExchangeIntent {
    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// Result of one return operation. `changed` is false on idempotent replays
/// and self-transition no-ops.
#[derive(Debug, Clone)]
pub struct ReturnOutcome {
    pub changed: bool,
    pub intent: ReturnIntent,
}

/// Result of one exchange operation.
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub changed: bool,
    pub intent: ExchangeIntent,
}

/// Input for `return_request`.
#[derive(Debug, Clone, Default)]
pub struct ReturnRequestInput {
    pub order_id: String,
    /// Caller-supplied slug, unique within the order. Defaults to a
    /// generated `ret_*` slug.
    pub return_id: Option<String>,
    pub idempotency_key: String,
    /// One of the closed reason set, e.g. `DEFECTIVE`.
    pub reason_code: String,
    pub items: Vec<ItemSelector>,
    /// Overrides the refund amount; defaults to the order total.
    pub refund_amount: Option<i64>,
    pub actor_id: Option<String>,
}

/// Input for `exchange_request`.
#[derive(Debug, Clone, Default)]
pub struct ExchangeRequestInput {
    pub order_id: String,
    pub exchange_id: Option<String>,
    pub idempotency_key: String,
    pub reason_code: String,
    pub return_items: Vec<ItemSelector>,
    /// Defaults to mirroring the return items 1:1 when empty.
    pub replacement_items: Vec<ItemSelector>,
    pub actor_id: Option<String>,
}

/// Input for every transition operation.
#[derive(Debug, Clone, Default)]
pub struct OperationInput {
    pub order_id: String,
    /// Defaults to the order's most recently created intent.
    pub intent_id: Option<String>,
    pub idempotency_key: String,
    pub actor_id: Option<String>,
    /// Free-form note recorded on the history entry (e.g. QC findings).
    pub reason: Option<String>,
}

impl OperationInput {
    pub fn new(order_id: impl Into<String>, idempotency_key: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            idempotency_key: idempotency_key.into(),
            ..Self::default()
        }
    }

    pub fn with_intent(mut self, intent_id: impl Into<String>) -> Self {
        self.intent_id = Some(intent_id.into());
        self
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Input for `return_record_refund`.
#[derive(Debug, Clone, Default)]
pub struct RecordRefundInput {
    pub order_id: String,
    pub return_id: Option<String>,
    pub idempotency_key: String,
    /// Overrides the recorded amount; defaults to the seeded amount, or the
    /// order total when nothing was seeded.
    pub amount: Option<i64>,
    /// Settlement reference from the payment side.
    pub reference: Option<String>,
    pub reason: Option<String>,
    pub actor_id: Option<String>,
}
