//! Idempotent return/exchange lifecycle engine.
//!
//! Returnflow manages post-purchase order modifications as audited state
//! machines coupled to a multi-bucket inventory ledger:
//!
//! - **Two fixed machines** — Return and Exchange, validated against fixed
//!   adjacency tables; every path terminates at `closed`
//! - **Replay-safe idempotency** — each intent carries an append-only key
//!   ledger; retried calls return their prior outcome, key reuse across
//!   actions fails loudly
//! - **Batched inventory movements** — per-line deltas aggregate into one
//!   adapter call per transition, across the SELLABLE / QC_HOLD / DAMAGE /
//!   EXCHANGE_HOLD buckets
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Engine operation                            │
//! │                                                                     │
//! │   1. Validate input                                                 │
//! │   2. Load order, resolve intent (under the per-intent lock)         │
//! │   3. Idempotency check (replay → prior outcome, changed = false)    │
//! │   4. Transition validation against the machine graph                │
//! │   5. Resolve items (creation only)                                  │
//! │   6. Availability gate, then one batched inventory movement         │
//! │   7. Persist intent onto the order metadata (merge-preserving)      │
//! │   8. Emit one business event                                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failure at any step guarantees no effect of any later step; any error
//! means the call had no effect.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use returnflow::{Collaborators, Engine, ItemSelector, OperationInput, ReturnRequestInput};
//!
//! let engine = Engine::new(Collaborators::from_store(Arc::new(store)));
//!
//! let outcome = engine
//!     .return_request(ReturnRequestInput {
//!         order_id: "order_01".into(),
//!         idempotency_key: "req-1".into(),
//!         reason_code: "DEFECTIVE".into(),
//!         items: vec![ItemSelector::by_sku("TEE-M", 1)],
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! engine
//!     .return_approve(OperationInput::new("order_01", "approve-1"))
//!     .await?;
//! ```

mod dedup;
mod engine;
mod error;
mod events;
mod idempotency;
mod intent;
pub mod inventory;
mod items;
mod lock;
mod machine;
pub mod store;

pub use dedup::{DedupStore, MemoryDedup};
pub use engine::{
    Collaborators, Engine, ExchangeOutcome, ExchangeRequestInput, OperationInput,
    RecordRefundInput, ReturnOutcome, ReturnRequestInput,
};
pub use error::{Error, Result};
pub use events::{LifecycleEvent, MovementSummary};
pub use idempotency::IdempotencyOutcome;
pub use intent::{
    ExchangeIntent, HistoryEntry, IdempotencyEntry, IntentItem, ItemComponent, MovementRecord,
    PaymentMode, ReasonCode, RefundRecord, RefundStatus, ReturnIntent,
};
pub use inventory::movement::{InventoryAdjustment, MovementMode};
pub use inventory::{Bucket, BucketNames};
pub use items::ItemSelector;
pub use lock::IntentLocks;
pub use machine::{
    validate_transition, ExchangeAction, ExchangeState, LifecycleState, MachineKind, ReturnAction,
    ReturnState, Transition,
};
pub use store::{
    EventEmitter, InventoryAdapter, Location, LocationRegistry, MemoryStore, Order, OrderLine,
    OrderStore, ProductCatalog, Variant,
};
