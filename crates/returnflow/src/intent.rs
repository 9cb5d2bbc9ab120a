//! Intent documents: the persistent record of one return or exchange.
//!
//! An intent is created by the `*_request` operation and only ever mutated by
//! subsequent transition operations on the same id. It is never deleted;
//! `closed` is terminal and retained for audit. The idempotency log, status
//! history, and inventory movement list are append-only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Error;
use crate::inventory::movement::{InventoryAdjustment, MovementMode};
use crate::machine::{ExchangeState, LifecycleState, ReturnState};

/// Closed set of reasons accepted at intent creation. Immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    SizeIssue,
    Defective,
    WrongItem,
    ChangedMind,
    DamagedInTransit,
    Other,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::SizeIssue => "SIZE_ISSUE",
            ReasonCode::Defective => "DEFECTIVE",
            ReasonCode::WrongItem => "WRONG_ITEM",
            ReasonCode::ChangedMind => "CHANGED_MIND",
            ReasonCode::DamagedInTransit => "DAMAGED_IN_TRANSIT",
            ReasonCode::Other => "OTHER",
        }
    }
}

impl std::str::FromStr for ReasonCode {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "SIZE_ISSUE" => Ok(ReasonCode::SizeIssue),
            "DEFECTIVE" => Ok(ReasonCode::Defective),
            "WRONG_ITEM" => Ok(ReasonCode::WrongItem),
            "CHANGED_MIND" => Ok(ReasonCode::ChangedMind),
            "DAMAGED_IN_TRANSIT" => Ok(ReasonCode::DamagedInTransit),
            "OTHER" => Ok(ReasonCode::Other),
            other => Err(Error::InvalidReturnReason(other.to_string())),
        }
    }
}

/// How the original order was paid, and therefore how a refund would settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Cod,
    Prepaid,
}

/// Refund progress. This engine records intent only; settlement with a
/// payment processor happens elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Requested,
    Recorded,
}

/// Refund intent attached to a return. Seeded at creation when a positive
/// amount is determined; stamped `recorded` by `return_record_refund`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub mode: PaymentMode,
    pub status: RefundStatus,
    /// Integer minor units (e.g. paise).
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Settlement reference supplied when the refund is recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// One trackable inventory item consumed per unit of a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemComponent {
    pub inventory_item_id: String,
    /// Units of this component per variant unit. A missing or zero value
    /// counts as 1.
    #[serde(default)]
    pub required_quantity: u32,
}

impl ItemComponent {
    pub fn new(inventory_item_id: impl Into<String>, required_quantity: u32) -> Self {
        Self {
            inventory_item_id: inventory_item_id.into(),
            required_quantity,
        }
    }

    /// The per-unit quantity with the zero/missing default applied.
    pub fn effective_quantity(&self) -> u32 {
        self.required_quantity.max(1)
    }
}

/// One resolved line of a return or a replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentItem {
    /// The order line this item came from. Replacement items that are not on
    /// the original order carry no line id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_item_id: Option<String>,
    pub variant_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    #[serde(default)]
    pub components: Vec<ItemComponent>,
}

/// One recorded use of an idempotency key. Append-only, never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyEntry {
    pub action: String,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
}

/// One audit-trail entry. Every state-changing transition appends exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: String,
    /// Absent on the creation entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_state: Option<String>,
    pub to_state: String,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One batched inventory movement performed by a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub mode: MovementMode,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    /// The exact aggregated batch sent to the inventory adapter.
    pub adjustments: Vec<InventoryAdjustment>,
}

/// The persistent record of one return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnIntent {
    pub id: String,
    pub order_id: String,
    pub state: ReturnState,
    pub reason_code: ReasonCode,
    pub items: Vec<IntentItem>,
    #[serde(default)]
    pub idempotency_log: BTreeMap<String, IdempotencyEntry>,
    #[serde(default)]
    pub status_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub inventory_movements: Vec<MovementRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund: Option<RefundRecord>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ReturnIntent {
    pub fn new(
        id: impl Into<String>,
        order_id: impl Into<String>,
        reason_code: ReasonCode,
        items: Vec<IntentItem>,
        at: OffsetDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            order_id: order_id.into(),
            state: ReturnState::Requested,
            reason_code,
            items,
            idempotency_log: BTreeMap::new(),
            status_history: Vec::new(),
            inventory_movements: Vec::new(),
            refund: None,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn record_key(
        &mut self,
        key: &str,
        action: &str,
        actor_id: Option<String>,
        at: OffsetDateTime,
    ) {
        self.idempotency_log.insert(
            key.to_string(),
            IdempotencyEntry {
                action: action.to_string(),
                at,
                actor_id,
            },
        );
        self.updated_at = at;
    }

    pub fn record_transition(
        &mut self,
        action: &str,
        to: ReturnState,
        actor_id: Option<String>,
        reason: Option<String>,
        at: OffsetDateTime,
    ) {
        let from = (!self.status_history.is_empty()).then(|| self.state.as_str().to_string());
        self.status_history.push(HistoryEntry {
            action: action.to_string(),
            from_state: from,
            to_state: to.as_str().to_string(),
            at,
            actor_id,
            reason,
        });
        self.state = to;
        self.updated_at = at;
    }

    pub fn record_movement(&mut self, record: MovementRecord) {
        self.updated_at = record.at;
        self.inventory_movements.push(record);
    }
}

/// The persistent record of one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeIntent {
    pub id: String,
    pub order_id: String,
    pub state: ExchangeState,
    pub reason_code: ReasonCode,
    pub return_items: Vec<IntentItem>,
    pub replacement_items: Vec<IntentItem>,
    #[serde(default)]
    pub idempotency_log: BTreeMap<String, IdempotencyEntry>,
    #[serde(default)]
    pub status_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub inventory_movements: Vec<MovementRecord>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ExchangeIntent {
    pub fn new(
        id: impl Into<String>,
        order_id: impl Into<String>,
        reason_code: ReasonCode,
        return_items: Vec<IntentItem>,
        replacement_items: Vec<IntentItem>,
        at: OffsetDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            order_id: order_id.into(),
            state: ExchangeState::Requested,
            reason_code,
            return_items,
            replacement_items,
            idempotency_log: BTreeMap::new(),
            status_history: Vec::new(),
            inventory_movements: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn record_key(
        &mut self,
        key: &str,
        action: &str,
        actor_id: Option<String>,
        at: OffsetDateTime,
    ) {
        self.idempotency_log.insert(
            key.to_string(),
            IdempotencyEntry {
                action: action.to_string(),
                at,
                actor_id,
            },
        );
        self.updated_at = at;
    }

    pub fn record_transition(
        &mut self,
        action: &str,
        to: ExchangeState,
        actor_id: Option<String>,
        reason: Option<String>,
        at: OffsetDateTime,
    ) {
        let from = (!self.status_history.is_empty()).then(|| self.state.as_str().to_string());
        self.status_history.push(HistoryEntry {
            action: action.to_string(),
            from_state: from,
            to_state: to.as_str().to_string(),
            at,
            actor_id,
            reason,
        });
        self.state = to;
        self.updated_at = at;
    }

    pub fn record_movement(&mut self, record: MovementRecord) {
        self.updated_at = record.at;
        self.inventory_movements.push(record);
    }
}
