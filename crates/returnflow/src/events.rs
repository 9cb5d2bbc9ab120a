//! Business events published after each state-changing transition.

use serde::Serialize;
use time::OffsetDateTime;

use crate::inventory::movement::{InventoryAdjustment, MovementMode};

/// Aggregated description of one inventory movement, embedded in events so
/// subscribers see what moved without re-deriving it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementSummary {
    pub mode: MovementMode,
    pub adjustments: Vec<InventoryAdjustment>,
}

/// One event per successful state-changing transition. Replays and
/// self-transition no-ops emit nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleEvent {
    /// Dotted event name, e.g. `return.requested`,
    /// `exchange.replacement_reserved`.
    pub name: &'static str,
    pub order_id: String,
    pub intent_id: String,
    /// The intent's state after the transition, in wire form.
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement: Option<MovementSummary>,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}
