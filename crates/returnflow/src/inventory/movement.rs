//! Inventory movement planning.
//!
//! Each state transition that touches stock produces exactly one movement:
//! a batch of signed per-(inventory item, location) deltas, aggregated across
//! all line items before anything is sent to the inventory adapter.

use std::collections::BTreeMap;

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};

use super::{Bucket, ResolvedBuckets};
use crate::intent::IntentItem;

/// The fixed set of movements the two machines perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementMode {
    /// Return received: returned units enter QC_HOLD.
    ToQcHold,
    /// Return passed QC: QC_HOLD back to SELLABLE.
    QcHoldToSellable,
    /// Return failed QC: QC_HOLD to DAMAGE.
    QcHoldToDamage,
    /// Exchange return received: returned units enter QC_HOLD.
    ReturnToQcHold,
    /// Replacement reserved: SELLABLE to EXCHANGE_HOLD.
    ReserveReplacement,
    /// Replacement shipped: EXCHANGE_HOLD consumed, no destination bucket.
    ShipReplacement,
}

impl MovementMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementMode::ToQcHold => "to_qc_hold",
            MovementMode::QcHoldToSellable => "qc_hold_to_sellable",
            MovementMode::QcHoldToDamage => "qc_hold_to_damage",
            MovementMode::ReturnToQcHold => "return_to_qc_hold",
            MovementMode::ReserveReplacement => "reserve_replacement",
            MovementMode::ShipReplacement => "ship_replacement",
        }
    }

    /// (source, destination) buckets. `None` means the stock enters or
    /// leaves the tracked pool entirely.
    fn endpoints(self) -> (Option<Bucket>, Option<Bucket>) {
        match self {
            MovementMode::ToQcHold => (None, Some(Bucket::QcHold)),
            MovementMode::QcHoldToSellable => (Some(Bucket::QcHold), Some(Bucket::Sellable)),
            MovementMode::QcHoldToDamage => (Some(Bucket::QcHold), Some(Bucket::Damage)),
            MovementMode::ReturnToQcHold => (None, Some(Bucket::QcHold)),
            MovementMode::ReserveReplacement => {
                (Some(Bucket::Sellable), Some(Bucket::ExchangeHold))
            }
            MovementMode::ShipReplacement => (Some(Bucket::ExchangeHold), None),
        }
    }
}

impl std::fmt::Display for MovementMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One signed delta against a concrete location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    pub inventory_item_id: String,
    pub location_id: String,
    pub adjustment: i64,
}

/// Plan the net adjustments for `mode` across `items`.
///
/// Units per component are `line quantity x required_quantity`, summed per
/// `(inventory_item_id, location_id)` key before the list is finalized.
/// Zero-net deltas are dropped; `None` means there is nothing to send and
/// the caller must skip the adapter call.
pub fn plan(
    mode: MovementMode,
    items: &[IntentItem],
    buckets: &ResolvedBuckets,
) -> Option<NonEmpty<InventoryAdjustment>> {
    let (source, destination) = mode.endpoints();
    let mut net: BTreeMap<(String, String), i64> = BTreeMap::new();

    for item in items {
        for component in &item.components {
            let units = i64::from(item.quantity) * i64::from(component.effective_quantity());
            if units == 0 {
                continue;
            }
            if let Some(bucket) = source {
                let key = (
                    component.inventory_item_id.clone(),
                    buckets.location_id(bucket).to_string(),
                );
                *net.entry(key).or_insert(0) -= units;
            }
            if let Some(bucket) = destination {
                let key = (
                    component.inventory_item_id.clone(),
                    buckets.location_id(bucket).to_string(),
                );
                *net.entry(key).or_insert(0) += units;
            }
        }
    }

    let adjustments: Vec<InventoryAdjustment> = net
        .into_iter()
        .filter(|(_, delta)| *delta != 0)
        .map(
            |((inventory_item_id, location_id), adjustment)| InventoryAdjustment {
                inventory_item_id,
                location_id,
                adjustment,
            },
        )
        .collect();

    NonEmpty::from_vec(adjustments)
}
