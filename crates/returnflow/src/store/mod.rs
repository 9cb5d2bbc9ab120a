//! Collaborator contracts at the engine boundary.
//!
//! The engine owns no persistence and no wire protocol. Orders, stock,
//! locations, the catalog, and event delivery are all reached through the
//! traits in this module; [`MemoryStore`] implements every one of them for
//! tests and embedding.

mod memory;
pub mod metadata;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::events::LifecycleEvent;
use crate::intent::{ItemComponent, PaymentMode};
use crate::inventory::movement::InventoryAdjustment;

/// One line of the original order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: String,
    pub variant_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    /// Trackable inventory items consumed per unit of this line's variant.
    #[serde(default)]
    pub components: Vec<ItemComponent>,
}

/// The order snapshot the engine operates on.
///
/// `metadata` is an opaque document owned by the order system; the engine
/// merges its intent keys into it and preserves everything else verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Order total in integer minor units; the default refund amount.
    pub total_amount: i64,
    pub payment_method: PaymentMode,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub line_items: Vec<OrderLine>,
}

/// A concrete inventory location from the external registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
}

/// A sellable variant from the catalog, with its inventory components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub components: Vec<ItemComponent>,
}

/// Read and write access to orders and their metadata documents.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>>;

    /// Replace the order's metadata with `metadata`. Callers pass the full
    /// merged document; unrelated keys must already be carried over.
    async fn update_order_metadata(
        &self,
        order_id: &str,
        metadata: Map<String, Value>,
    ) -> Result<()>;
}

/// Read and adjust stock quantities.
#[async_trait]
pub trait InventoryAdapter: Send + Sync {
    /// Available quantity for one inventory item, optionally scoped to a
    /// location. `None` means across all locations.
    async fn retrieve_available_quantity(
        &self,
        inventory_item_id: &str,
        location_id: Option<&str>,
    ) -> Result<i64>;

    /// Apply one batch of signed deltas atomically.
    async fn adjust_inventory(&self, adjustments: &[InventoryAdjustment]) -> Result<()>;
}

/// The external location registry.
#[async_trait]
pub trait LocationRegistry: Send + Sync {
    async fn list_locations(&self) -> Result<Vec<Location>>;
}

/// Variant lookup for replacement resolution.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Find a variant by id or SKU, whichever is supplied.
    async fn find_variant(
        &self,
        variant_id: Option<&str>,
        sku: Option<&str>,
    ) -> Result<Option<Variant>>;
}

/// Business event delivery. Fire-and-forget from the engine's perspective:
/// a failure here never rolls back an already-persisted transition.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: LifecycleEvent) -> Result<()>;
}
