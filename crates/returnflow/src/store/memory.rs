//! In-memory collaborators.
//!
//! One store implements every boundary trait, backing the integration suite
//! and embedded usage without external systems. Introspection helpers expose
//! the adjustment batches and emitted events for assertions.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{
    EventEmitter, InventoryAdapter, Location, LocationRegistry, Order, OrderStore, ProductCatalog,
    Variant,
};
use crate::error::{Error, Result};
use crate::events::LifecycleEvent;
use crate::inventory::movement::InventoryAdjustment;

#[derive(Default)]
struct Inner {
    orders: Mutex<HashMap<String, Order>>,
    variants: Mutex<Vec<Variant>>,
    locations: Mutex<Vec<Location>>,
    /// (inventory_item_id, location_id) -> quantity.
    stock: Mutex<BTreeMap<(String, String), i64>>,
    /// Every batch passed to `adjust_inventory`, in call order.
    adjustment_batches: Mutex<Vec<Vec<InventoryAdjustment>>>,
    events: Mutex<Vec<LifecycleEvent>>,
    fail_emits: AtomicBool,
}

/// In-memory order store, inventory, location registry, catalog, and emitter.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_order(&self, order: Order) {
        self.inner
            .orders
            .lock()
            .expect("orders lock")
            .insert(order.id.clone(), order);
    }

    pub fn order(&self, order_id: &str) -> Option<Order> {
        self.inner
            .orders
            .lock()
            .expect("orders lock")
            .get(order_id)
            .cloned()
    }

    pub fn insert_variant(&self, variant: Variant) {
        self.inner
            .variants
            .lock()
            .expect("variants lock")
            .push(variant);
    }

    pub fn insert_location(&self, id: impl Into<String>, name: impl Into<String>) {
        self.inner.locations.lock().expect("locations lock").push(Location {
            id: id.into(),
            name: name.into(),
        });
    }

    /// Register the four default bucket locations.
    pub fn with_default_locations(self) -> Self {
        self.insert_location("loc_main", "Primary Warehouse");
        self.insert_location("loc_qc", "QC Hold");
        self.insert_location("loc_damage", "Damage");
        self.insert_location("loc_exchange", "Exchange Hold");
        self
    }

    pub fn set_stock(&self, inventory_item_id: &str, location_id: &str, quantity: i64) {
        self.inner.stock.lock().expect("stock lock").insert(
            (inventory_item_id.to_string(), location_id.to_string()),
            quantity,
        );
    }

    pub fn stock(&self, inventory_item_id: &str, location_id: &str) -> i64 {
        self.inner
            .stock
            .lock()
            .expect("stock lock")
            .get(&(inventory_item_id.to_string(), location_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn adjustment_batches(&self) -> Vec<Vec<InventoryAdjustment>> {
        self.inner
            .adjustment_batches
            .lock()
            .expect("adjustments lock")
            .clone()
    }

    pub fn emitted_events(&self) -> Vec<LifecycleEvent> {
        self.inner.events.lock().expect("events lock").clone()
    }

    /// Make subsequent `emit` calls fail, to prove emission failures never
    /// roll back a persisted transition.
    pub fn fail_emits(&self, enabled: bool) {
        self.inner.fail_emits.store(enabled, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>> {
        Ok(self.order(order_id))
    }

    async fn update_order_metadata(
        &self,
        order_id: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let mut orders = self.inner.orders.lock().expect("orders lock");
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;
        order.metadata = metadata;
        Ok(())
    }
}

#[async_trait]
impl InventoryAdapter for MemoryStore {
    async fn retrieve_available_quantity(
        &self,
        inventory_item_id: &str,
        location_id: Option<&str>,
    ) -> Result<i64> {
        let stock = self.inner.stock.lock().expect("stock lock");
        let total = match location_id {
            Some(location_id) => stock
                .get(&(inventory_item_id.to_string(), location_id.to_string()))
                .copied()
                .unwrap_or(0),
            None => stock
                .iter()
                .filter(|((item, _), _)| item == inventory_item_id)
                .map(|(_, quantity)| *quantity)
                .sum(),
        };
        Ok(total)
    }

    async fn adjust_inventory(&self, adjustments: &[InventoryAdjustment]) -> Result<()> {
        let mut stock = self.inner.stock.lock().expect("stock lock");
        for adjustment in adjustments {
            *stock
                .entry((
                    adjustment.inventory_item_id.clone(),
                    adjustment.location_id.clone(),
                ))
                .or_insert(0) += adjustment.adjustment;
        }
        self.inner
            .adjustment_batches
            .lock()
            .expect("adjustments lock")
            .push(adjustments.to_vec());
        Ok(())
    }
}

#[async_trait]
impl LocationRegistry for MemoryStore {
    async fn list_locations(&self) -> Result<Vec<Location>> {
        Ok(self.inner.locations.lock().expect("locations lock").clone())
    }
}

#[async_trait]
impl ProductCatalog for MemoryStore {
    async fn find_variant(
        &self,
        variant_id: Option<&str>,
        sku: Option<&str>,
    ) -> Result<Option<Variant>> {
        let variants = self.inner.variants.lock().expect("variants lock");
        let found = variants.iter().find(|variant| {
            variant_id.is_some_and(|id| id == variant.id)
                || sku.is_some_and(|sku| sku.eq_ignore_ascii_case(&variant.sku))
        });
        Ok(found.cloned())
    }
}

#[async_trait]
impl EventEmitter for MemoryStore {
    async fn emit(&self, event: LifecycleEvent) -> Result<()> {
        if self.inner.fail_emits.load(Ordering::SeqCst) {
            return Err(Error::Storage("event sink unavailable".to_string()));
        }
        self.inner.events.lock().expect("events lock").push(event);
        Ok(())
    }
}
