//! Replacement availability gate.
//!
//! Runs before any ledger write: a reservation either fully succeeds or
//! leaves zero adjustments behind.

use crate::error::{Error, Result};
use crate::intent::IntentItem;
use crate::store::InventoryAdapter;

/// Assert every replacement line can be satisfied from sellable stock.
///
/// Per sub-component the satisfiable quantity is
/// `floor(available / required_quantity)`; the minimum across a line's
/// components is the line's maximum. A line with no trackable components is
/// always treated as unavailable.
pub async fn assert_available(
    inventory: &dyn InventoryAdapter,
    sellable_location_id: &str,
    items: &[IntentItem],
) -> Result<()> {
    for item in items {
        let satisfiable = satisfiable_quantity(inventory, sellable_location_id, item).await?;
        if u64::from(item.quantity) > satisfiable {
            return Err(Error::OutOfStock {
                sku: item.sku.clone(),
                requested: item.quantity,
                satisfiable: satisfiable.min(u64::from(u32::MAX)) as u32,
            });
        }
    }
    Ok(())
}

async fn satisfiable_quantity(
    inventory: &dyn InventoryAdapter,
    sellable_location_id: &str,
    item: &IntentItem,
) -> Result<u64> {
    if item.components.is_empty() {
        return Ok(0);
    }

    let mut satisfiable = u64::MAX;
    for component in &item.components {
        let available = inventory
            .retrieve_available_quantity(&component.inventory_item_id, Some(sellable_location_id))
            .await?;
        let available = available.max(0) as u64;
        satisfiable = satisfiable.min(available / u64::from(component.effective_quantity()));
    }
    Ok(satisfiable)
}
