//! Resolving requested lines against the order and the catalog.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::intent::IntentItem;
use crate::store::{Order, OrderLine, ProductCatalog};

/// One requested line as supplied by the caller: any of the three selectors
/// plus a quantity. Matching is attempted by line item id, then variant id,
/// then SKU; the first match wins.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemSelector {
    #[serde(default)]
    pub line_item_id: Option<String>,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    pub quantity: u32,
}

impl ItemSelector {
    pub fn by_line_item(id: impl Into<String>, quantity: u32) -> Self {
        Self {
            line_item_id: Some(id.into()),
            quantity,
            ..Self::default()
        }
    }

    pub fn by_variant(id: impl Into<String>, quantity: u32) -> Self {
        Self {
            variant_id: Some(id.into()),
            quantity,
            ..Self::default()
        }
    }

    pub fn by_sku(sku: impl Into<String>, quantity: u32) -> Self {
        Self {
            sku: Some(sku.into()),
            quantity,
            ..Self::default()
        }
    }

    fn describe(&self) -> String {
        self.line_item_id
            .clone()
            .or_else(|| self.variant_id.clone())
            .or_else(|| self.sku.clone())
            .unwrap_or_else(|| "<empty selector>".to_string())
    }

    fn matches(&self, line: &OrderLine) -> bool {
        if let Some(id) = &self.line_item_id {
            return *id == line.id;
        }
        if let Some(variant_id) = &self.variant_id {
            return *variant_id == line.variant_id;
        }
        if let Some(sku) = &self.sku {
            return sku.eq_ignore_ascii_case(&line.sku);
        }
        false
    }
}

/// Resolve requested return lines against the order.
///
/// Rejects an empty request, a zero quantity, and a quantity exceeding what
/// the order originally contained.
pub fn resolve_return_items(order: &Order, selectors: &[ItemSelector]) -> Result<Vec<IntentItem>> {
    if selectors.is_empty() {
        return Err(Error::ReturnItemInvalid("no items requested".to_string()));
    }

    let mut items = Vec::with_capacity(selectors.len());
    for selector in selectors {
        let line = order
            .line_items
            .iter()
            .find(|line| selector.matches(line))
            .ok_or_else(|| Error::ReturnItemNotFound(selector.describe()))?;

        if selector.quantity == 0 {
            return Err(Error::ReturnItemInvalid(format!(
                "quantity for {} must be positive",
                line.sku
            )));
        }
        if selector.quantity > line.quantity {
            return Err(Error::ReturnItemInvalid(format!(
                "requested {} of {}, order has {}",
                selector.quantity, line.sku, line.quantity
            )));
        }

        items.push(IntentItem {
            line_item_id: Some(line.id.clone()),
            variant_id: line.variant_id.clone(),
            sku: line.sku.clone(),
            name: line.name.clone(),
            quantity: selector.quantity,
            components: line.components.clone(),
        });
    }
    Ok(items)
}

/// Resolve replacement lines for an exchange.
///
/// With no selectors the replacements mirror the return items 1:1. Explicit
/// selectors resolve through the catalog by variant id or SKU and fail with
/// `VARIANT_NOT_FOUND` when unresolved.
pub async fn resolve_replacement_items(
    catalog: &dyn ProductCatalog,
    return_items: &[IntentItem],
    selectors: &[ItemSelector],
) -> Result<Vec<IntentItem>> {
    if selectors.is_empty() {
        return Ok(return_items
            .iter()
            .map(|item| IntentItem {
                line_item_id: None,
                ..item.clone()
            })
            .collect());
    }

    let mut items = Vec::with_capacity(selectors.len());
    for selector in selectors {
        if selector.variant_id.is_none() && selector.sku.is_none() {
            return Err(Error::ReplacementItemInvalid(
                "replacement items need a variant_id or sku".to_string(),
            ));
        }
        if selector.quantity == 0 {
            return Err(Error::ReplacementItemInvalid(format!(
                "quantity for {} must be positive",
                selector.describe()
            )));
        }

        let variant = catalog
            .find_variant(selector.variant_id.as_deref(), selector.sku.as_deref())
            .await?
            .ok_or_else(|| Error::VariantNotFound(selector.describe()))?;

        items.push(IntentItem {
            line_item_id: None,
            variant_id: variant.id,
            sku: variant.sku,
            name: variant.name,
            quantity: selector.quantity,
            components: variant.components,
        });
    }
    Ok(items)
}
