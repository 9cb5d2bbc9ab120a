//! Intent <-> order-metadata codec.
//!
//! Intents are stored as opaque structured data on the owning order under
//! versioned keys, with a flattened convenience field mirroring the latest
//! intent's state. Writes are merge-preserving: whatever else lives in the
//! metadata document stays untouched.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::intent::{ExchangeIntent, ReturnIntent};
use crate::machine::LifecycleState;

pub const RETURN_INTENTS_KEY: &str = "return_intents_v1";
pub const EXCHANGE_INTENTS_KEY: &str = "exchange_intents_v1";
pub const RETURN_STATE_KEY: &str = "return_state_v1";
pub const EXCHANGE_STATE_KEY: &str = "exchange_state_v1";

/// All return intents stored on the order, keyed by id.
pub fn read_return_intents(metadata: &Map<String, Value>) -> Result<BTreeMap<String, ReturnIntent>> {
    match metadata.get(RETURN_INTENTS_KEY) {
        None => Ok(BTreeMap::new()),
        Some(value) => Ok(serde_json::from_value(value.clone())?),
    }
}

/// All exchange intents stored on the order, keyed by id.
pub fn read_exchange_intents(
    metadata: &Map<String, Value>,
) -> Result<BTreeMap<String, ExchangeIntent>> {
    match metadata.get(EXCHANGE_INTENTS_KEY) {
        None => Ok(BTreeMap::new()),
        Some(value) => Ok(serde_json::from_value(value.clone())?),
    }
}

/// Merge `intent` into the metadata document, preserving unrelated keys and
/// mirroring its state into the flattened field.
pub fn merge_return_intent(
    metadata: &Map<String, Value>,
    intent: &ReturnIntent,
) -> Result<Map<String, Value>> {
    merge_intent(
        metadata,
        RETURN_INTENTS_KEY,
        RETURN_STATE_KEY,
        &intent.id,
        serde_json::to_value(intent)?,
        intent.state.as_str(),
    )
}

pub fn merge_exchange_intent(
    metadata: &Map<String, Value>,
    intent: &ExchangeIntent,
) -> Result<Map<String, Value>> {
    merge_intent(
        metadata,
        EXCHANGE_INTENTS_KEY,
        EXCHANGE_STATE_KEY,
        &intent.id,
        serde_json::to_value(intent)?,
        intent.state.as_str(),
    )
}

fn merge_intent(
    metadata: &Map<String, Value>,
    intents_key: &str,
    state_key: &str,
    intent_id: &str,
    intent: Value,
    state: &str,
) -> Result<Map<String, Value>> {
    let mut merged = metadata.clone();

    let mut intents = match merged.get(intents_key) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    intents.insert(intent_id.to_string(), intent);

    merged.insert(intents_key.to_string(), Value::Object(intents));
    merged.insert(state_key.to_string(), Value::String(state.to_string()));
    Ok(merged)
}
