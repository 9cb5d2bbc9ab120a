//! Error types for returnflow.

use thiserror::Error;

/// A `Result` alias with [`enum@Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by lifecycle operations.
///
/// Every variant carries a stable machine-readable code ([`Error::code`])
/// alongside the human-readable message. An error from any operation means
/// the call had no effect: no history entry, no inventory adjustment, no
/// persisted intent change.
#[derive(Debug, Error)]
pub enum Error {
    /// `order_id` was missing or blank.
    #[error("order_id is required")]
    OrderIdRequired,

    /// `idempotency_key` was missing or blank.
    #[error("idempotency_key is required")]
    IdempotencyKeyRequired,

    /// The creation reason is not in the closed reason set.
    #[error("invalid return reason: {0}")]
    InvalidReturnReason(String),

    /// A requested return line failed validation (bad quantity, exceeds the
    /// original order quantity, empty item list).
    #[error("return item invalid: {0}")]
    ReturnItemInvalid(String),

    /// A requested replacement line failed validation.
    #[error("replacement item invalid: {0}")]
    ReplacementItemInvalid(String),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("return {return_id} not found on order {order_id}")]
    ReturnNotFound { order_id: String, return_id: String },

    #[error("exchange {exchange_id} not found on order {order_id}")]
    ExchangeNotFound { order_id: String, exchange_id: String },

    /// A replacement selector resolved to no catalog variant.
    #[error("variant not found: {0}")]
    VariantNotFound(String),

    /// A return selector matched no line item on the order.
    #[error("return item not found on order: {0}")]
    ReturnItemNotFound(String),

    #[error("return already exists: {0}")]
    ReturnAlreadyExists(String),

    #[error("exchange already exists: {0}")]
    ExchangeAlreadyExists(String),

    /// The idempotency key was previously recorded for a different action.
    ///
    /// Reusing a key across actions is a caller bug; the operation fails
    /// loudly instead of returning the wrong prior outcome.
    #[error("idempotency key {key} was already used for {existing_action}")]
    IdempotencyKeyConflict {
        key: String,
        existing_action: String,
    },

    /// The requested edge is not in the return transition graph.
    #[error("invalid return state transition: {from} -> {to}")]
    InvalidReturnStateTransition {
        from: &'static str,
        to: &'static str,
    },

    /// The requested edge is not in the exchange transition graph.
    #[error("invalid exchange state transition: {from} -> {to}")]
    InvalidExchangeStateTransition {
        from: &'static str,
        to: &'static str,
    },

    /// Exchanges may only close once the replacement has shipped or been
    /// delivered; the graph alone is necessary but not sufficient.
    #[error("exchange cannot close from state {state}")]
    ExchangeCloseBlocked { state: &'static str },

    /// Sellable stock cannot satisfy a replacement line. Raised before any
    /// ledger write, so a failed reservation leaves zero adjustments behind.
    #[error("out of stock for {sku}: requested {requested}, satisfiable {satisfiable}")]
    OutOfStock {
        sku: String,
        requested: u32,
        satisfiable: u32,
    },

    /// One or more logical buckets matched no registered location. Lists
    /// every missing bucket, not just the first.
    #[error("inventory buckets not found: {}", missing.join(", "))]
    InventoryBucketNotFound { missing: Vec<String> },

    /// A collaborator (order store, inventory adapter, registry, catalog)
    /// failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Failed to serialize or deserialize an intent document.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::OrderIdRequired => "ORDER_ID_REQUIRED",
            Error::IdempotencyKeyRequired => "IDEMPOTENCY_KEY_REQUIRED",
            Error::InvalidReturnReason(_) => "INVALID_RETURN_REASON",
            Error::ReturnItemInvalid(_) => "RETURN_ITEM_INVALID",
            Error::ReplacementItemInvalid(_) => "REPLACEMENT_ITEM_INVALID",
            Error::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Error::ReturnNotFound { .. } => "RETURN_NOT_FOUND",
            Error::ExchangeNotFound { .. } => "EXCHANGE_NOT_FOUND",
            Error::VariantNotFound(_) => "VARIANT_NOT_FOUND",
            Error::ReturnItemNotFound(_) => "RETURN_ITEM_NOT_FOUND",
            Error::ReturnAlreadyExists(_) => "RETURN_ALREADY_EXISTS",
            Error::ExchangeAlreadyExists(_) => "EXCHANGE_ALREADY_EXISTS",
            Error::IdempotencyKeyConflict { .. } => "IDEMPOTENCY_KEY_CONFLICT",
            Error::InvalidReturnStateTransition { .. } => "INVALID_RETURN_STATE_TRANSITION",
            Error::InvalidExchangeStateTransition { .. } => "INVALID_EXCHANGE_STATE_TRANSITION",
            Error::ExchangeCloseBlocked { .. } => "EXCHANGE_CLOSE_BLOCKED",
            Error::OutOfStock { .. } => "OUT_OF_STOCK",
            Error::InventoryBucketNotFound { .. } => "INVENTORY_BUCKET_NOT_FOUND",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}
