//! Logical inventory buckets and their resolution to concrete locations.
//!
//! Stock moves between four logical buckets. Bucket names are configuration,
//! not schema: each operation resolves them against the external location
//! registry by case-insensitive name match, fetching the location list once
//! per operation.

pub mod availability;
pub mod movement;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::Location;

/// Logical inventory location roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bucket {
    /// Stock available for sale. Defaults to the store's primary warehouse.
    Sellable,
    /// Returned units awaiting quality control.
    QcHold,
    /// Units that failed QC.
    Damage,
    /// Units reserved for an exchange replacement, not sellable.
    ExchangeHold,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Sellable,
        Bucket::QcHold,
        Bucket::Damage,
        Bucket::ExchangeHold,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Sellable => "SELLABLE",
            Bucket::QcHold => "QC_HOLD",
            Bucket::Damage => "DAMAGE",
            Bucket::ExchangeHold => "EXCHANGE_HOLD",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location names the logical buckets resolve against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketNames {
    pub sellable: String,
    pub qc_hold: String,
    pub damage: String,
    pub exchange_hold: String,
}

impl Default for BucketNames {
    fn default() -> Self {
        Self {
            sellable: "Primary Warehouse".to_string(),
            qc_hold: "QC Hold".to_string(),
            damage: "Damage".to_string(),
            exchange_hold: "Exchange Hold".to_string(),
        }
    }
}

impl BucketNames {
    /// Read overrides from `RETURNFLOW_BUCKET_*` environment variables,
    /// falling back to the defaults for any that are unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sellable: std::env::var("RETURNFLOW_BUCKET_SELLABLE").unwrap_or(defaults.sellable),
            qc_hold: std::env::var("RETURNFLOW_BUCKET_QC_HOLD").unwrap_or(defaults.qc_hold),
            damage: std::env::var("RETURNFLOW_BUCKET_DAMAGE").unwrap_or(defaults.damage),
            exchange_hold: std::env::var("RETURNFLOW_BUCKET_EXCHANGE_HOLD")
                .unwrap_or(defaults.exchange_hold),
        }
    }

    pub fn name_of(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Sellable => &self.sellable,
            Bucket::QcHold => &self.qc_hold,
            Bucket::Damage => &self.damage,
            Bucket::ExchangeHold => &self.exchange_hold,
        }
    }
}

/// Buckets resolved to concrete location ids for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBuckets {
    sellable: String,
    qc_hold: String,
    damage: String,
    exchange_hold: String,
}

impl ResolvedBuckets {
    pub fn location_id(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Sellable => &self.sellable,
            Bucket::QcHold => &self.qc_hold,
            Bucket::Damage => &self.damage,
            Bucket::ExchangeHold => &self.exchange_hold,
        }
    }
}

/// Resolve every logical bucket against the location registry snapshot.
///
/// Fails fast with `INVENTORY_BUCKET_NOT_FOUND` listing *every* bucket whose
/// configured name matched no location, not just the first.
pub fn resolve_buckets(names: &BucketNames, locations: &[Location]) -> Result<ResolvedBuckets> {
    let find = |name: &str| {
        locations
            .iter()
            .find(|location| location.name.eq_ignore_ascii_case(name))
            .map(|location| location.id.clone())
    };

    let mut missing = Vec::new();
    let mut resolve = |bucket: Bucket| {
        let name = names.name_of(bucket);
        find(name).unwrap_or_else(|| {
            missing.push(format!("{} ({})", bucket, name));
            String::new()
        })
    };

    let resolved = ResolvedBuckets {
        sellable: resolve(Bucket::Sellable),
        qc_hold: resolve(Bucket::QcHold),
        damage: resolve(Bucket::Damage),
        exchange_hold: resolve(Bucket::ExchangeHold),
    };

    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(Error::InventoryBucketNotFound { missing })
    }
}
