//! Idempotency ledger: replay-safe retries per intent.
//!
//! Callers (e.g. a retried webhook delivery) must be able to resend the exact
//! same operation safely. Each intent carries an append-only log of every key
//! it has seen; checking a `(action, key)` pair against that log decides how
//! the operation proceeds.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::intent::IdempotencyEntry;

/// Outcome of checking a key against an intent's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyOutcome {
    /// Key unseen; proceed with normal transition logic.
    Fresh,
    /// Key previously recorded for the same action; return the prior outcome
    /// with `changed = false` and perform no further work.
    Replay,
}

/// Check `key` for `action` against the ledger.
///
/// A key recorded for a *different* action is a caller bug and fails with
/// `IDEMPOTENCY_KEY_CONFLICT` rather than silently returning a wrong result.
pub fn check(
    log: &BTreeMap<String, IdempotencyEntry>,
    key: &str,
    action: &str,
) -> Result<IdempotencyOutcome> {
    match log.get(key) {
        None => Ok(IdempotencyOutcome::Fresh),
        Some(entry) if entry.action == action => Ok(IdempotencyOutcome::Replay),
        Some(entry) => Err(Error::IdempotencyKeyConflict {
            key: key.to_string(),
            existing_action: entry.action.clone(),
        }),
    }
}
