//! The two lifecycle state machines and their shared transition validator.
//!
//! Both machines are fixed directed acyclic graphs whose paths all terminate
//! at `closed`. Rather than duplicating the validation logic per machine,
//! a single [`validate_transition`] runs against any state type implementing
//! [`LifecycleState`]; [`ReturnState`] and [`ExchangeState`] are the two
//! configurations.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which machine a state belongs to. Selects the error raised for an edge
/// that is not in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineKind {
    Return,
    Exchange,
}

/// A state in a fixed lifecycle graph.
pub trait LifecycleState: Copy + Eq + Sized + 'static {
    /// The machine this state set belongs to.
    const KIND: MachineKind;

    /// States reachable from `self` in one transition. Self-loops are not
    /// listed; `from == to` is always legal (see [`validate_transition`]).
    fn successors(self) -> &'static [Self];

    /// Snake-case wire name, as persisted in history entries and metadata.
    fn as_str(self) -> &'static str;

    /// Terminal states have no outgoing edges.
    fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }
}

/// Outcome of validating an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// `from == to`. Legal, but records only the idempotency key: no history
    /// entry, no inventory movement, no event.
    NoOp,
    /// A real edge of the graph.
    Step,
}

/// Validate `from -> to` against the machine's adjacency table.
///
/// Any edge not in the table fails with the machine's
/// `INVALID_*_STATE_TRANSITION` error, leaving the intent unmodified.
pub fn validate_transition<S: LifecycleState>(from: S, to: S) -> Result<Transition> {
    if from == to {
        return Ok(Transition::NoOp);
    }
    if from.successors().contains(&to) {
        return Ok(Transition::Step);
    }
    Err(match S::KIND {
        MachineKind::Return => Error::InvalidReturnStateTransition {
            from: from.as_str(),
            to: to.as_str(),
        },
        MachineKind::Exchange => Error::InvalidExchangeStateTransition {
            from: from.as_str(),
            to: to.as_str(),
        },
    })
}

/// Return lifecycle states.
///
/// ```text
/// requested -> approved -> received -> {qc_passed | qc_failed}
/// qc_passed -> {refunded, closed}
/// qc_failed -> closed
/// refunded  -> closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnState {
    Requested,
    Approved,
    Received,
    QcPassed,
    QcFailed,
    Refunded,
    Closed,
}

impl LifecycleState for ReturnState {
    const KIND: MachineKind = MachineKind::Return;

    fn successors(self) -> &'static [Self] {
        use ReturnState::*;
        match self {
            Requested => &[Approved],
            Approved => &[Received],
            Received => &[QcPassed, QcFailed],
            QcPassed => &[Refunded, Closed],
            QcFailed => &[Closed],
            Refunded => &[Closed],
            Closed => &[],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ReturnState::Requested => "requested",
            ReturnState::Approved => "approved",
            ReturnState::Received => "received",
            ReturnState::QcPassed => "qc_passed",
            ReturnState::QcFailed => "qc_failed",
            ReturnState::Refunded => "refunded",
            ReturnState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ReturnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exchange lifecycle states.
///
/// ```text
/// requested -> approved -> return_received -> replacement_reserved
///           -> replacement_shipped -> {delivered, closed}
/// delivered -> closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeState {
    Requested,
    Approved,
    ReturnReceived,
    ReplacementReserved,
    ReplacementShipped,
    Delivered,
    Closed,
}

impl LifecycleState for ExchangeState {
    const KIND: MachineKind = MachineKind::Exchange;

    fn successors(self) -> &'static [Self] {
        use ExchangeState::*;
        match self {
            Requested => &[Approved],
            Approved => &[ReturnReceived],
            ReturnReceived => &[ReplacementReserved],
            ReplacementReserved => &[ReplacementShipped],
            ReplacementShipped => &[Delivered, Closed],
            Delivered => &[Closed],
            Closed => &[],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ExchangeState::Requested => "requested",
            ExchangeState::Approved => "approved",
            ExchangeState::ReturnReceived => "return_received",
            ExchangeState::ReplacementReserved => "replacement_reserved",
            ExchangeState::ReplacementShipped => "replacement_shipped",
            ExchangeState::Delivered => "delivered",
            ExchangeState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Return machine actions, one per entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnAction {
    Request,
    Approve,
    Receive,
    QcPass,
    QcFail,
    RecordRefund,
    Close,
}

impl ReturnAction {
    /// Wire name recorded in idempotency logs and history entries.
    pub fn as_str(self) -> &'static str {
        match self {
            ReturnAction::Request => "return_request",
            ReturnAction::Approve => "return_approve",
            ReturnAction::Receive => "return_receive",
            ReturnAction::QcPass => "return_qc_pass",
            ReturnAction::QcFail => "return_qc_fail",
            ReturnAction::RecordRefund => "return_record_refund",
            ReturnAction::Close => "return_close",
        }
    }

    /// Business event published when this action changes state.
    pub fn event_name(self) -> &'static str {
        match self {
            ReturnAction::Request => "return.requested",
            ReturnAction::Approve => "return.approved",
            ReturnAction::Receive => "return.received",
            ReturnAction::QcPass => "return.qc_passed",
            ReturnAction::QcFail => "return.qc_failed",
            ReturnAction::RecordRefund => "return.refund_recorded",
            ReturnAction::Close => "return.closed",
        }
    }
}

/// Exchange machine actions, one per entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeAction {
    Request,
    Approve,
    ReceiveReturn,
    ReserveReplacement,
    ShipReplacement,
    MarkDelivered,
    Close,
}

impl ExchangeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ExchangeAction::Request => "exchange_request",
            ExchangeAction::Approve => "exchange_approve",
            ExchangeAction::ReceiveReturn => "exchange_receive_return",
            ExchangeAction::ReserveReplacement => "exchange_reserve_replacement",
            ExchangeAction::ShipReplacement => "exchange_ship_replacement",
            ExchangeAction::MarkDelivered => "exchange_mark_delivered",
            ExchangeAction::Close => "exchange_close",
        }
    }

    pub fn event_name(self) -> &'static str {
        match self {
            ExchangeAction::Request => "exchange.requested",
            ExchangeAction::Approve => "exchange.approved",
            ExchangeAction::ReceiveReturn => "exchange.return_received",
            ExchangeAction::ReserveReplacement => "exchange.replacement_reserved",
            ExchangeAction::ShipReplacement => "exchange.replacement_shipped",
            ExchangeAction::MarkDelivered => "exchange.delivered",
            ExchangeAction::Close => "exchange.closed",
        }
    }
}
