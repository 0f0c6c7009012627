//! The request state machine. Pure legality checks only; applying a
//! transition (and persisting it) is the service layer's job.
//!
//! The delivery line is ordered:
//! Pending -> InAnalysis -> Approved -> InTransit -> CollectingMaterial
//! -> InDelivery -> Delivered.
//! Any strictly-later status on the line is a legal target (stages may be
//! skipped, e.g. straight from Approved to Delivered); backward moves are
//! not. Cancelled and Rejected are reachable from any non-terminal state.

use crate::error::SupplyError;
use crate::request::RequestStatus;

pub fn is_terminal(status: RequestStatus) -> bool {
    matches!(
        status,
        RequestStatus::Delivered | RequestStatus::Cancelled | RequestStatus::Rejected
    )
}

/// Position on the delivery line; `None` for the off-line terminals.
fn progress(status: RequestStatus) -> Option<u8> {
    use RequestStatus::*;

    match status {
        Pending => Some(0),
        InAnalysis => Some(1),
        Approved => Some(2),
        InTransit => Some(3),
        CollectingMaterial => Some(4),
        InDelivery => Some(5),
        Delivered => Some(6),
        Cancelled | Rejected => None,
    }
}

pub fn can_transition(from: RequestStatus, to: RequestStatus) -> bool {
    if is_terminal(from) {
        return false;
    }

    if matches!(to, RequestStatus::Cancelled | RequestStatus::Rejected) {
        return true;
    }

    match (progress(from), progress(to)) {
        (Some(from_pos), Some(to_pos)) => to_pos > from_pos,
        _ => false,
    }
}

pub fn check_transition(from: RequestStatus, to: RequestStatus) -> Result<(), SupplyError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(SupplyError::InvalidTransition { from, to })
    }
}
