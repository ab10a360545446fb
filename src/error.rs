//! Error taxonomy for the engine.
//!
//! | Class | Variant | Status | Retry |
//! |---|---|---|---|
//! | bad input | `Validation`, `InvalidPayment`, `PaymentOverflow` | 400 | no |
//! | internal fault | `Imbalance` | 500 | no |
//! | solver | `Solver` | 500 | yes |
//! | read path | `Store` | 503 | yes |
//! | execution | `PartialSettlement` | 500 | yes |
//! | contention | `Busy` | 409 | yes |

use crate::core::attendee::{AttendeeId, GroupId};
use crate::core::expense::ExpenseError;
use crate::core::money::Money;
use crate::execution::executor::PartialSettlement;
use crate::execution::store::StoreError;
use crate::optimization::solver::SolverError;
use thiserror::Error;
use uuid::Uuid;

/// The conservation invariant was violated somewhere in the pipeline.
///
/// This always indicates a bug, never bad input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImbalanceError {
    #[error("{stage}: net positions sum to {sum}, expected zero")]
    NonZeroSum { stage: &'static str, sum: Money },
    #[error("{stage}: {attendee} should net {expected} but nets {actual}")]
    PositionMismatch {
        stage: &'static str,
        attendee: AttendeeId,
        expected: Money,
        actual: Money,
    },
    #[error("{stage}: instructions move {moved} but positions require {required}")]
    TotalMismatch {
        stage: &'static str,
        moved: Money,
        required: Money,
    },
    #[error("{stage}: instruction from {from} to {to} has non-positive amount {amount}")]
    InvalidInstruction {
        stage: &'static str,
        from: AttendeeId,
        to: AttendeeId,
        amount: Money,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid expense: {0}")]
    Validation(#[from] ExpenseError),
    #[error("invalid payment {payment}: amount {amount} must not be negative")]
    InvalidPayment { payment: Uuid, amount: Money },
    #[error("invalid payment {payment}: amount {amount} overflows the group's totals")]
    PaymentOverflow { payment: Uuid, amount: Money },
    #[error("balance invariant violated: {0}")]
    Imbalance(#[from] ImbalanceError),
    #[error("settlement solver failed: {0}")]
    Solver(#[from] SolverError),
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    PartialSettlement(#[from] PartialSettlement),
    #[error("settlement for group {group} is already running")]
    Busy { group: GroupId },
}

impl EngineError {
    /// HTTP-equivalent status for the caller.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::Validation(_)
            | EngineError::InvalidPayment { .. }
            | EngineError::PaymentOverflow { .. } => 400,
            EngineError::Busy { .. } => 409,
            EngineError::Store(_) => 503,
            EngineError::Imbalance(_)
            | EngineError::Solver(_)
            | EngineError::PartialSettlement(_) => 500,
        }
    }

    /// Whether re-issuing the same request can succeed without any change in input.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Validation(_)
            | EngineError::InvalidPayment { .. }
            | EngineError::PaymentOverflow { .. }
            | EngineError::Imbalance(_) => false,
            EngineError::Solver(_)
            | EngineError::Store(_)
            | EngineError::PartialSettlement(_)
            | EngineError::Busy { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expense::ExpenseId;

    #[test]
    fn test_validation_is_client_error() {
        let err: EngineError = ExpenseError::NegativeAmount {
            expense: ExpenseId::new("e1"),
            amount: Money::from_cents(-5),
        }
        .into();
        assert_eq!(err.status_code(), 400);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_imbalance_is_fatal() {
        let err: EngineError = ImbalanceError::NonZeroSum {
            stage: "aggregation",
            sum: Money::from_cents(1),
        }
        .into();
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("aggregation"));
    }

    #[test]
    fn test_busy_is_retryable_conflict() {
        let err = EngineError::Busy {
            group: GroupId::new("trip"),
        };
        assert_eq!(err.status_code(), 409);
        assert!(err.is_retryable());
    }
}
