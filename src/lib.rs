//! # settlement-engine
//!
//! Balance and settlement engine for groups that share expenses.
//!
//! Given a group's open expenses and confirmed payments, this engine
//! computes every attendee's net position, reduces the resulting debts to a
//! minimal set of settlement payments, and applies them consistently.
//!
//! ## Architecture
//!
//! - **core**: Foundational types: money, attendees, expenses, payments, ledger
//! - **balance**: Share resolution and pairwise balance aggregation
//! - **graph**: Debt graph and settlement components
//! - **optimization**: Pluggable settlement solvers and plan verification
//! - **execution**: Store contracts, per-group locking and plan execution
//! - **service**: Read-only preview and settle entry points
//! - **simulation**: Random group generation for testing

pub mod balance;
pub mod config;
pub mod core;
pub mod error;
pub mod execution;
pub mod graph;
pub mod optimization;
pub mod service;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::balance::aggregator::{BalanceAggregator, PairwiseBalances};
    pub use crate::balance::shares::{resolve_shares, Share};
    pub use crate::config::{EngineConfig, OverpaymentPolicy};
    pub use crate::core::attendee::{Attendee, AttendeeId, GroupId};
    pub use crate::core::expense::{Expense, ExpenseId, Participant};
    pub use crate::core::ledger::Ledger;
    pub use crate::core::money::Money;
    pub use crate::core::payment::{Payment, PaymentMethod, PaymentStatus};
    pub use crate::error::{EngineError, ImbalanceError};
    pub use crate::execution::executor::{ExecutionReport, SettlementExecutor};
    pub use crate::execution::memory::{GroupRecord, InMemoryStore};
    pub use crate::execution::store::SettlementStore;
    pub use crate::graph::debt_graph::{Debt, DebtGraph};
    pub use crate::optimization::optimizer::{SettlementOptimizer, SettlementPlan};
    pub use crate::optimization::solver::{SettlementInstruction, SettlementSolver};
    pub use crate::service::SettlementService;
}
