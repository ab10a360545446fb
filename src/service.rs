//! Read and write entry points for a group's settlements.
//!
//! [`SettlementService::preview`] answers the read-only query and may run
//! any number of times. [`SettlementService::settle`] applies the plan under
//! the group's lock.

use crate::balance::aggregator::Overpayment;
use crate::config::EngineConfig;
use crate::core::attendee::{AttendeeId, GroupId};
use crate::core::money::Money;
use crate::error::EngineError;
use crate::execution::executor::{ExecutionReport, SettlementExecutor};
use crate::execution::locks::GroupLocks;
use crate::execution::store::SettlementStore;
use crate::optimization::optimizer::SettlementOptimizer;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One suggested payment, with display names resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementEntry {
    pub from: AttendeeId,
    pub to: AttendeeId,
    pub amount_cents: Money,
    pub from_name: String,
    pub to_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementsView {
    pub settlements: Vec<SettlementEntry>,
    pub original_count: usize,
    pub optimized_count: usize,
    /// Percentage of debt edges saved, one decimal place, as a JSON number.
    #[serde(with = "rust_decimal::serde::float")]
    pub savings_percent: Decimal,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overpayments: Vec<Overpayment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeBalance {
    pub attendee_id: AttendeeId,
    pub name: String,
    /// Expenses fronted plus payments sent.
    pub total_paid_cents: Money,
    /// Expense shares plus payments received.
    pub total_owed_cents: Money,
    /// `total_paid_cents - total_owed_cents`; positive when the group owes
    /// this attendee.
    pub net_cents: Money,
}

pub struct SettlementService<S> {
    store: S,
    executor: SettlementExecutor,
    locks: GroupLocks,
}

impl<S: SettlementStore> SettlementService<S> {
    pub fn new(store: S, config: &EngineConfig) -> Self {
        Self::with_optimizer(store, SettlementOptimizer::default(), config)
    }

    pub fn with_optimizer(store: S, optimizer: SettlementOptimizer, config: &EngineConfig) -> Self {
        Self {
            store,
            executor: SettlementExecutor::new(optimizer, config),
            locks: GroupLocks::new(config.lock_timeout()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Suggested settlements for a group. Writes nothing.
    pub fn preview(&self, group: &GroupId) -> Result<SettlementsView, EngineError> {
        let names = self.names(group)?;
        let planned = self.executor.plan(&self.store, group)?;

        let settlements = planned
            .plan
            .instructions()
            .iter()
            .map(|instruction| SettlementEntry {
                from_name: display_name(&names, &instruction.from),
                to_name: display_name(&names, &instruction.to),
                from: instruction.from.clone(),
                to: instruction.to.clone(),
                amount_cents: instruction.amount_cents,
            })
            .collect();

        Ok(SettlementsView {
            settlements,
            original_count: planned.plan.original_count(),
            optimized_count: planned.plan.optimized_count(),
            savings_percent: planned.plan.savings_percent(),
            overpayments: planned.balances.overpayments().to_vec(),
        })
    }

    /// Execute the settlement for a group.
    ///
    /// Concurrent calls for the same group run one at a time; a call that
    /// waits longer than the configured lock timeout fails with
    /// [`EngineError::Busy`].
    pub fn settle(&self, group: &GroupId) -> Result<ExecutionReport, EngineError> {
        self.locks
            .with_group(group, || self.executor.execute(&self.store, group))
    }

    /// Paid, owed and net totals of every attendee with open records, in
    /// id order.
    pub fn balances(&self, group: &GroupId) -> Result<Vec<AttendeeBalance>, EngineError> {
        let names = self.names(group)?;
        let planned = self.executor.plan(&self.store, group)?;

        Ok(planned
            .balances
            .ledger()
            .all_positions()
            .iter()
            .map(|(attendee, &net)| {
                let totals = planned.balances.totals_for(attendee);
                AttendeeBalance {
                    attendee_id: attendee.clone(),
                    name: display_name(&names, attendee),
                    total_paid_cents: totals.paid,
                    total_owed_cents: totals.owed,
                    net_cents: net,
                }
            })
            .collect())
    }

    fn names(&self, group: &GroupId) -> Result<HashMap<AttendeeId, String>, EngineError> {
        Ok(self
            .store
            .list_attendees(group)?
            .into_iter()
            .map(|attendee| (attendee.id, attendee.name))
            .collect())
    }
}

fn display_name(names: &HashMap<AttendeeId, String>, attendee: &AttendeeId) -> String {
    names
        .get(attendee)
        .cloned()
        .unwrap_or_else(|| attendee.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attendee::Attendee;
    use crate::core::expense::Expense;
    use crate::execution::memory::{GroupRecord, InMemoryStore};

    fn service() -> SettlementService<InMemoryStore> {
        let store = InMemoryStore::new().with_group(
            "trip",
            GroupRecord::new()
                .with_attendee(Attendee::new("alice", "Alice"))
                .with_attendee(Attendee::new("bob", "Bob"))
                .with_expense(
                    Expense::new("e1", "alice", Money::from_cents(10000))
                        .split_evenly(["alice", "bob"]),
                )
                .with_expense(
                    Expense::new("e2", "bob", Money::from_cents(5000))
                        .split_evenly(["alice", "bob"]),
                ),
        );
        SettlementService::new(store, &EngineConfig::default())
    }

    #[test]
    fn test_preview_resolves_names() {
        let view = service().preview(&GroupId::new("trip")).unwrap();

        assert_eq!(view.settlements.len(), 1);
        let entry = &view.settlements[0];
        assert_eq!(entry.from_name, "Bob");
        assert_eq!(entry.to_name, "Alice");
        assert_eq!(entry.amount_cents, Money::from_cents(2500));
        assert_eq!(view.original_count, 1);
        assert_eq!(view.optimized_count, 1);
    }

    #[test]
    fn test_preview_json_shape() {
        let view = service().preview(&GroupId::new("trip")).unwrap();
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["settlements"][0]["fromName"], "Bob");
        assert_eq!(json["settlements"][0]["amountCents"], 2500);
        assert_eq!(json["original_count"], 1);
        assert!(json["savings_percent"].is_number());
        assert!(json.get("overpayments").is_none());
    }

    #[test]
    fn test_savings_percent_is_a_json_number() {
        // a owes b and b owes c: two debts, one payment
        let store = InMemoryStore::new().with_group(
            "chain",
            GroupRecord::new()
                .with_expense(Expense::new("e1", "b", Money::from_cents(1000)).split_evenly(["a"]))
                .with_expense(Expense::new("e2", "c", Money::from_cents(1000)).split_evenly(["b"])),
        );
        let view = SettlementService::new(store, &EngineConfig::default())
            .preview(&GroupId::new("chain"))
            .unwrap();
        assert_eq!(view.original_count, 2);
        assert_eq!(view.optimized_count, 1);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json["savings_percent"].is_number());
        assert_eq!(json["savings_percent"].as_f64(), Some(50.0));
    }

    #[test]
    fn test_unknown_attendee_falls_back_to_id() {
        let store = InMemoryStore::new().with_group(
            "trip",
            GroupRecord::new().with_expense(
                Expense::new("e1", "zed", Money::from_cents(200)).split_evenly(["zed", "yan"]),
            ),
        );
        let view = SettlementService::new(store, &EngineConfig::default())
            .preview(&GroupId::new("trip"))
            .unwrap();
        assert_eq!(view.settlements[0].from_name, "yan");
    }

    #[test]
    fn test_settle_then_preview_is_empty() {
        let service = service();
        let group = GroupId::new("trip");

        let report = service.settle(&group).unwrap();
        assert_eq!(report.payments_created, 1);
        assert_eq!(report.expenses_settled, 2);

        let view = service.preview(&group).unwrap();
        assert!(view.settlements.is_empty());
        assert!(service.balances(&group).unwrap().is_empty());
    }

    #[test]
    fn test_balances() {
        let balances = service().balances(&GroupId::new("trip")).unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].name, "Alice");
        assert_eq!(balances[0].net_cents, Money::from_cents(2500));
        assert_eq!(balances[1].net_cents, Money::from_cents(-2500));

        // alice fronted 10000 and owes half of both expenses
        assert_eq!(balances[0].total_paid_cents, Money::from_cents(10000));
        assert_eq!(balances[0].total_owed_cents, Money::from_cents(7500));
        for balance in &balances {
            assert_eq!(
                balance.total_paid_cents - balance.total_owed_cents,
                balance.net_cents
            );
        }

        let json = serde_json::to_value(&balances).unwrap();
        assert_eq!(json[1]["totalPaidCents"], 5000);
        assert_eq!(json[1]["totalOwedCents"], 7500);
    }
}
