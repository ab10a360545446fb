use crate::core::attendee::{Attendee, GroupId};
use crate::core::expense::{Expense, ExpenseId};
use crate::core::payment::{NewPayment, Payment, PaymentStatus};
use crate::execution::store::{SettlementStore, StoreError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Everything recorded for one group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub payments: Vec<Payment>,
}

impl GroupRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attendee(mut self, attendee: Attendee) -> Self {
        self.attendees.push(attendee);
        self
    }

    pub fn with_expense(mut self, expense: Expense) -> Self {
        self.expenses.push(expense);
        self
    }

    pub fn with_payment(mut self, payment: Payment) -> Self {
        self.payments.push(payment);
        self
    }
}

/// Thread-safe, cloneable in-memory store keyed by group.
///
/// Clones share the same data. Unknown groups read as empty; writes to
/// them fail with [`StoreError::GroupNotFound`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    groups: Arc<RwLock<BTreeMap<GroupId, GroupRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(self, group: impl Into<GroupId>, record: GroupRecord) -> Self {
        self.insert_group(group, record);
        self
    }

    /// Insert or replace a group, returning the previous record.
    pub fn insert_group(
        &self,
        group: impl Into<GroupId>,
        record: GroupRecord,
    ) -> Option<GroupRecord> {
        self.groups.write().insert(group.into(), record)
    }

    /// Snapshot of a group, closed records included.
    pub fn group(&self, group: &GroupId) -> Option<GroupRecord> {
        self.groups.read().get(group).cloned()
    }

    pub fn add_expense(&self, group: &GroupId, expense: Expense) -> Result<(), StoreError> {
        self.update(group, |record| {
            record.expenses.push(expense);
            Ok(())
        })
    }

    pub fn add_payment(&self, group: &GroupId, payment: Payment) -> Result<(), StoreError> {
        self.update(group, |record| {
            record.payments.push(payment);
            Ok(())
        })
    }

    /// Run `f` on a group under the write lock.
    fn update<R>(
        &self,
        group: &GroupId,
        f: impl FnOnce(&mut GroupRecord) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut groups = self.groups.write();
        let record = groups
            .get_mut(group)
            .ok_or_else(|| StoreError::GroupNotFound(group.clone()))?;
        f(record)
    }

    fn read<R>(&self, group: &GroupId, f: impl FnOnce(&GroupRecord) -> R) -> R {
        let groups = self.groups.read();
        match groups.get(group) {
            Some(record) => f(record),
            None => f(&GroupRecord::default()),
        }
    }
}

impl SettlementStore for InMemoryStore {
    fn list_attendees(&self, group: &GroupId) -> Result<Vec<Attendee>, StoreError> {
        Ok(self.read(group, |record| record.attendees.clone()))
    }

    fn list_open_expenses(&self, group: &GroupId) -> Result<Vec<Expense>, StoreError> {
        Ok(self.read(group, |record| {
            record
                .expenses
                .iter()
                .filter(|e| e.is_open())
                .cloned()
                .collect()
        }))
    }

    fn list_confirmed_payments(&self, group: &GroupId) -> Result<Vec<Payment>, StoreError> {
        Ok(self.read(group, |record| {
            record
                .payments
                .iter()
                .filter(|p| p.is_confirmed())
                .cloned()
                .collect()
        }))
    }

    fn create_payment(&self, group: &GroupId, payment: NewPayment) -> Result<Payment, StoreError> {
        self.update(group, |record| {
            let payment = payment.into_payment();
            record.payments.push(payment.clone());
            Ok(payment)
        })
    }

    fn mark_expense_settled(&self, group: &GroupId, expense: &ExpenseId) -> Result<(), StoreError> {
        self.update(group, |record| {
            let found = record
                .expenses
                .iter_mut()
                .find(|e| e.id() == expense)
                .ok_or_else(|| StoreError::ExpenseNotFound {
                    group: group.clone(),
                    expense: expense.clone(),
                })?;
            found.mark_settled();
            Ok(())
        })
    }

    fn mark_payment_reconciled(&self, group: &GroupId, payment: Uuid) -> Result<(), StoreError> {
        self.update(group, |record| {
            let found = record
                .payments
                .iter_mut()
                .find(|p| p.id == payment)
                .ok_or_else(|| StoreError::PaymentNotFound {
                    group: group.clone(),
                    payment,
                })?;
            found.status = PaymentStatus::Reconciled;
            Ok(())
        })
    }
}
