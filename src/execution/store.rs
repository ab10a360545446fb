use crate::core::attendee::{Attendee, GroupId};
use crate::core::expense::{Expense, ExpenseId};
use crate::core::payment::{NewPayment, Payment};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("unknown group {0}")]
    GroupNotFound(GroupId),
    #[error("unknown expense {expense} in group {group}")]
    ExpenseNotFound { group: GroupId, expense: ExpenseId },
    #[error("unknown payment {payment} in group {group}")]
    PaymentNotFound { group: GroupId, payment: Uuid },
}

/// Data access the engine needs from the system of record.
///
/// Reads return only records that still contribute to open balances.
/// Writes are individually atomic; the engine never assumes a transaction
/// spans more than one call.
pub trait SettlementStore: Send + Sync {
    fn list_attendees(&self, group: &GroupId) -> Result<Vec<Attendee>, StoreError>;

    /// Pending, non-deleted expenses.
    fn list_open_expenses(&self, group: &GroupId) -> Result<Vec<Expense>, StoreError>;

    /// Confirmed payments that have not been reconciled yet.
    fn list_confirmed_payments(&self, group: &GroupId) -> Result<Vec<Payment>, StoreError>;

    fn create_payment(&self, group: &GroupId, payment: NewPayment) -> Result<Payment, StoreError>;

    fn mark_expense_settled(&self, group: &GroupId, expense: &ExpenseId) -> Result<(), StoreError>;

    fn mark_payment_reconciled(&self, group: &GroupId, payment: Uuid) -> Result<(), StoreError>;
}

impl<S: SettlementStore + ?Sized> SettlementStore for std::sync::Arc<S> {
    fn list_attendees(&self, group: &GroupId) -> Result<Vec<Attendee>, StoreError> {
        (**self).list_attendees(group)
    }

    fn list_open_expenses(&self, group: &GroupId) -> Result<Vec<Expense>, StoreError> {
        (**self).list_open_expenses(group)
    }

    fn list_confirmed_payments(&self, group: &GroupId) -> Result<Vec<Payment>, StoreError> {
        (**self).list_confirmed_payments(group)
    }

    fn create_payment(&self, group: &GroupId, payment: NewPayment) -> Result<Payment, StoreError> {
        (**self).create_payment(group, payment)
    }

    fn mark_expense_settled(&self, group: &GroupId, expense: &ExpenseId) -> Result<(), StoreError> {
        (**self).mark_expense_settled(group, expense)
    }

    fn mark_payment_reconciled(&self, group: &GroupId, payment: Uuid) -> Result<(), StoreError> {
        (**self).mark_payment_reconciled(group, payment)
    }
}
