use crate::core::attendee::AttendeeId;
use crate::core::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a payment.
///
/// `Confirmed` payments reduce open balances. `Reconciled` payments were
/// closed together with the expenses they offset and no longer count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Confirmed,
    Reconciled,
}

/// How the money moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Venmo,
    PayPal,
    CashApp,
    Zelle,
    /// Recorded by the settlement executor.
    Settlement,
    Other,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Venmo => "venmo",
            PaymentMethod::PayPal => "paypal",
            PaymentMethod::CashApp => "cashapp",
            PaymentMethod::Zelle => "zelle",
            PaymentMethod::Settlement => "settlement",
            PaymentMethod::Other => "other",
        };
        f.write_str(name)
    }
}

/// Money that has moved (or is recorded as owed-and-settled) between two attendees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub from_id: AttendeeId,
    pub to_id: AttendeeId,
    pub amount_cents: Money,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// A confirmed payment with a fresh id.
    pub fn confirmed(
        from_id: impl Into<AttendeeId>,
        to_id: impl Into<AttendeeId>,
        amount_cents: Money,
        method: PaymentMethod,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_id: from_id.into(),
            to_id: to_id.into(),
            amount_cents,
            status: PaymentStatus::Confirmed,
            method,
            note: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == PaymentStatus::Confirmed
    }
}

/// A payment the engine asks the store to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub from_id: AttendeeId,
    pub to_id: AttendeeId,
    pub amount_cents: Money,
    pub method: PaymentMethod,
    pub note: String,
}

impl NewPayment {
    /// Materialize as a confirmed payment record.
    pub fn into_payment(self) -> Payment {
        Payment::confirmed(self.from_id, self.to_id, self.amount_cents, self.method)
            .with_note(self.note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmed_payment() {
        let payment =
            Payment::confirmed("bob", "alice", Money::from_cents(3000), PaymentMethod::Venmo);
        assert!(payment.is_confirmed());
        assert_eq!(payment.from_id.as_str(), "bob");
        assert_eq!(payment.to_id.as_str(), "alice");
    }

    #[test]
    fn test_pending_payment_is_not_confirmed() {
        let payment = Payment::confirmed("bob", "alice", Money::from_cents(1), PaymentMethod::Cash)
            .with_status(PaymentStatus::Pending);
        assert!(!payment.is_confirmed());
    }

    #[test]
    fn test_method_serializes_lowercase() {
        let json = serde_json::to_string(&PaymentMethod::CashApp).unwrap();
        assert_eq!(json, "\"cashapp\"");
        assert_eq!(PaymentMethod::PayPal.to_string(), "paypal");
    }

    #[test]
    fn test_new_payment_into_payment() {
        let new = NewPayment {
            from_id: AttendeeId::new("bob"),
            to_id: AttendeeId::new("alice"),
            amount_cents: Money::from_cents(2500),
            method: PaymentMethod::Settlement,
            note: "Settlement: bob pays alice $25.00".to_string(),
        };
        let payment = new.into_payment();
        assert!(payment.is_confirmed());
        assert_eq!(payment.method, PaymentMethod::Settlement);
        assert_eq!(payment.note.as_deref(), Some("Settlement: bob pays alice $25.00"));
    }
}
