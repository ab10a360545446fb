use crate::core::attendee::AttendeeId;
use crate::core::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifier of an expense record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseId(String);

impl ExpenseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExpenseId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Lifecycle of an expense. Only `Pending` expenses contribute to balances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    #[default]
    Pending,
    Settled,
}

/// One attendee's participation in an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub attendee_id: AttendeeId,
    pub opted_in: bool,
    /// Fixed share overriding the equal split.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_cents: Option<Money>,
}

impl Participant {
    pub fn opted_in(attendee_id: impl Into<AttendeeId>) -> Self {
        Self {
            attendee_id: attendee_id.into(),
            opted_in: true,
            share_cents: None,
        }
    }

    pub fn opted_out(attendee_id: impl Into<AttendeeId>) -> Self {
        Self {
            attendee_id: attendee_id.into(),
            opted_in: false,
            share_cents: None,
        }
    }

    pub fn with_share(attendee_id: impl Into<AttendeeId>, share: Money) -> Self {
        Self {
            attendee_id: attendee_id.into(),
            opted_in: true,
            share_cents: Some(share),
        }
    }
}

/// Reasons an expense cannot be split.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpenseError {
    #[error("expense {expense}: amount must not be negative, got {amount}")]
    NegativeAmount { expense: ExpenseId, amount: Money },
    #[error("expense {expense}: share for {attendee} must not be negative, got {share}")]
    NegativeShare {
        expense: ExpenseId,
        attendee: AttendeeId,
        share: Money,
    },
    #[error("expense {expense}: explicit shares total {explicit} exceeds amount {amount}")]
    ExplicitSharesExceedAmount {
        expense: ExpenseId,
        explicit: Money,
        amount: Money,
    },
    #[error(
        "expense {expense}: explicit shares total {explicit} but amount is {amount} \
         and no participant is left to absorb the difference"
    )]
    UnallocatedRemainder {
        expense: ExpenseId,
        explicit: Money,
        amount: Money,
    },
    #[error("expense {expense}: {attendee} opted out but carries a share of {share}")]
    ShareOnOptedOut {
        expense: ExpenseId,
        attendee: AttendeeId,
        share: Money,
    },
    #[error("expense {expense}: {attendee} listed more than once")]
    DuplicateParticipant {
        expense: ExpenseId,
        attendee: AttendeeId,
    },
    #[error("expense {expense}: amounts overflow the representable range of cents")]
    AmountOverflow { expense: ExpenseId },
}

/// A shared cost paid by one attendee on behalf of the opted-in participants.
///
/// # Examples
///
/// ```
/// use settlement_engine::core::expense::Expense;
/// use settlement_engine::core::money::Money;
///
/// let dinner = Expense::new("exp-1", "alice", Money::from_cents(9000))
///     .split_evenly(["alice", "bob", "charlie"])
///     .with_description("Dinner");
///
/// assert_eq!(dinner.participants().len(), 3);
/// assert!(dinner.is_open());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    id: ExpenseId,
    payer_id: AttendeeId,
    amount_cents: Money,
    #[serde(default)]
    participants: Vec<Participant>,
    #[serde(default)]
    status: ExpenseStatus,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_at: Option<DateTime<Utc>>,
}

impl Expense {
    /// Create a pending expense with no participants yet.
    pub fn new(
        id: impl Into<ExpenseId>,
        payer_id: impl Into<AttendeeId>,
        amount_cents: Money,
    ) -> Self {
        Self {
            id: id.into(),
            payer_id: payer_id.into(),
            amount_cents,
            participants: Vec::new(),
            status: ExpenseStatus::Pending,
            description: None,
            category: None,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn with_participant(mut self, participant: Participant) -> Self {
        self.participants.push(participant);
        self
    }

    /// Add every attendee as an opted-in participant with no explicit share.
    pub fn split_evenly<I, A>(mut self, attendees: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AttendeeId>,
    {
        self.participants
            .extend(attendees.into_iter().map(Participant::opted_in));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_status(mut self, status: ExpenseStatus) -> Self {
        self.status = status;
        self
    }

    /// Pending, and not soft-deleted.
    pub fn is_open(&self) -> bool {
        self.status == ExpenseStatus::Pending && self.deleted_at.is_none()
    }

    pub fn mark_settled(&mut self) {
        self.status = ExpenseStatus::Settled;
    }

    pub fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.deleted_at = Some(at);
    }

    // --- Accessors ---

    pub fn id(&self) -> &ExpenseId {
        &self.id
    }

    pub fn payer_id(&self) -> &AttendeeId {
        &self.payer_id
    }

    pub fn amount_cents(&self) -> Money {
        self.amount_cents
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn status(&self) -> ExpenseStatus {
        self.status
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// The payer followed by every opted-in participant, deduplicated and sorted.
    pub fn attendees(&self) -> Vec<AttendeeId> {
        let mut attendees: Vec<AttendeeId> = std::iter::once(self.payer_id.clone())
            .chain(
                self.participants
                    .iter()
                    .filter(|p| p.opted_in)
                    .map(|p| p.attendee_id.clone()),
            )
            .collect();
        attendees.sort();
        attendees.dedup();
        attendees
    }
}
