use crate::core::attendee::AttendeeId;
use crate::core::expense::{Expense, ExpenseError};
use crate::core::money::Money;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One participant's portion of an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    pub attendee_id: AttendeeId,
    pub share_cents: Money,
    /// True when this participant absorbed one remainder cent.
    pub extra_cent: bool,
}

/// Split an expense among its opted-in participants.
///
/// Explicit shares are kept. Whatever remains of the amount is divided by
/// integer division among the other opted-in participants, and the
/// leftover cents go one at a time to those participants in ascending
/// attendee id order, so the shares always add up to the amount exactly.
///
/// The result is sorted by attendee id and includes the payer's own share
/// when the payer opted in. An expense nobody opted into yields no shares.
///
/// # Examples
///
/// ```
/// use settlement_engine::balance::shares::resolve_shares;
/// use settlement_engine::core::expense::Expense;
/// use settlement_engine::core::money::Money;
///
/// let expense = Expense::new("e1", "alice", Money::from_cents(10001))
///     .split_evenly(["charlie", "alice", "bob"]);
///
/// let shares = resolve_shares(&expense).unwrap();
/// let cents: Vec<i64> = shares.iter().map(|s| s.share_cents.cents()).collect();
/// // alice and bob sort first and absorb the two remainder cents
/// assert_eq!(cents, vec![3334, 3334, 3333]);
/// ```
pub fn resolve_shares(expense: &Expense) -> Result<Vec<Share>, ExpenseError> {
    let amount = expense.amount_cents();
    if amount.is_negative() {
        return Err(ExpenseError::NegativeAmount {
            expense: expense.id().clone(),
            amount,
        });
    }

    let mut seen = BTreeSet::new();
    let mut explicit: Vec<Share> = Vec::new();
    let mut equal: Vec<&AttendeeId> = Vec::new();

    for participant in expense.participants() {
        if !seen.insert(&participant.attendee_id) {
            return Err(ExpenseError::DuplicateParticipant {
                expense: expense.id().clone(),
                attendee: participant.attendee_id.clone(),
            });
        }
        if let Some(share) = participant.share_cents {
            if share.is_negative() {
                return Err(ExpenseError::NegativeShare {
                    expense: expense.id().clone(),
                    attendee: participant.attendee_id.clone(),
                    share,
                });
            }
            if !participant.opted_in && !share.is_zero() {
                return Err(ExpenseError::ShareOnOptedOut {
                    expense: expense.id().clone(),
                    attendee: participant.attendee_id.clone(),
                    share,
                });
            }
        }
        if !participant.opted_in {
            continue;
        }
        match participant.share_cents {
            Some(share) => explicit.push(Share {
                attendee_id: participant.attendee_id.clone(),
                share_cents: share,
                extra_cent: false,
            }),
            None => equal.push(&participant.attendee_id),
        }
    }

    if explicit.is_empty() && equal.is_empty() {
        return Ok(Vec::new());
    }

    let explicit_total = explicit
        .iter()
        .try_fold(Money::ZERO, |total, s| total.checked_add(s.share_cents))
        .ok_or_else(|| ExpenseError::AmountOverflow {
            expense: expense.id().clone(),
        })?;
    if explicit_total > amount {
        return Err(ExpenseError::ExplicitSharesExceedAmount {
            expense: expense.id().clone(),
            explicit: explicit_total,
            amount,
        });
    }

    let remaining = amount - explicit_total;
    let mut shares = explicit;

    if equal.is_empty() {
        if !remaining.is_zero() {
            return Err(ExpenseError::UnallocatedRemainder {
                expense: expense.id().clone(),
                explicit: explicit_total,
                amount,
            });
        }
    } else {
        equal.sort();
        let count = equal.len() as i64;
        let base = remaining / count;
        let remainder = (remaining % count).cents();

        for (idx, attendee) in equal.into_iter().enumerate() {
            // First `remainder` participants in id order get an extra cent
            let extra_cent = (idx as i64) < remainder;
            let share_cents = if extra_cent {
                base + Money::from_cents(1)
            } else {
                base
            };
            shares.push(Share {
                attendee_id: attendee.clone(),
                share_cents,
                extra_cent,
            });
        }
    }

    shares.sort_by(|a, b| a.attendee_id.cmp(&b.attendee_id));
    Ok(shares)
}
