use crate::balance::shares::resolve_shares;
use crate::config::OverpaymentPolicy;
use crate::core::attendee::AttendeeId;
use crate::core::expense::{Expense, ExpenseError, ExpenseId};
use crate::core::ledger::Ledger;
use crate::core::money::Money;
use crate::core::payment::Payment;
use crate::error::{EngineError, ImbalanceError};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Directed bucket for one ordered pair `(debtor, creditor)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairBucket {
    /// Shares the debtor owes the creditor from open expenses.
    pub owed: Money,
    /// Confirmed payments from the debtor to the creditor.
    pub paid: Money,
    /// Expenses that contributed to `owed`.
    pub expense_ids: BTreeSet<ExpenseId>,
}

impl PairBucket {
    /// Signed amount: positive means the debtor still owes the creditor.
    pub fn amount(&self) -> Money {
        self.owed - self.paid
    }
}

/// What one attendee has put in and taken out of the group.
///
/// `paid` counts expenses fronted plus payments sent; `owed` counts
/// expense shares plus payments received. Their difference is the
/// attendee's net position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeTotals {
    pub paid: Money,
    pub owed: Money,
}

impl AttendeeTotals {
    pub fn net(&self) -> Money {
        self.paid - self.owed
    }
}

/// Payments between two attendees that exceed what the expenses between
/// them justify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overpayment {
    pub payer: AttendeeId,
    pub payee: AttendeeId,
    pub excess: Money,
}

/// Output of the balance aggregation: directed pair buckets plus
/// per-attendee net positions.
#[derive(Debug, Clone, Default)]
pub struct PairwiseBalances {
    buckets: BTreeMap<(AttendeeId, AttendeeId), PairBucket>,
    ledger: Ledger,
    totals: BTreeMap<AttendeeId, AttendeeTotals>,
    overpayments: Vec<Overpayment>,
    expense_count: usize,
    payment_count: usize,
}

impl PairwiseBalances {
    /// "A owes B this many cents"; negative means the reverse.
    pub fn owes(&self, a: &AttendeeId, b: &AttendeeId) -> Money {
        let forward = self
            .buckets
            .get(&(a.clone(), b.clone()))
            .map(PairBucket::amount)
            .unwrap_or_default();
        let backward = self
            .buckets
            .get(&(b.clone(), a.clone()))
            .map(PairBucket::amount)
            .unwrap_or_default();
        forward - backward
    }

    pub fn buckets(&self) -> &BTreeMap<(AttendeeId, AttendeeId), PairBucket> {
        &self.buckets
    }

    pub fn bucket(&self, debtor: &AttendeeId, creditor: &AttendeeId) -> Option<&PairBucket> {
        self.buckets.get(&(debtor.clone(), creditor.clone()))
    }

    /// Net position per attendee (credit positive).
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn totals(&self) -> &BTreeMap<AttendeeId, AttendeeTotals> {
        &self.totals
    }

    /// Paid and owed totals for one attendee; zero for strangers.
    pub fn totals_for(&self, attendee: &AttendeeId) -> AttendeeTotals {
        self.totals.get(attendee).copied().unwrap_or_default()
    }

    pub fn overpayments(&self) -> &[Overpayment] {
        &self.overpayments
    }

    /// Number of expenses that contributed.
    pub fn expense_count(&self) -> usize {
        self.expense_count
    }

    /// Number of payments that contributed.
    pub fn payment_count(&self) -> usize {
        self.payment_count
    }

    fn totals_mut(&mut self, attendee: &AttendeeId) -> &mut AttendeeTotals {
        self.totals.entry(attendee.clone()).or_default()
    }

    fn bucket_mut(&mut self, debtor: &AttendeeId, creditor: &AttendeeId) -> &mut PairBucket {
        self.buckets
            .entry((debtor.clone(), creditor.clone()))
            .or_default()
    }
}

/// Folds a group's open expenses and confirmed payments into pairwise
/// balances.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceAggregator {
    policy: OverpaymentPolicy,
}

impl BalanceAggregator {
    pub fn new(policy: OverpaymentPolicy) -> Self {
        Self { policy }
    }

    /// Aggregate expenses and payments.
    ///
    /// Settled or deleted expenses and unconfirmed payments are skipped, so
    /// callers may pass unfiltered records.
    ///
    /// # Algorithm
    ///
    /// 1. Resolve each open expense into shares. Every share owed by P to the
    ///    payer Q (P ≠ Q) is added to bucket `(P, Q)`.
    /// 2. Every confirmed payment `from → to` is subtracted from bucket
    ///    `(from, to)`. Overpayment is allowed and flips the sign.
    /// 3. Net positions are computed independently as paid minus owed per
    ///    attendee and must match the bucket totals and sum to zero.
    ///
    /// Records whose amounts would overflow `i64` cents once booked are
    /// rejected as invalid input rather than wrapped.
    pub fn aggregate(
        &self,
        expenses: &[Expense],
        payments: &[Payment],
    ) -> Result<PairwiseBalances, EngineError> {
        let mut balances = PairwiseBalances::default();
        // Doubled running total of every booked amount. While it fits, every
        // bucket, total and position derived from the records fits too.
        let mut volume = Money::ZERO;

        for expense in expenses.iter().filter(|e| e.is_open()) {
            let shares = resolve_shares(expense)?;
            let payer = expense.payer_id();
            balances.ledger.touch(payer);

            if !shares.is_empty() {
                volume = add_volume(volume, expense.amount_cents()).ok_or_else(|| {
                    ExpenseError::AmountOverflow {
                        expense: expense.id().clone(),
                    }
                })?;
                balances.totals_mut(payer).paid += expense.amount_cents();
            }

            for share in &shares {
                balances.totals_mut(&share.attendee_id).owed += share.share_cents;
                balances.ledger.touch(&share.attendee_id);

                // Self-share nets to zero
                if &share.attendee_id == payer || share.share_cents.is_zero() {
                    continue;
                }
                let bucket = balances.bucket_mut(&share.attendee_id, payer);
                bucket.owed += share.share_cents;
                bucket.expense_ids.insert(expense.id().clone());
                balances
                    .ledger
                    .apply_debt(&share.attendee_id, payer, share.share_cents);
            }
            balances.expense_count += 1;
        }

        for payment in payments.iter().filter(|p| p.is_confirmed()) {
            if payment.amount_cents.is_negative() {
                return Err(EngineError::InvalidPayment {
                    payment: payment.id,
                    amount: payment.amount_cents,
                });
            }
            if payment.from_id == payment.to_id {
                warn!(
                    "ignoring self-payment {} of {} by {}",
                    payment.id, payment.amount_cents, payment.from_id
                );
                continue;
            }
            volume = add_volume(volume, payment.amount_cents).ok_or(
                EngineError::PaymentOverflow {
                    payment: payment.id,
                    amount: payment.amount_cents,
                },
            )?;
            balances
                .bucket_mut(&payment.from_id, &payment.to_id)
                .paid += payment.amount_cents;
            balances
                .ledger
                .apply_transfer(&payment.from_id, &payment.to_id, payment.amount_cents);
            balances.totals_mut(&payment.from_id).paid += payment.amount_cents;
            balances.totals_mut(&payment.to_id).owed += payment.amount_cents;
            balances.payment_count += 1;
        }

        let mut paid_minus_owed = Ledger::new();
        for (attendee, totals) in &balances.totals {
            *paid_minus_owed.position_mut(attendee) = totals.net();
        }
        if !paid_minus_owed.is_balanced() {
            let imbalance = ImbalanceError::NonZeroSum {
                stage: "aggregation",
                sum: paid_minus_owed.imbalance(),
            };
            error!("{imbalance}");
            return Err(imbalance.into());
        }
        let attendees: BTreeSet<&AttendeeId> = paid_minus_owed
            .all_positions()
            .keys()
            .chain(balances.ledger.all_positions().keys())
            .collect();
        for attendee in attendees {
            let expected = paid_minus_owed.position(attendee);
            let actual = balances.ledger.position(attendee);
            if actual != expected {
                let imbalance = ImbalanceError::PositionMismatch {
                    stage: "aggregation",
                    attendee: attendee.clone(),
                    expected,
                    actual,
                };
                error!("{imbalance}");
                return Err(imbalance.into());
            }
        }

        let overpayments = detect_overpayments(&balances);
        for op in &overpayments {
            match self.policy {
                OverpaymentPolicy::Carry => debug!(
                    "{} overpaid {} by {}; carried forward",
                    op.payer, op.payee, op.excess
                ),
                OverpaymentPolicy::Flag => warn!(
                    "{} overpaid {} by {}; flagged for reconciliation",
                    op.payer, op.payee, op.excess
                ),
            }
        }
        if self.policy == OverpaymentPolicy::Flag {
            balances.overpayments = overpayments;
        }

        debug!(
            "aggregated {} expenses and {} payments into {} buckets",
            balances.expense_count,
            balances.payment_count,
            balances.buckets.len()
        );
        Ok(balances)
    }
}

fn add_volume(volume: Money, amount: Money) -> Option<Money> {
    volume.checked_add(amount)?.checked_add(amount)
}

/// Compare, per unordered pair, the net of payments against the net of
/// expense shares in the same direction.
fn detect_overpayments(balances: &PairwiseBalances) -> Vec<Overpayment> {
    let mut pairs: BTreeSet<(&AttendeeId, &AttendeeId)> = BTreeSet::new();
    for (a, b) in balances.buckets.keys() {
        if a < b {
            pairs.insert((a, b));
        } else {
            pairs.insert((b, a));
        }
    }

    let mut found = Vec::new();
    for (a, b) in pairs {
        let ab = balances.bucket(a, b).cloned().unwrap_or_default();
        let ba = balances.bucket(b, a).cloned().unwrap_or_default();
        let owed_net = ab.owed - ba.owed;
        let paid_net = ab.paid - ba.paid;

        if paid_net.is_positive() {
            let justified = if owed_net.is_positive() { owed_net } else { Money::ZERO };
            if paid_net > justified {
                found.push(Overpayment {
                    payer: a.clone(),
                    payee: b.clone(),
                    excess: paid_net - justified,
                });
            }
        } else if paid_net.is_negative() {
            let justified = if owed_net.is_negative() { -owed_net } else { Money::ZERO };
            if -paid_net > justified {
                found.push(Overpayment {
                    payer: b.clone(),
                    payee: a.clone(),
                    excess: -paid_net - justified,
                });
            }
        }
    }
    found
}
