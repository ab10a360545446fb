//! Random group generation for stress tests, benchmarks and the CLI.

use crate::core::attendee::{Attendee, AttendeeId};
use crate::core::expense::{Expense, ExpenseId, Participant};
use crate::core::money::Money;
use crate::core::payment::{Payment, PaymentMethod};
use crate::execution::memory::GroupRecord;
use rand::seq::SliceRandom;
use rand::Rng;

/// Shape of a generated group.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    pub attendee_count: usize,
    pub expense_count: usize,
    /// Confirmed payments recorded between attendees before settlement.
    pub payment_count: usize,
    /// Expense amounts in cents, inclusive range.
    pub min_amount_cents: i64,
    pub max_amount_cents: i64,
    /// Chance that an expense carries one explicit share.
    pub explicit_share_ratio: f64,
    /// Chance that a non-payer attendee opts out of an expense.
    pub opt_out_ratio: f64,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            attendee_count: 8,
            expense_count: 20,
            payment_count: 3,
            min_amount_cents: 100,
            max_amount_cents: 50_000,
            explicit_share_ratio: 0.1,
            opt_out_ratio: 0.2,
        }
    }
}

pub fn attendee_id(index: usize) -> AttendeeId {
    AttendeeId::new(format!("attendee-{:03}", index))
}

/// Generate a random group using the thread-local RNG.
pub fn generate_group(config: &GroupConfig) -> GroupRecord {
    generate_group_with(&mut rand::thread_rng(), config)
}

/// Generate a random group from the given RNG, so seeded runs reproduce.
///
/// Every generated expense is valid: explicit shares never exceed the
/// amount and at least one opted-in participant takes the remainder.
pub fn generate_group_with<R: Rng + ?Sized>(rng: &mut R, config: &GroupConfig) -> GroupRecord {
    let mut record = GroupRecord::new();
    if config.attendee_count == 0 {
        return record;
    }

    let ids: Vec<AttendeeId> = (0..config.attendee_count).map(attendee_id).collect();
    for (index, id) in ids.iter().enumerate() {
        record.attendees.push(Attendee::new(id.as_str(), format!("Attendee {}", index)));
    }

    let min = config.min_amount_cents.max(1);
    let max = config.max_amount_cents.max(min);

    for n in 0..config.expense_count {
        let payer = ids[rng.gen_range(0..ids.len())].clone();
        let amount = Money::from_cents(rng.gen_range(min..=max));

        let mut participants: Vec<&AttendeeId> = ids
            .iter()
            .filter(|id| **id == payer || !rng.gen_bool(config.opt_out_ratio.clamp(0.0, 1.0)))
            .collect();
        participants.shuffle(rng);

        let id = ExpenseId::new(format!("expense-{:04}", n));
        let mut expense = Expense::new(id, payer.clone(), amount)
            .with_description(format!("Generated expense {}", n));

        // One explicit share at most, leaving the rest to the equal split.
        let explicit = participants.len() > 1
            && rng.gen_bool(config.explicit_share_ratio.clamp(0.0, 1.0));
        for (position, attendee) in participants.iter().enumerate() {
            let participant = if explicit && position == 0 {
                let share = rng.gen_range(0..=amount.cents());
                Participant::with_share((*attendee).clone(), Money::from_cents(share))
            } else {
                Participant::opted_in((*attendee).clone())
            };
            expense = expense.with_participant(participant);
        }
        for id in ids.iter().filter(|id| !participants.contains(id)) {
            expense = expense.with_participant(Participant::opted_out(id.clone()));
        }

        record.expenses.push(expense);
    }

    if ids.len() > 1 {
        for _ in 0..config.payment_count {
            let from = rng.gen_range(0..ids.len());
            let mut to = rng.gen_range(0..ids.len());
            while to == from {
                to = rng.gen_range(0..ids.len());
            }
            let amount = Money::from_cents(rng.gen_range(min..=max) / 4 + 1);
            record.payments.push(Payment::confirmed(
                ids[from].clone(),
                ids[to].clone(),
                amount,
                PaymentMethod::Cash,
            ));
        }
    }

    record
}
