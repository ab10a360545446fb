pub mod attendee;
pub mod expense;
pub mod ledger;
pub mod money;
pub mod payment;
