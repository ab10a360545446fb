pub mod aggregator;
pub mod shares;
