pub mod greedy;
pub mod optimizer;
pub mod single_flight;
pub mod solver;
