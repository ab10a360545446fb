pub mod components;
pub mod debt_graph;
