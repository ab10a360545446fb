pub mod executor;
pub mod locks;
pub mod memory;
pub mod store;
