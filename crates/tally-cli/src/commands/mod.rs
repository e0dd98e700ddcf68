pub mod audit;
pub mod common;
pub mod config;
pub mod queue;
pub mod restore;
pub mod status;
pub mod sync;
