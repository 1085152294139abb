//! CLI command implementations.

pub mod delete;
pub mod push;
pub mod serve;
