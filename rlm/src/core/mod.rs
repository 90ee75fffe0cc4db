//! Pure logic with no filesystem or process access.

pub mod command;
pub mod config;
pub mod output;
