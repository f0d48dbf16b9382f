//! Subcommand implementations

pub mod mirror;
pub mod tag;
