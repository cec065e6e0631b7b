//! Subcommand handlers

pub mod replay;
pub mod run;
pub mod strategies;
