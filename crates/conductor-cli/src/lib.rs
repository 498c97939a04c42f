//! Conductor CLI library.
//!
//! Argument definitions live in [`cli`]; each subcommand is handled in
//! [`commands`].

pub mod cli;
pub mod commands;
