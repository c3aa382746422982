//! Command-line interface
//!
//! Clap argument definitions and command handlers for the `slimy` binary.

pub mod args;
pub mod commands;
