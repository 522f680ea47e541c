//! # Trellis CLI Library
//!
//! The pieces of the `trellis` binary, exposed so integration tests can
//! drive commands without spawning a process.
//!
//! - [`cli`] - argument parsing and command implementations
//! - [`config`] - layered settings (flags, environment, `trellis.toml`)
//! - [`document`] - the JSON graph document format
//! - [`error`] - [`CliError`](error::CliError)

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
