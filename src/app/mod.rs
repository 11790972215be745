//! App module - shared application state and commands
//!
//! Provides the state and command language used by the CLI.

mod state;
mod commands;

pub use state::*;
pub use commands::*;
