//! UI module - Command Line Interface
//!
//! Provides the reedline-based inspection REPL.

pub mod cli;
