//! Command line interface of the `glaive` binary.

pub mod args;
pub mod commands;
pub mod output;

pub use args::GlaiveArgs;
pub use commands::execute_command;
