//! Subcommand implementations.

pub mod assemble;
pub mod export;
pub mod narrow;
pub mod publish;
pub mod translate;
