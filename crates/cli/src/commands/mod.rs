//! CLI subcommand implementations

pub mod detect;
pub mod results;
pub mod simulate;
