//! CLI subcommands

pub mod collect;
pub mod show;
pub mod validate;
