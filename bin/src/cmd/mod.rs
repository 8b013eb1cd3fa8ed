//! CLI subcommand modules.
//!
//! This module contains the implementations for all metrica CLI subcommands.

pub(crate) mod candidates;
pub(crate) mod check;
pub(crate) mod compute;
pub(crate) mod rules;
