//! CLI command implementations.

pub mod analyze;
pub mod common;
pub mod compare;
pub mod epochs;
pub mod generate;
pub mod info;
pub mod profiles;
