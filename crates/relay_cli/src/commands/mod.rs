//! CLI command implementations.

pub mod apply;
pub mod log;
pub mod revert;
pub mod show;

mod render;
