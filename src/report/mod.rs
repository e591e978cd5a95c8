//! Report rendering.

mod generator;

pub use generator::{render, write_report};
