//! Configuration module.
//!
//! This module provides:
//! - Constants (defaults, limits, reserved index characters)
//! - The library `Config` struct and logging enums
//! - The command-line parser

pub mod cli;
mod constants;
mod types;

pub use constants::*;
pub use types::{Config, LogFormat, LogLevel};
