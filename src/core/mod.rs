//! Core types and constants for the proximity engine

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
