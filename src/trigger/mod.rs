//! Restart triggers evaluated against child output lines and exit codes.

mod matcher;
mod set;

pub use matcher::*;
pub use set::*;
