//! Supervisor module for the restart loop and attempt state.

mod outcome;
mod runner;
mod state;

pub use outcome::*;
pub use runner::*;
pub use state::*;
