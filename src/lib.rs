//! Relaunch - restart flaky command-line programs on output or exit-code
//! triggers while passing their I/O and exit code through.

pub mod config;
pub mod display;
mod error;
pub mod process;
pub mod supervisor;
pub mod trigger;

pub use error::Error;
