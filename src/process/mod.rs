//! Child process control and output monitoring.

mod child;
mod monitor;

pub use child::*;
pub use monitor::*;
