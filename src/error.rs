//! Top-level error type.

use crate::config::ConfigError;
use crate::supervisor::SupervisorError;

/// Any error that ends a run before a final exit code is known.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}
