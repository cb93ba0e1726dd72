//! Error types for record creation, commands, and the engine service.

use std::io;

use thiserror::Error;

use crate::engine::EngineError;
use crate::locator::LocatorError;
use crate::record::TransferState;

/// Why a record could not be created. The registry is left unchanged.
#[derive(Debug, Error)]
pub enum CreateError {
    #[error("already downloading {0}")]
    DuplicateLocator(String),
    #[error("invalid locator: {0}")]
    InvalidLocator(String),
    #[error("cannot open destination: {0}")]
    Io(#[from] io::Error),
}

impl From<LocatorError> for CreateError {
    fn from(e: LocatorError) -> Self {
        CreateError::InvalidLocator(e.to_string())
    }
}

/// Failure of one command surface call. Never fatal.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("nothing selected")]
    NoSelection,
    #[error("cannot {action} a {state} download")]
    InvalidTransition {
        action: &'static str,
        state: TransferState,
    },
    #[error("no match for \"{0}\"")]
    NotFound(String),
    #[error(transparent)]
    Create(#[from] CreateError),
    #[error("engine: {0}")]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Errors of the engine service thread as seen by the input side.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("engine setup failed: {0}")]
    Setup(#[source] EngineError),
    #[error("engine thread stopped")]
    Stopped,
}
