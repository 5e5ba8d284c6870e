use std::fmt::{self, Display, Formatter};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone)]
pub enum Error {
    /// The OS display subsystem is not ready; caller should retry later.
    ApiTemporarilyUnavailable,
    /// The target device is absent, the topology is unsatisfiable, or an
    /// unsupported combination was requested (e.g. HDR on a non-HDR device).
    InvalidRequest(String),
    /// An OS setter returned failure, or an OS-reported topology became invalid.
    DisplayDeviceFailure(String),
    /// Persistence store/clear failed.
    PersistenceFailure(String),
    /// A persisted blob failed to deserialize or violated a structural invariant.
    InvalidPersistedState(String),
    /// `revertSettings` could not finish; persistence still holds the owed slices.
    RevertIncomplete,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::ApiTemporarilyUnavailable => write!(f, "display API temporarily unavailable"),
            Error::InvalidRequest(reason) => write!(f, "invalid request: {}", reason),
            Error::DisplayDeviceFailure(reason) => write!(f, "display device failure: {}", reason),
            Error::PersistenceFailure(reason) => write!(f, "persistence failure: {}", reason),
            Error::InvalidPersistedState(reason) => {
                write!(f, "invalid persisted state: {}", reason)
            }
            Error::RevertIncomplete => write!(f, "revert did not complete; state is still owed"),
        }
    }
}

impl std::error::Error for Error {}
