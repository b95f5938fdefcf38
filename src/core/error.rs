use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UplinkError {
    #[error("{0}")]
    Usage(String),
    #[error("live control file is not writable: {0}")]
    AccessDenied(PathBuf),
    #[error("cannot infer a device identifier from the working directory; pass --device")]
    MissingDeviceId,
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("changes rejected; live control file untouched")]
    Rejected,
    #[error("external command failed: {0}")]
    External(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl UplinkError {
    /// Process exit code: `1` for argument/usage errors, `2` for everything
    /// operational. Success paths never construct an `UplinkError`.
    pub fn exit_code(&self) -> i32 {
        match self {
            UplinkError::Usage(_) => 1,
            _ => 2,
        }
    }
}
