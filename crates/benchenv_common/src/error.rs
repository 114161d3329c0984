//! Error types for benchenv.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} doesn't exist")]
    NotFound(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("privileged operation on {target} was refused ({status})")]
    PermissionDenied { target: String, status: String },

    #[error("{0}")]
    InvalidValue(String),

    #[error("frequency {value} cannot be outside hardware limits [{min}, {max}]")]
    OutOfRange { value: u64, min: u64, max: u64 },

    #[error("unknown CPU vendor")]
    UnknownVendor,

    #[error("snapshot file {} not found", .0.display())]
    SnapshotMissing(PathBuf),

    #[error("failed while synchronizing: {0}")]
    SyncFailed(String),

    #[error("turbo boost control {} doesn't exist", .0.display())]
    BoostUnsupported(PathBuf),

    #[error("failed while setting swap: {0}")]
    Swap(#[source] Box<Error>),

    #[error("malformed snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("interrupted")]
    Interrupted,
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit status the CLI reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Interrupted => 130,
            _ => 1,
        }
    }

    /// True for failures caused by the platform lacking a control, as opposed
    /// to a refused or broken write.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::BoostUnsupported(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::Interrupted.exit_code(), 130);
        assert_eq!(Error::UnknownVendor.exit_code(), 1);
        assert_eq!(Error::SnapshotMissing(PathBuf::from("x")).exit_code(), 1);
    }

    #[test]
    fn test_swap_error_message_keeps_cause() {
        let err = Error::Swap(Box::new(Error::PermissionDenied {
            target: "swapoff -a".to_string(),
            status: "exit status: 1".to_string(),
        }));
        let msg = err.to_string();
        assert!(msg.starts_with("failed while setting swap"));
        assert!(msg.contains("swapoff -a"));
    }

    #[test]
    fn test_out_of_range_message() {
        let err = Error::OutOfRange {
            value: 10,
            min: 800_000,
            max: 3_600_000,
        };
        assert_eq!(
            err.to_string(),
            "frequency 10 cannot be outside hardware limits [800000, 3600000]"
        );
    }
}
