//! Error taxonomy for per-job and per-target failures.
//!
//! Every variant here is absorbed somewhere below the fleet boundary: job-level
//! errors become absent entries in the target's report list, and anything that
//! escapes a worker is caught by the dispatcher and recorded as a failed
//! target. Nothing propagates above [`crate::fleet::dispatch`].

use thiserror::Error;

/// A failure while driving one job against one execution target.
#[derive(Debug, Error)]
pub enum TargetError {
    /// The target was not present or responsive at job start.
    #[error("target {0} is unreachable")]
    Unreachable(String),

    /// A push or pull did not produce the expected file.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The remote command exited abnormally or produced no measurable output.
    #[error("execution failed: {0}")]
    Execution(String),

    /// The result artifact was missing or could not be parsed.
    #[error("result artifact missing or malformed: {0}")]
    ResultMissing(String),

    /// Host-side file I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TargetError {
    /// Short machine-friendly label for progress logging and skip accounting.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "unreachable",
            Self::Transfer(_) => "transfer",
            Self::Execution(_) => "execution",
            Self::ResultMissing(_) => "result_missing",
            Self::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_labels() {
        assert_eq!(TargetError::Unreachable("d1".into()).kind(), "unreachable");
        assert_eq!(TargetError::Transfer("push".into()).kind(), "transfer");
        assert_eq!(TargetError::Execution("exit 1".into()).kind(), "execution");
        assert_eq!(
            TargetError::ResultMissing("no output.json".into()).kind(),
            "result_missing"
        );
    }

    #[test]
    fn test_error_display_includes_context() {
        let e = TargetError::Unreachable("emulator-5554".into());
        assert!(e.to_string().contains("emulator-5554"));
    }
}
