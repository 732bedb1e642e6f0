//! CLI error types and exit codes

use thiserror::Error;

use rostersync_core::SyncError;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Change guard tripped
/// - 3: Configuration or input error
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Sync(err) if err.is_guard_tripped() => 2,
            CliError::Sync(SyncError::Config(_)) | CliError::Config(_) => 3,
            CliError::Sync(_) => 1,
        }
    }

    pub fn print(&self) {
        eprintln!("Error: {self}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_trip_maps_to_exit_code_2() {
        let err = CliError::Sync(SyncError::GuardTripped {
            changes: 10,
            keeps: 1,
            threshold: 5,
        });
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn config_errors_map_to_exit_code_3() {
        let err = CliError::Sync(SyncError::Config("bad roster".into()));
        assert_eq!(err.exit_code(), 3);
        let err = CliError::Config("missing credentials".into());
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn remote_errors_map_to_exit_code_1() {
        let err = CliError::Sync(SyncError::Remote {
            context: "user listing".into(),
            message: "503".into(),
        });
        assert_eq!(err.exit_code(), 1);
    }
}
