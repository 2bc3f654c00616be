//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;
use crate::infrastructure::{InfraError, StoreError};

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Usage(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::NotFound(_) => crate::exitcode::NOINPUT,
            CliError::Infra(e) => match e {
                InfraError::Store { source, .. } => store_exit_code(source),
                InfraError::Io { .. } => crate::exitcode::IOERR,
                InfraError::Application(e) => match e {
                    ApplicationError::Domain(DomainError::Configuration(_))
                    | ApplicationError::Config { .. } => crate::exitcode::CONFIG,
                    ApplicationError::Domain(_) => crate::exitcode::DATAERR,
                    ApplicationError::Persistence { source, .. } => store_exit_code(source),
                },
            },
        }
    }
}

fn store_exit_code(e: &StoreError) -> i32 {
    match e {
        StoreError::Io { .. } => crate::exitcode::IOERR,
        StoreError::Corrupt { .. } => crate::exitcode::DATAERR,
        _ => crate::exitcode::SOFTWARE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_invalid_operand_when_mapping_exit_code_then_dataerr() {
        let err: CliError = ApplicationError::from(DomainError::invalid("bad target")).into();
        assert_eq!(err.exit_code(), crate::exitcode::DATAERR);
    }

    #[test]
    fn given_store_io_failure_when_mapping_exit_code_then_ioerr() {
        let source = StoreError::io("write", std::io::Error::other("disk full"));
        let err = CliError::from(InfraError::store("open store", source));
        assert_eq!(err.exit_code(), crate::exitcode::IOERR);
    }

    #[test]
    fn given_bad_config_when_mapping_exit_code_then_config() {
        let err: CliError = ApplicationError::Config {
            message: "broken".into(),
        }
        .into();
        assert_eq!(err.exit_code(), crate::exitcode::CONFIG);
    }
}
