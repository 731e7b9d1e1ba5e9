//! Error types for experiment registration and evaluation.

use thiserror::Error;

/// Result type for engine operations.
pub type ExperimentResult<T> = Result<T, ExperimentError>;

/// Result type for participation storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised while configuring or running the engine.
///
/// Every variant describes a setup-time defect; none of them are retried.
#[derive(Debug, Error)]
pub enum ExperimentError {
    /// Experiment identifier is empty
    #[error("The provided identifier is not a valid identifier")]
    InvalidIdentifier,

    /// Percentage filter probability outside of 0..=100
    #[error("The probability must be between 0 and 100, got {0}")]
    InvalidProbability(i32),

    /// Neither the registration nor the engine provides a filter
    #[error("There must be a filter in the engine or in the registration of test '{0}'")]
    MissingFilter(String),

    /// Neither the registration nor the engine provides a chooser
    #[error("There must be a chooser in the engine or in the registration of test '{0}'")]
    MissingChooser(String),

    /// A test with the same identifier is already registered
    #[error("Duplicate test for identifier '{0}'")]
    DuplicateTest(String),

    /// A variant with the same identifier already exists in the test
    #[error("A variant with identifier '{variant}' has already been added to test '{test}'")]
    DuplicateVariant { test: String, variant: String },

    /// The engine has been started already
    #[error("The engine is locked: {0}")]
    EngineLocked(&'static str),

    /// No test registered under the identifier
    #[error("No test with identifier '{0}' found")]
    TestNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Participation storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A subscriber rejected a dispatched event
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Participation storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Empty test identifier
    #[error("Test identifier is invalid")]
    InvalidIdentifier,

    /// Empty participation value
    #[error("Participation name is invalid")]
    InvalidParticipation,

    /// The response headers were already sent
    #[error("Headers have been sent, cannot save cookie")]
    HeadersSent,

    /// Empty cookie name
    #[error("The cookie name is invalid")]
    InvalidCookieName,

    /// Cookie lifetime too large to compute an expiry date
    #[error("Cookie lifetime of {0} seconds is out of range")]
    InvalidTtl(u64),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Errors raised by subscribers while handling an event.
#[derive(Debug, Error)]
pub enum SubscriberError {
    /// The event does not carry what the subscriber needs
    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),

    /// A required experiment option is missing
    #[error("Option '{option}' must be set on test '{test}'")]
    MissingOption { test: String, option: String },

    /// The variant does not belong to the experiment
    #[error("Variant '{variant}' is not part of test '{test}'")]
    UnknownVariant { test: String, variant: String },
}

/// Dispatcher errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("One or more listeners failed for event '{event}'")]
    ListenersFailed {
        event: &'static str,
        errors: Vec<SubscriberError>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_converts_into_experiment_error() {
        let err: ExperimentError = StorageError::HeadersSent.into();
        assert!(matches!(err, ExperimentError::Storage(StorageError::HeadersSent)));
        assert_eq!(err.to_string(), "Headers have been sent, cannot save cookie");
    }

    #[test]
    fn test_serde_error_conversion() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let storage_err: StorageError = err.into();
        assert!(matches!(storage_err, StorageError::Serialization(_)));
    }

    #[test]
    fn test_messages_name_the_identifier() {
        let err = ExperimentError::DuplicateTest("foo".to_string());
        assert_eq!(err.to_string(), "Duplicate test for identifier 'foo'");

        let err = ExperimentError::DuplicateVariant {
            test: "t1".to_string(),
            variant: "v1".to_string(),
        };
        assert!(err.to_string().contains("'v1'"));
    }
}
