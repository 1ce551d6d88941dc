use specsync_types::InvalidResourceName;
use thiserror::Error;

/// Errors surfaced by the contract store. Both variants have parse-error
/// severity: the caller must fix the document before retrying.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("parse error in contract {name:?}: {message}")]
    Parse { name: String, message: String },

    #[error("invariant violation in contract {name:?}: {violation}")]
    Invariant {
        name: String,
        violation: InvariantViolation,
    },

    #[error("serialize contract {name:?}: {message}")]
    Serialize { name: String, message: String },
}

impl ContractError {
    pub fn parse(name: &str, message: impl Into<String>) -> Self {
        ContractError::Parse {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("operationId {operation_id:?} is used by both {first} and {second}")]
    DuplicateOperationId {
        operation_id: String,
        first: String,
        second: String,
    },

    #[error("{path}: required property {property:?} is not declared in properties")]
    RequiredNotInProperties { path: String, property: String },

    #[error("{path}: duplicate parameter {name:?} in {location}")]
    DuplicateParameter {
        path: String,
        name: String,
        location: String,
    },

    #[error("duplicate route {path:?}")]
    DuplicateRoute { path: String },

    #[error("document declares name {found:?} but was loaded as {expected:?}")]
    NameMismatch { expected: String, found: String },

    #[error(transparent)]
    InvalidName(#[from] InvalidResourceName),
}
