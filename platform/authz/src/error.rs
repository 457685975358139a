use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("no predicate registered for action `{action}` on {resource_type}")]
    UnknownAction {
        resource_type: String,
        action: String,
    },
    #[error("no policy registered for resource type {resource_type}")]
    PolicyNotFound { resource_type: String },
    #[error(
        "subject {subject_id} may not {action} {resource_type} {}",
        .resource_id.as_deref().unwrap_or("(unsaved)")
    )]
    NotAuthorized {
        subject_id: Uuid,
        action: String,
        resource_type: String,
        resource_id: Option<String>,
    },
}

impl AuthzError {
    /// Denials happen during normal operation; the other variants point at a
    /// missing registration and should be logged as configuration errors.
    pub fn is_expected(&self) -> bool {
        matches!(self, AuthzError::NotAuthorized { .. })
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthzError::UnknownAction { .. } => "UNKNOWN_ACTION",
            AuthzError::PolicyNotFound { .. } => "POLICY_NOT_FOUND",
            AuthzError::NotAuthorized { .. } => "FORBIDDEN",
        }
    }
}
