use std::fmt;

use platform_authz::AuthzError;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing")]
    MissingUrl,
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Authz(#[from] AuthzError),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub(crate) fn not_found(entity: &'static str, id: Uuid) -> Self {
        DbError::NotFound { entity, id }
    }

    /// Validation failures and denials are part of normal traffic. Anything
    /// else is a wiring or infrastructure problem.
    pub fn is_expected(&self) -> bool {
        match self {
            DbError::Validation(_) => true,
            DbError::Authz(err) => err.is_expected(),
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub reason: String,
}

/// Every field that failed validation, reported together.
#[derive(Clone, Debug, Default, Error, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub fields: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn single(field: &'static str, reason: impl Into<String>) -> Self {
        let mut err = Self::default();
        err.push(field, reason);
        err
    }

    pub fn push(&mut self, field: &'static str, reason: impl Into<String>) {
        self.fields.push(FieldViolation {
            field,
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|v| v.field == field)
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|v| v.field).collect()
    }

    pub(crate) fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("validation failed")?;
        for (idx, violation) in self.fields.iter().enumerate() {
            let sep = if idx == 0 { ": " } else { ", " };
            write!(f, "{sep}{} {}", violation.field, violation.reason)?;
        }
        Ok(())
    }
}
