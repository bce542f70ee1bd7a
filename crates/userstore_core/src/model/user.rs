//! User domain model.
//!
//! # Responsibility
//! - Define the single entity persisted by the user store.
//! - Provide field checks for outer surfaces that want to reject bad input
//!   before it reaches storage.
//!
//! # Invariants
//! - `id == 0` means the user has not been persisted yet.
//! - `id` is assigned by the store on insert and never changes afterwards.
//! - `(surname, name, age)` is unique among live rows.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned user identifier.
pub type UserId = i64;

/// Upper bound for `surname` and `name`, mirroring `VARCHAR(50)` in the schema.
pub const MAX_NAME_CHARS: usize = 50;

/// Persisted user record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Zero until the store assigns an id on insert.
    #[serde(default, skip_serializing_if = "is_unassigned")]
    pub id: UserId,
    pub surname: String,
    pub name: String,
    /// Must be strictly positive; enforced by a schema `CHECK`.
    pub age: i64,
}

/// Field-level validation failure for user payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    EmptyField(&'static str),
    FieldTooLong { field: &'static str, max_chars: usize },
    NonPositiveAge(i64),
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "{field} must not be empty"),
            Self::FieldTooLong { field, max_chars } => {
                write!(f, "{field} must be at most {max_chars} characters")
            }
            Self::NonPositiveAge(age) => write!(f, "age must be positive, got {age}"),
        }
    }
}

impl Error for UserValidationError {}

impl User {
    /// Creates a user that has not been persisted yet.
    pub fn new(surname: impl Into<String>, name: impl Into<String>, age: i64) -> Self {
        Self::with_id(0, surname, name, age)
    }

    /// Creates a user carrying an already assigned id.
    pub fn with_id(
        id: UserId,
        surname: impl Into<String>,
        name: impl Into<String>,
        age: i64,
    ) -> Self {
        Self {
            id,
            surname: surname.into(),
            name: name.into(),
            age,
        }
    }

    /// Returns whether the store has assigned an id to this user.
    pub fn is_persisted(&self) -> bool {
        !is_unassigned(&self.id)
    }

    /// Checks field bounds declared by the backing schema.
    ///
    /// Storage does not call this; writes that break the age `CHECK` are
    /// reported by the store itself.
    pub fn validate(&self) -> Result<(), UserValidationError> {
        validate_name_field("surname", &self.surname)?;
        validate_name_field("name", &self.name)?;
        if self.age <= 0 {
            return Err(UserValidationError::NonPositiveAge(self.age));
        }
        Ok(())
    }
}

fn validate_name_field(field: &'static str, value: &str) -> Result<(), UserValidationError> {
    if value.trim().is_empty() {
        return Err(UserValidationError::EmptyField(field));
    }
    if value.chars().count() > MAX_NAME_CHARS {
        return Err(UserValidationError::FieldTooLong {
            field,
            max_chars: MAX_NAME_CHARS,
        });
    }
    Ok(())
}

fn is_unassigned(id: &UserId) -> bool {
    *id == 0
}
