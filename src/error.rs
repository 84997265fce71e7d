use std::path::PathBuf;

use thiserror::Error;

/// A single failed constraint on a candidate record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("{field} must be between {min} and {max} (got {value})")]
    MarkOutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{field} must not contain commas or line breaks")]
    ForbiddenCharacter { field: &'static str },

    #[error("another student already has code {code}")]
    DuplicateCode { code: String },
}

impl Violation {
    pub fn reason(&self) -> &'static str {
        match self {
            Violation::EmptyField { .. } => "empty_field",
            Violation::ForbiddenCharacter { .. } => "invalid_character",
            Violation::MarkOutOfRange { .. } => "mark_out_of_range",
            Violation::DuplicateCode { .. } => "duplicate_code",
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            Violation::EmptyField { field }
            | Violation::ForbiddenCharacter { field }
            | Violation::MarkOutOfRange { field, .. } => *field,
            Violation::DuplicateCode { .. } => "code",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("student file not found: {}", .path.display())]
    SourceNotFound { path: PathBuf },

    #[error("failed to read student file {}: {source}", .path.display())]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no student matches \"{query}\"")]
    NoMatch { query: String },

    #[error("no student with code {code}")]
    UnknownCode { code: String },

    #[error("{}", join_violations(.0))]
    ValidationFailed(Vec<Violation>),

    #[error("index {index} is out of range (collection has {len} students)")]
    OutOfRange { index: usize, len: usize },

    #[error("no student records loaded")]
    EmptyCollection,

    #[error("unsaved changes to {} would be discarded; flush first or pass force", .path.display())]
    UnsavedChanges { path: PathBuf },

    #[error("failed to save student file {}: {source}", .path.display())]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Stable machine-readable code used on the IPC channel.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::SourceNotFound { .. }
            | StoreError::NoMatch { .. }
            | StoreError::UnknownCode { .. } => "not_found",
            StoreError::LoadFailed { .. } => "load_failed",
            StoreError::ValidationFailed(_) => "validation_failed",
            StoreError::OutOfRange { .. } => "out_of_range",
            StoreError::EmptyCollection => "empty_collection",
            StoreError::UnsavedChanges { .. } => "dirty_store",
            StoreError::PersistFailed { .. } => "persist_failed",
        }
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            StoreError::ValidationFailed(v) => v,
            _ => &[],
        }
    }

    pub fn has_violation(&self, reason: &str) -> bool {
        self.violations().iter().any(|v| v.reason() == reason)
    }
}

fn join_violations(violations: &[Violation]) -> String {
    let parts: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_names_each_constraint() {
        let e = StoreError::ValidationFailed(vec![
            Violation::EmptyField { field: "name" },
            Violation::MarkOutOfRange {
                field: "c2",
                value: 25,
                min: 0,
                max: 20,
            },
        ]);
        assert_eq!(e.code(), "validation_failed");
        assert_eq!(
            e.to_string(),
            "name must not be empty; c2 must be between 0 and 20 (got 25)"
        );
        assert!(e.has_violation("mark_out_of_range"));
        assert!(!e.has_violation("duplicate_code"));
    }

    #[test]
    fn not_found_family_shares_a_code() {
        let a = StoreError::NoMatch {
            query: "zz".to_string(),
        };
        let b = StoreError::SourceNotFound {
            path: PathBuf::from("missing.txt"),
        };
        assert_eq!(a.code(), "not_found");
        assert_eq!(b.code(), "not_found");
        assert!(a.violations().is_empty());
    }

    #[test]
    fn forbidden_character_names_its_field() {
        let v = Violation::ForbiddenCharacter { field: "name" };
        assert_eq!(v.reason(), "invalid_character");
        assert_eq!(v.field(), "name");
        assert_eq!(v.to_string(), "name must not contain commas or line breaks");
        let e = StoreError::UnsavedChanges {
            path: PathBuf::from("marks.txt"),
        };
        assert_eq!(e.code(), "dirty_store");
    }
}
