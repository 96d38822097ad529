//! Typed failures raised by the domain services.
//!
//! Services return `anyhow::Result`; these errors are the ones callers may want
//! to match on with `downcast_ref`. Storage read failures and PIN mismatches have
//! no variant: both are absorbed where they happen.

use shared::TaskCategory;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("Child not found: {0}")]
    ChildNotFound(String),

    #[error("Task '{label}' not found in {category} tasks")]
    TaskNotFound { category: TaskCategory, label: String },

    #[error("Task '{label}' already exists in {category} tasks")]
    DuplicateTask { category: TaskCategory, label: String },

    #[error("Task label cannot be empty")]
    EmptyTaskLabel,

    #[error("Child name cannot be empty")]
    EmptyChildName,

    #[error("Child name cannot exceed {0} characters")]
    ChildNameTooLong(usize),

    #[error("PIN cannot be empty")]
    EmptyPin,
}
