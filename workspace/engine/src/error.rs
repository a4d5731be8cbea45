use thiserror::Error;

/// Error types for the recurrence engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed rule spec at creation or update time
    #[error("validation error: {0}")]
    Validation(String),

    /// Interval or anchor day outside the allowed range
    #[error("invalid frequency: {0}")]
    InvalidFrequency(String),

    /// Occurrence counts that cannot describe a valid installment plan,
    /// including shrinking a plan below what has already been generated
    #[error("invalid installment plan: {0}")]
    InvalidInstallmentPlan(String),

    /// Operation referenced a rule that does not exist or is deleted
    #[error("rule {0} not found")]
    NotFound(i32),

    /// Optimistic-lock failure; the caller should re-read the rule and
    /// retry the whole operation
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Transient persistence failure; the cursor stays consistent with the
    /// committed occurrences, so the operation is safely retryable
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Type alias for Result with EngineError
pub type Result<T> = std::result::Result<T, EngineError>;
