//! # Error Types
//!
//! Domain-specific error types for loyaltydog-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  loyaltydog-core errors (this file)                                    │
//! │  ├── CoreError        - Points / code derivation failures              │
//! │  └── ValidationError  - Settings and input validation failures         │
//! │                                                                         │
//! │  loyaltydog-client errors (separate crate)                             │
//! │  └── ClientError      - Transport, upstream status, not found, config  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ClientError → log + falsy result  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The configured `points:monetary_value` ratio cannot be used.
    ///
    /// ## When This Occurs
    /// - Either side is not a plain decimal number
    /// - The monetary side is zero while points are configured
    #[error("Invalid points ratio '{ratio}': {reason}")]
    InvalidRatio { ratio: String, reason: String },

    /// Points arithmetic left the representable range.
    #[error("Points calculation overflowed for amount {amount_cents} cents")]
    PointsOverflow { amount_cents: i64 },

    /// A coupon code is not a redemption code produced by this integration.
    #[error("Not a redemption code: {0}")]
    InvalidDiscountCode(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised when admin-entered settings don't meet requirements.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Invalid format (e.g., not a URL, not a number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
