//! # Error Types
//!
//! Domain-specific error types for mercado-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  mercado-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  mercado-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  mercado-server errors                                                 │
//! │  └── ApiError         - What the UI sees (JSON + HTTP status)          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → UI                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. The server translates
/// them to user-facing messages and HTTP status codes.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found (or is inactive where an active one is needed).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Customer cannot be found.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Insufficient stock to complete sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Denim Jacket", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 Denim Jacket in stock"
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Sale is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Paying a sale that is already paid
    /// - Free-form payment on a sale that has an installment plan
    #[error("Sale {sale_id} is {current_status}, cannot perform operation: {reason}")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
        reason: String,
    },

    /// A credit sale was requested without a customer.
    #[error("Credit sales require a customer")]
    CustomerRequired,

    /// Sale has exceeded maximum allowed lines.
    #[error("Sale cannot have more than {max} lines")]
    TooManyLines { max: usize },

    /// The sale has no installment with this number.
    #[error("Installment {number} does not exist on sale {sale_id}")]
    UnknownInstallment { sale_id: String, number: u32 },

    /// The installment was already paid.
    #[error("Installment {number} on sale {sale_id} is already paid")]
    InstallmentAlreadyPaid { sale_id: String, number: u32 },

    /// Installment plan cannot be built from the request.
    #[error("Invalid installment plan: {reason}")]
    InvalidInstallmentPlan { reason: String },

    /// Payment amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// A price, line or total does not fit in the money range.
    #[error("Amount out of range: {0}")]
    AmountOverflow(String),

    /// Discount is negative or larger than the subtotal.
    #[error("Invalid discount: {reason}")]
    InvalidDiscount { reason: String },

    /// Admin credentials rule violated (e.g. removing the last admin).
    #[error("Admin account error: {reason}")]
    AdminAccount { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., non-digit barcode).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate barcode, duplicate username).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Shorthand for a `Required` error on `field`.
    pub fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
