//! # mercado-core: Pure Business Logic for Mercado
//!
//! This crate holds the retail rules of Mercado as pure functions with zero
//! I/O dependencies: checkout arithmetic, installment schedules, payment
//! bookkeeping and report aggregation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mercado Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Storefront UI / Admin dashboard                 │   │
//! │  │    Catalog ──► POS ──► Inventory ──► Customers ──► Reports      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP/JSON + WebSocket feed             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    mercado-server (axum)                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ mercado-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌─────────────┐ ┌──────────┐       │   │
//! │  │   │  types   │ │ checkout │ │ installment │ │  report  │       │   │
//! │  │   │ Product  │ │ Sale     │ │ schedule    │ │ summary  │       │   │
//! │  │   │ Customer │ │ builder  │ │ pay / alloc │ │ overdue  │       │   │
//! │  │   └──────────┘ └──────────┘ └─────────────┘ └──────────┘       │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    mercado-db (Database Layer)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, Customer, StoreSettings, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`installment`] - Installment schedules
//! - [`payment`] - Paying installments and free-form payments on credit sales
//! - [`checkout`] - Turns a point-of-sale request into a complete Sale
//! - [`report`] - Sales, stock and receivables aggregation
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use mercado_core::installment::{Frequency, InstallmentPlan};
//! use mercado_core::Money;
//!
//! let start = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
//! let plan = InstallmentPlan::generate(Money::from_cents(10_000), 3, Frequency::Monthly, start)
//!     .unwrap();
//!
//! // 100.00 / 3 → 33.34 + 33.33 + 33.33
//! assert_eq!(plan.installments[0].amount_cents, 3334);
//! // Jan 31 + 1 month clamps to Feb 28
//! assert_eq!(plan.installments[1].due_date, NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod installment;
pub mod money;
pub mod payment;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use installment::{Frequency, Installment, InstallmentPlan, InstallmentStatus};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single sale.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum quantity of a single line in a sale.
///
/// ## Business Reason
/// Catches typing 1000 instead of 10 at the register.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest cost or sale price of a product, in cents (10 million).
///
/// Keeps every line (price × 999) and sale total (× 100 lines) well inside i64.
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000;

/// Largest stock level, positive or negative, a product can hold.
pub const MAX_STOCK: i64 = 1_000_000;

/// Maximum number of installments a credit sale can be split into.
pub const MAX_INSTALLMENTS: u32 = 60;

/// Minimum length for admin passwords.
pub const MIN_PASSWORD_LEN: usize = 8;
