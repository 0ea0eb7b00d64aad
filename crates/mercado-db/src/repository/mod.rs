//! # Repository Module
//!
//! Database repository implementations for Mercado.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP handler                                                          │
//! │       │  db.sales().checkout(&request, allow_negative_stock)           │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── BEGIN                                                             │
//! │  ├── load products + customer                                          │
//! │  ├── mercado_core::checkout::build_sale  (pure)                        │
//! │  ├── INSERT sale, items, payments, installments                        │
//! │  ├── UPDATE stock, customer balance                                    │
//! │  └── COMMIT                                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Inventory and storefront queries
//! - [`sale::SaleRepository`] - Checkout, payments, deletion, listing
//! - [`customer::CustomerRepository`] - Customers and their derived history
//! - [`settings::SettingsRepository`] - Store links and admin credentials

pub mod customer;
pub mod product;
pub mod sale;
pub mod settings;

/// Bind-parameter batch size for `IN (...)` lookups.
pub(crate) const IN_CHUNK: usize = 500;
