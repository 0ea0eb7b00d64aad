//! # Validation Module
//!
//! Input validation utilities for Mercado.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI forms                                                     │
//! │  └── Immediate feedback (empty fields, obvious typos)                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: HTTP handler (Rust)                                          │
//! │  ├── Type validation (JSON deserialization)                            │
//! │  └── THIS MODULE: field rules before anything is written               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── UNIQUE barcode and username                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use mercado_core::validation::{validate_barcode, validate_quantity};
//!
//! validate_barcode("7791234567890").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::{NewCustomer, NewProduct, ProductPatch, StoreLinks};
use crate::{
    MAX_INSTALLMENTS, MAX_ITEM_QUANTITY, MAX_PRICE_CENTS, MAX_SALE_LINES, MAX_STOCK,
    MIN_PASSWORD_LEN,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Upper bound on images attached to one product.
pub const MAX_PRODUCT_IMAGES: usize = 10;

// =============================================================================
// String Validators
// =============================================================================

fn required_within(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use mercado_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Linen Shirt").is_ok());
/// assert!(validate_product_name("  ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    required_within("name", name, 200)
}

/// Validates a barcode.
///
/// ## Rules
/// - 4 to 64 characters
/// - Letters, digits and hyphens only (covers EAN/UPC and Code 128 labels)
pub fn validate_barcode(barcode: &str) -> ValidationResult<()> {
    let barcode = barcode.trim();

    if barcode.len() < 4 {
        return Err(ValidationError::TooShort {
            field: "barcode".to_string(),
            min: 4,
        });
    }
    if barcode.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "barcode".to_string(),
            max: 64,
        });
    }
    if !barcode.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must contain only letters, digits and hyphens".to_string(),
        });
    }

    Ok(())
}

/// Validates a search query.
///
/// Empty is allowed (no filter). Returns the trimmed query.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    required_within("name", name, 120)
}

/// Validates an admin username.
///
/// ## Rules
/// - 3 to 32 characters
/// - Letters, digits, `.`, `_` and `-`
pub fn validate_username(username: &str) -> ValidationResult<()> {
    let username = username.trim();

    if username.len() < 3 {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: 3,
        });
    }
    if username.len() > 32 {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: 32,
        });
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must contain only letters, digits, dots, underscores and hyphens"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates a new admin password.
///
/// ## Example
/// ```rust
/// use mercado_core::validation::validate_password;
///
/// assert!(validate_password("correct horse").is_ok());
/// assert!(validate_password("short").is_err());
/// ```
pub fn validate_password(password: &str) -> ValidationResult<()> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        });
    }
    if len > 128 {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: 128,
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (giveaways).
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a stock level or stock delta. Whether negative stock is
/// acceptable is a configuration question answered by the caller.
pub fn validate_stock(field: &str, units: i64) -> ValidationResult<()> {
    if !(-MAX_STOCK..=MAX_STOCK).contains(&units) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: -MAX_STOCK,
            max: MAX_STOCK,
        });
    }

    Ok(())
}

/// Validates a payment amount in cents.
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

pub fn validate_installment_count(count: u32) -> ValidationResult<()> {
    if count == 0 || count > MAX_INSTALLMENTS {
        return Err(ValidationError::OutOfRange {
            field: "numberOfInstallments".to_string(),
            min: 1,
            max: MAX_INSTALLMENTS as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of distinct lines in a sale.
pub fn validate_sale_lines(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::required("items"));
    }
    if lines > MAX_SALE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_SALE_LINES as i64,
        });
    }
    Ok(())
}

pub fn validate_images(images: &[String]) -> ValidationResult<()> {
    if images.len() > MAX_PRODUCT_IMAGES {
        return Err(ValidationError::OutOfRange {
            field: "images".to_string(),
            min: 0,
            max: MAX_PRODUCT_IMAGES as i64,
        });
    }
    if images.iter().any(|i| i.trim().is_empty()) {
        return Err(ValidationError::InvalidFormat {
            field: "images".to_string(),
            reason: "image entries cannot be empty".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

pub fn validate_new_product(input: &NewProduct) -> ValidationResult<()> {
    validate_product_name(&input.name)?;
    validate_price_cents("costPriceCents", input.cost_price_cents)?;
    validate_price_cents("salePriceCents", input.sale_price_cents)?;
    validate_stock("stock", input.stock)?;
    if let Some(barcode) = input.barcode.as_deref().filter(|b| !b.trim().is_empty()) {
        validate_barcode(barcode)?;
    }
    validate_images(&input.images)
}

pub fn validate_product_patch(patch: &ProductPatch) -> ValidationResult<()> {
    if let Some(name) = &patch.name {
        validate_product_name(name)?;
    }
    if let Some(cost) = patch.cost_price_cents {
        validate_price_cents("costPriceCents", cost)?;
    }
    if let Some(price) = patch.sale_price_cents {
        validate_price_cents("salePriceCents", price)?;
    }
    if let Some(stock) = patch.stock {
        validate_stock("stock", stock)?;
    }
    if let Some(barcode) = patch.barcode.as_deref().filter(|b| !b.trim().is_empty()) {
        validate_barcode(barcode)?;
    }
    if let Some(images) = &patch.images {
        validate_images(images)?;
    }
    Ok(())
}

pub fn validate_new_customer(input: &NewCustomer) -> ValidationResult<()> {
    validate_customer_name(&input.name)?;
    if let Some(contact) = &input.contact {
        if contact.chars().count() > 200 {
            return Err(ValidationError::TooLong {
                field: "contact".to_string(),
                max: 200,
            });
        }
    }
    Ok(())
}

/// Validates store links. Only the store name is mandatory.
pub fn validate_store_links(links: &StoreLinks) -> ValidationResult<()> {
    required_within("storeName", &links.store_name, 100)?;

    if let Some(email) = links.email.as_deref().filter(|e| !e.trim().is_empty()) {
        let email = email.trim();
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(ValidationError::InvalidFormat {
                field: "email".to_string(),
                reason: "must be an e-mail address".to_string(),
            });
        }
    }

    let others = [
        ("phone", &links.phone),
        ("whatsapp", &links.whatsapp),
        ("address", &links.address),
        ("instagram", &links.instagram),
        ("facebook", &links.facebook),
        ("tiktok", &links.tiktok),
    ];
    for (field, value) in others {
        if value.as_deref().map_or(0, |v| v.chars().count()) > 300 {
            return Err(ValidationError::TooLong {
                field: field.to_string(),
                max: 300,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
