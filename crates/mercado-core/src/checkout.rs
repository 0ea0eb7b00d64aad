//! # Checkout
//!
//! Turns a point-of-sale request into a complete [`Sale`].
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CheckoutRequest                                                        │
//! │   items [{productId, quantity}], discount, type, customerId?,          │
//! │   downPayment?, installmentPlan?                                        │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  1. merge duplicate lines, validate counts and quantities              │
//! │  2. snapshot name / sale price / cost price of each ACTIVE product     │
//! │  3. check stock (unless negative stock is allowed)                     │
//! │  4. subtotal, discount, total, cost_total, profit                      │
//! │  5. Cash   → one payment for the total, status Paid                     │
//! │     Credit → optional down payment, remaining owed, status Pending     │
//! │              optional schedule over the remaining amount               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  Sale (ready to persist; stock and customer balance are written by     │
//! │        the database layer in the same transaction)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::installment::{Frequency, InstallmentPlan};
use crate::money::Money;
use crate::types::{Payment, PaymentMethod, Product, Sale, SaleItem, SaleStatus, SaleType};
use crate::validation::{validate_installment_count, validate_quantity, validate_sale_lines};
use crate::MAX_SALE_LINES;

// =============================================================================
// Request Types
// =============================================================================

/// One requested line at the register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// How to split the remaining amount of a credit sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub number_of_installments: u32,
    pub frequency: Frequency,
    /// Due date of the first installment. Defaults to one period after the
    /// sale date.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub start_date: Option<NaiveDate>,
}

/// Everything the register sends to record a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<LineRequest>,
    #[serde(default)]
    pub discount_cents: i64,
    #[serde(rename = "type")]
    pub sale_type: SaleType,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub down_payment_cents: Option<i64>,
    #[serde(default)]
    pub installment_plan: Option<PlanRequest>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

impl CheckoutRequest {
    /// Lines with duplicate products folded together, in first-seen order.
    pub fn merged_lines(&self) -> Vec<LineRequest> {
        let mut merged: Vec<LineRequest> = Vec::with_capacity(self.items.len());
        let mut index: HashMap<&str, usize> = HashMap::new();

        for line in &self.items {
            match index.get(line.product_id.as_str()) {
                Some(&pos) => merged[pos].quantity += line.quantity,
                None => {
                    index.insert(line.product_id.as_str(), merged.len());
                    merged.push(line.clone());
                }
            }
        }
        merged
    }
}

// =============================================================================
// Context
// =============================================================================

/// What checkout needs to know about the current state of the store.
pub struct CheckoutContext<'a> {
    /// Products referenced by the request, keyed by id. Missing ids are
    /// treated as unknown products.
    pub products: &'a HashMap<String, Product>,
    /// Whether the request's `customer_id` (if any) names an existing
    /// customer.
    pub customer_exists: bool,
    pub allow_negative_stock: bool,
    pub now: DateTime<Utc>,
}

// =============================================================================
// Build Sale
// =============================================================================

/// Validates `request` and computes the resulting sale.
///
/// `next_id` supplies ids for the sale and its payments.
///
/// ## Errors
/// - `Validation` for bad counts or quantities
/// - `ProductNotFound` for unknown or inactive products
/// - `InsufficientStock` when stock would go negative and that is not allowed
/// - `InvalidDiscount`, `InvalidPaymentAmount`, `InvalidInstallmentPlan`
/// - `CustomerRequired` / `CustomerNotFound`
pub fn build_sale(
    request: &CheckoutRequest,
    ctx: &CheckoutContext<'_>,
    mut next_id: impl FnMut() -> String,
) -> CoreResult<Sale> {
    for line in &request.items {
        validate_quantity(line.quantity)?;
    }
    let lines = request.merged_lines();
    if lines.len() > MAX_SALE_LINES {
        return Err(CoreError::TooManyLines {
            max: MAX_SALE_LINES,
        });
    }
    validate_sale_lines(lines.len())?;

    // Snapshot products
    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        validate_quantity(line.quantity)?;

        let product = ctx
            .products
            .get(&line.product_id)
            .filter(|p| p.active)
            .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

        if !product.can_sell(line.quantity, ctx.allow_negative_stock) {
            return Err(CoreError::InsufficientStock {
                product: product.name.clone(),
                available: product.stock,
                requested: line.quantity,
            });
        }

        items.push(SaleItem {
            product_id: product.id.clone(),
            name: product.name.clone(),
            quantity: line.quantity,
            unit_price_cents: product.sale_price_cents,
            unit_cost_cents: product.cost_price_cents,
        });
    }

    // Totals
    let mut subtotal = Money::zero();
    let mut cost_total = Money::zero();
    for item in &items {
        subtotal =
            subtotal.try_add(Money::from_cents(item.unit_price_cents).try_mul(item.quantity)?)?;
        cost_total =
            cost_total.try_add(Money::from_cents(item.unit_cost_cents).try_mul(item.quantity)?)?;
    }
    let discount = Money::from_cents(request.discount_cents);

    if discount.is_negative() {
        return Err(CoreError::InvalidDiscount {
            reason: "discount cannot be negative".to_string(),
        });
    }
    if discount > subtotal {
        return Err(CoreError::InvalidDiscount {
            reason: format!("discount {} exceeds subtotal {}", discount, subtotal),
        });
    }
    let total = subtotal - discount;

    // Customer
    let customer_id = request
        .customer_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    if let Some(id) = &customer_id {
        if !ctx.customer_exists {
            return Err(CoreError::CustomerNotFound(id.clone()));
        }
    }

    let sale_id = next_id();
    let mut sale = Sale {
        id: sale_id.clone(),
        date: ctx.now,
        subtotal_cents: subtotal.cents(),
        discount_cents: discount.cents(),
        total_cents: total.cents(),
        cost_total_cents: cost_total.cents(),
        profit_cents: (total - cost_total).cents(),
        sale_type: request.sale_type,
        items,
        customer_id,
        status: SaleStatus::Paid,
        payments: Vec::new(),
        remaining_balance_cents: 0,
        installment_plan: None,
    };

    match request.sale_type {
        SaleType::Cash => {
            if request.installment_plan.is_some() {
                return Err(CoreError::InvalidInstallmentPlan {
                    reason: "cash sales cannot have an installment plan".to_string(),
                });
            }
            if total.is_positive() {
                sale.payments.push(Payment {
                    id: next_id(),
                    sale_id,
                    amount_cents: total.cents(),
                    method: request.payment_method,
                    paid_at: ctx.now,
                    installment_numbers: Vec::new(),
                    note: None,
                });
            }
        }
        SaleType::Credit => {
            if sale.customer_id.is_none() {
                return Err(CoreError::CustomerRequired);
            }

            if !total.is_positive() {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: "credit sale total must be positive".to_string(),
                });
            }

            let down = Money::from_cents(request.down_payment_cents.unwrap_or(0));
            if down.is_negative() {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: "down payment cannot be negative".to_string(),
                });
            }
            if down >= total {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: format!(
                        "down payment {} must be less than the total {}",
                        down, total
                    ),
                });
            }

            let remaining = total - down;
            if down.is_positive() {
                sale.payments.push(Payment {
                    id: next_id(),
                    sale_id,
                    amount_cents: down.cents(),
                    method: request.payment_method,
                    paid_at: ctx.now,
                    installment_numbers: Vec::new(),
                    note: Some("Down payment".to_string()),
                });
            }

            if let Some(plan) = &request.installment_plan {
                validate_installment_count(plan.number_of_installments)?;
                let start = match plan.start_date {
                    Some(date) => date,
                    None => plan
                        .frequency
                        .advance(ctx.now.date_naive(), 1)
                        .ok_or_else(|| CoreError::InvalidInstallmentPlan {
                            reason: "start date out of range".to_string(),
                        })?,
                };
                sale.installment_plan = Some(InstallmentPlan::generate(
                    remaining,
                    plan.number_of_installments,
                    plan.frequency,
                    start,
                )?);
            }

            sale.status = SaleStatus::Pending;
            sale.remaining_balance_cents = remaining.cents();
        }
    }

    Ok(sale)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, NewProduct};

    fn product(id: &str, cost: i64, price: i64, stock: i64) -> Product {
        Product::new(
            id.to_string(),
            NewProduct {
                name: format!("Product {}", id),
                category: Category::Clothing,
                cost_price_cents: cost,
                sale_price_cents: price,
                stock,
                ..Default::default()
            },
            Utc::now(),
        )
    }

    fn catalog() -> HashMap<String, Product> {
        let mut inactive = product("gone", 100, 200, 5);
        inactive.active = false;
        [
            product("shirt", 1_000, 2_500, 10),
            product("cap", 400, 1_000, 1),
            inactive,
        ]
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect()
    }

    fn ids() -> impl FnMut() -> String {
        let mut n = 0;
        move || {
            n += 1;
            format!("id-{}", n)
        }
    }

    fn request(sale_type: SaleType, items: &[(&str, i64)]) -> CheckoutRequest {
        CheckoutRequest {
            items: items
                .iter()
                .map(|(id, qty)| LineRequest {
                    product_id: id.to_string(),
                    quantity: *qty,
                })
                .collect(),
            discount_cents: 0,
            sale_type,
            customer_id: None,
            down_payment_cents: None,
            installment_plan: None,
            payment_method: PaymentMethod::Cash,
        }
    }

    fn ctx(products: &HashMap<String, Product>) -> CheckoutContext<'_> {
        CheckoutContext {
            products,
            customer_exists: true,
            allow_negative_stock: false,
            now: Utc::now(),
        }
    }

    #[test]
    fn test_cash_sale_totals() {
        let products = catalog();
        let mut req = request(SaleType::Cash, &[("shirt", 2), ("cap", 1)]);
        req.discount_cents = 500;

        let sale = build_sale(&req, &ctx(&products), ids()).unwrap();

        assert_eq!(sale.subtotal_cents, 6_000);
        assert_eq!(sale.total_cents, 5_500);
        assert_eq!(sale.cost_total_cents, 2_400);
        assert_eq!(sale.profit_cents, 3_100);
        assert_eq!(sale.status, SaleStatus::Paid);
        assert_eq!(sale.remaining_balance_cents, 0);
        assert_eq!(sale.payments.len(), 1);
        assert_eq!(sale.payments[0].amount_cents, 5_500);
        assert_eq!(sale.payments[0].sale_id, sale.id);
    }

    #[test]
    fn test_duplicate_lines_are_merged() {
        let products = catalog();
        let req = request(SaleType::Cash, &[("shirt", 1), ("shirt", 2)]);
        let sale = build_sale(&req, &ctx(&products), ids()).unwrap();
        assert_eq!(sale.items.len(), 1);
        assert_eq!(sale.items[0].quantity, 3);
    }

    #[test]
    fn test_insufficient_stock() {
        let products = catalog();
        let req = request(SaleType::Cash, &[("cap", 2)]);
        let err = build_sale(&req, &ctx(&products), ids()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { available: 1, requested: 2, .. }
        ));

        let mut lenient = ctx(&products);
        lenient.allow_negative_stock = true;
        assert!(build_sale(&req, &lenient, ids()).is_ok());
    }

    #[test]
    fn test_inactive_and_unknown_products_rejected() {
        let products = catalog();
        for id in ["gone", "missing"] {
            let req = request(SaleType::Cash, &[(id, 1)]);
            let err = build_sale(&req, &ctx(&products), ids()).unwrap_err();
            assert!(matches!(err, CoreError::ProductNotFound(_)));
        }
    }

    #[test]
    fn test_discount_bounds() {
        let products = catalog();
        let mut req = request(SaleType::Cash, &[("cap", 1)]);
        req.discount_cents = 1_001;
        assert!(matches!(
            build_sale(&req, &ctx(&products), ids()).unwrap_err(),
            CoreError::InvalidDiscount { .. }
        ));

        req.discount_cents = -1;
        assert!(build_sale(&req, &ctx(&products), ids()).is_err());
    }

    #[test]
    fn test_credit_sale_requires_customer() {
        let products = catalog();
        let req = request(SaleType::Credit, &[("shirt", 1)]);
        assert!(matches!(
            build_sale(&req, &ctx(&products), ids()).unwrap_err(),
            CoreError::CustomerRequired
        ));

        let mut req = req;
        req.customer_id = Some("c-404".to_string());
        let mut missing = ctx(&products);
        missing.customer_exists = false;
        assert!(matches!(
            build_sale(&req, &missing, ids()).unwrap_err(),
            CoreError::CustomerNotFound(_)
        ));
    }

    #[test]
    fn test_credit_sale_with_down_payment_and_plan() {
        let products = catalog();
        let mut req = request(SaleType::Credit, &[("shirt", 4)]);
        req.customer_id = Some("c-1".to_string());
        req.down_payment_cents = Some(1_000);
        req.installment_plan = Some(PlanRequest {
            number_of_installments: 3,
            frequency: Frequency::Weekly,
            start_date: NaiveDate::from_ymd_opt(2026, 7, 1),
        });

        let sale = build_sale(&req, &ctx(&products), ids()).unwrap();

        assert_eq!(sale.total_cents, 10_000);
        assert_eq!(sale.remaining_balance_cents, 9_000);
        assert_eq!(sale.status, SaleStatus::Pending);
        assert_eq!(sale.payments.len(), 1);
        assert_eq!(sale.payments[0].amount_cents, 1_000);

        let plan = sale.installment_plan.as_ref().unwrap();
        assert_eq!(plan.pending_total().cents(), 9_000);
        assert_eq!(plan.installments[0].due_date, NaiveDate::from_ymd_opt(2026, 7, 1).unwrap());
    }

    #[test]
    fn test_down_payment_must_leave_balance() {
        let products = catalog();
        let mut req = request(SaleType::Credit, &[("cap", 1)]);
        req.customer_id = Some("c-1".to_string());
        req.down_payment_cents = Some(1_000);
        assert!(matches!(
            build_sale(&req, &ctx(&products), ids()).unwrap_err(),
            CoreError::InvalidPaymentAmount { .. }
        ));
    }

    #[test]
    fn test_fully_discounted_credit_sale_rejected() {
        let products = catalog();
        let mut req = request(SaleType::Credit, &[("cap", 1)]);
        req.customer_id = Some("c-1".to_string());
        req.discount_cents = 1_000;

        match build_sale(&req, &ctx(&products), ids()).unwrap_err() {
            CoreError::InvalidPaymentAmount { reason } => {
                assert_eq!(reason, "credit sale total must be positive");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // The same discount on a cash sale is a free giveaway
        req.sale_type = SaleType::Cash;
        req.customer_id = None;
        let sale = build_sale(&req, &ctx(&products), ids()).unwrap();
        assert_eq!(sale.total_cents, 0);
        assert!(sale.payments.is_empty());
    }

    #[test]
    fn test_line_total_overflow_is_an_error() {
        let mut products = catalog();
        for id in ["pricey", "pricier"] {
            let p = product(id, 0, i64::MAX / 2 + 1, 10);
            products.insert(p.id.clone(), p);
        }

        let req = request(SaleType::Cash, &[("pricey", 2)]);
        assert!(matches!(
            build_sale(&req, &ctx(&products), ids()).unwrap_err(),
            CoreError::AmountOverflow(_)
        ));

        // Each line fits, their sum does not
        let req = request(SaleType::Cash, &[("pricey", 1), ("pricier", 1)]);
        assert!(matches!(
            build_sale(&req, &ctx(&products), ids()).unwrap_err(),
            CoreError::AmountOverflow(_)
        ));
    }

    #[test]
    fn test_cash_sale_rejects_plan() {
        let products = catalog();
        let mut req = request(SaleType::Cash, &[("cap", 1)]);
        req.installment_plan = Some(PlanRequest {
            number_of_installments: 2,
            frequency: Frequency::Monthly,
            start_date: None,
        });
        assert!(matches!(
            build_sale(&req, &ctx(&products), ids()).unwrap_err(),
            CoreError::InvalidInstallmentPlan { .. }
        ));
    }

    #[test]
    fn test_line_limits() {
        let products = catalog();
        let empty = request(SaleType::Cash, &[]);
        assert!(matches!(
            build_sale(&empty, &ctx(&products), ids()).unwrap_err(),
            CoreError::Validation(_)
        ));

        let too_many = request(SaleType::Cash, &[("shirt", 1000)]);
        assert!(build_sale(&too_many, &ctx(&products), ids()).is_err());

        let mut wide = request(SaleType::Cash, &[]);
        wide.items = (0..101)
            .map(|i| LineRequest {
                product_id: format!("p{}", i),
                quantity: 1,
            })
            .collect();
        assert!(matches!(
            build_sale(&wide, &ctx(&products), ids()).unwrap_err(),
            CoreError::TooManyLines { max: 100 }
        ));
    }
}
