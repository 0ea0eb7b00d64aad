//! # Reports
//!
//! Aggregations over sales, products and customers for the admin dashboard.
//!
//! Everything here is a pure fold over records the caller already loaded;
//! the server fetches the rows and hands them in.
//!
//! ```text
//! sales ──────┬──► summarize        (counts, revenue, profit, receivables)
//!             ├──► top_products     (units sold per product)
//!             ├──► daily_revenue    (zero-filled series)
//!             └──► overdue          (+ customer names)
//! products ───┬──► low_stock
//!             └──► inventory_valuation
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Category, Product, Sale, SaleStatus, SaleType};

/// Longest range the daily series will expand.
pub const MAX_SERIES_DAYS: i64 = 366;

// =============================================================================
// Date Range
// =============================================================================

/// Inclusive calendar range, evaluated in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    #[ts(as = "String")]
    pub from: NaiveDate,
    #[ts(as = "String")]
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> CoreResult<Self> {
        if from > to {
            return Err(ValidationError::InvalidFormat {
                field: "from".to_string(),
                reason: "must not be after 'to'".to_string(),
            }
            .into());
        }
        Ok(DateRange { from, to })
    }

    /// The range covering a single day.
    pub fn day(day: NaiveDate) -> Self {
        DateRange { from: day, to: day }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let day = at.date_naive();
        day >= self.from && day <= self.to
    }

    /// Number of days in the range (at least 1).
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }
}

// =============================================================================
// Sales Summary
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub range: DateRange,
    pub sale_count: i64,
    pub units_sold: i64,
    pub gross_subtotal_cents: i64,
    pub discount_cents: i64,
    /// Σ sale totals.
    pub revenue_cents: i64,
    pub cost_cents: i64,
    pub profit_cents: i64,
    /// profit / revenue in basis points.
    pub margin_bps: i64,
    pub cash_revenue_cents: i64,
    pub credit_revenue_cents: i64,
    pub average_ticket_cents: i64,
    /// Payments received within the range, regardless of sale date.
    pub collected_cents: i64,
    /// Σ remaining balance of every pending sale, regardless of date.
    pub outstanding_cents: i64,
}

/// Money received and still owed, looked up outside the range's sales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Receivables {
    /// Payments received within the range, regardless of sale date.
    pub collected_cents: i64,
    /// Σ remaining balance of every pending sale.
    pub outstanding_cents: i64,
}

/// Summarizes the sales dated inside `range`.
pub fn summarize(sales: &[Sale], range: DateRange, receivables: Receivables) -> SalesSummary {
    let mut count = 0i64;
    let mut units = 0i64;
    let mut subtotal = Money::zero();
    let mut discount = Money::zero();
    let mut revenue = Money::zero();
    let mut cost = Money::zero();
    let mut cash = Money::zero();
    let mut credit = Money::zero();

    for sale in sales.iter().filter(|s| range.contains(s.date)) {
        count += 1;
        units += sale.units();
        subtotal += Money::from_cents(sale.subtotal_cents);
        discount += Money::from_cents(sale.discount_cents);
        revenue += sale.total();
        cost += Money::from_cents(sale.cost_total_cents);
        match sale.sale_type {
            SaleType::Cash => cash += sale.total(),
            SaleType::Credit => credit += sale.total(),
        }
    }

    let profit = revenue - cost;

    SalesSummary {
        range,
        sale_count: count,
        units_sold: units,
        gross_subtotal_cents: subtotal.cents(),
        discount_cents: discount.cents(),
        revenue_cents: revenue.cents(),
        cost_cents: cost.cents(),
        profit_cents: profit.cents(),
        margin_bps: profit.ratio_bps(revenue),
        cash_revenue_cents: cash.cents(),
        credit_revenue_cents: credit.cents(),
        average_ticket_cents: if count > 0 { revenue.cents() / count } else { 0 },
        collected_cents: receivables.collected_cents,
        outstanding_cents: receivables.outstanding_cents,
    }
}

// =============================================================================
// Top Products
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: String,
    /// Name as printed on the most recent sale line.
    pub name: String,
    pub quantity: i64,
    /// Σ line totals before the sale-level discount.
    pub revenue_cents: i64,
}

/// Products ranked by units sold inside `range`.
///
/// Ties break on revenue, then name.
pub fn top_products(sales: &[Sale], range: DateRange, limit: usize) -> Vec<TopProduct> {
    let mut by_product: HashMap<&str, (DateTime<Utc>, TopProduct)> = HashMap::new();

    for sale in sales.iter().filter(|s| range.contains(s.date)) {
        for item in &sale.items {
            let entry = by_product
                .entry(item.product_id.as_str())
                .or_insert_with(|| {
                    (
                        sale.date,
                        TopProduct {
                            product_id: item.product_id.clone(),
                            name: item.name.clone(),
                            quantity: 0,
                            revenue_cents: 0,
                        },
                    )
                });
            if sale.date > entry.0 {
                entry.0 = sale.date;
                entry.1.name = item.name.clone();
            }
            entry.1.quantity += item.quantity;
            entry.1.revenue_cents += item.line_total().cents();
        }
    }

    let mut ranked: Vec<TopProduct> = by_product.into_values().map(|(_, top)| top).collect();
    ranked.sort_by(|a, b| {
        b.quantity
            .cmp(&a.quantity)
            .then(b.revenue_cents.cmp(&a.revenue_cents))
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(limit);
    ranked
}

// =============================================================================
// Low Stock
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LowStockItem {
    pub product_id: String,
    pub name: String,
    pub category: Category,
    pub stock: i64,
}

/// Active products at or below `threshold` units, emptiest first.
pub fn low_stock(products: &[Product], threshold: i64) -> Vec<LowStockItem> {
    let mut items: Vec<LowStockItem> = products
        .iter()
        .filter(|p| p.active && p.stock <= threshold)
        .map(|p| LowStockItem {
            product_id: p.id.clone(),
            name: p.name.clone(),
            category: p.category,
            stock: p.stock,
        })
        .collect();
    items.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
    items
}

// =============================================================================
// Overdue Installments
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OverdueInstallment {
    pub sale_id: String,
    pub customer_id: Option<String>,
    /// `None` when the customer record no longer exists.
    pub customer_name: Option<String>,
    pub number: u32,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    pub days_overdue: i64,
}

/// Pending installments due before `as_of`, oldest first.
///
/// `customer_names` maps customer id to display name.
pub fn overdue(
    sales: &[Sale],
    customer_names: &HashMap<String, String>,
    as_of: NaiveDate,
) -> Vec<OverdueInstallment> {
    let mut rows: Vec<OverdueInstallment> = sales
        .iter()
        .filter(|s| s.status == SaleStatus::Pending)
        .flat_map(|sale| {
            sale.pending_installments()
                .filter(move |i| i.is_overdue(as_of))
                .map(move |i| OverdueInstallment {
                    sale_id: sale.id.clone(),
                    customer_id: sale.customer_id.clone(),
                    customer_name: sale
                        .customer_id
                        .as_ref()
                        .and_then(|id| customer_names.get(id))
                        .cloned(),
                    number: i.number,
                    amount_cents: i.amount_cents,
                    due_date: i.due_date,
                    days_overdue: (as_of - i.due_date).num_days(),
                })
        })
        .collect();

    rows.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then_with(|| a.sale_id.cmp(&b.sale_id))
            .then(a.number.cmp(&b.number))
    });
    rows
}

// =============================================================================
// Inventory Valuation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InventoryValuation {
    pub product_count: i64,
    pub units: i64,
    /// Σ cost price × stock.
    pub cost_value_cents: i64,
    /// Σ sale price × stock.
    pub retail_value_cents: i64,
    pub potential_profit_cents: i64,
}

/// Values stock on hand of active products. Negative stock counts as zero.
pub fn inventory_valuation(products: &[Product]) -> CoreResult<InventoryValuation> {
    let mut count = 0;
    let mut units = 0;
    let mut cost = Money::zero();
    let mut retail = Money::zero();

    for product in products.iter().filter(|p| p.active) {
        let stock = product.stock.max(0);
        count += 1;
        units += stock;
        cost = cost.try_add(product.cost_price().try_mul(stock)?)?;
        retail = retail.try_add(product.sale_price().try_mul(stock)?)?;
    }

    Ok(InventoryValuation {
        product_count: count,
        units,
        cost_value_cents: cost.cents(),
        retail_value_cents: retail.cents(),
        potential_profit_cents: (retail - cost).cents(),
    })
}

// =============================================================================
// Daily Revenue
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DailyRevenue {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub sale_count: i64,
    pub revenue_cents: i64,
    pub profit_cents: i64,
}

/// One point per day in `range`, days without sales included as zero.
pub fn daily_revenue(sales: &[Sale], range: DateRange) -> CoreResult<Vec<DailyRevenue>> {
    if range.days() > MAX_SERIES_DAYS {
        return Err(CoreError::Validation(ValidationError::OutOfRange {
            field: "range days".to_string(),
            min: 1,
            max: MAX_SERIES_DAYS,
        }));
    }

    let mut series: Vec<DailyRevenue> = (0..range.days())
        .map(|offset| DailyRevenue {
            date: range.from + Duration::days(offset),
            sale_count: 0,
            revenue_cents: 0,
            profit_cents: 0,
        })
        .collect();

    for sale in sales.iter().filter(|s| range.contains(s.date)) {
        let idx = (sale.date.date_naive() - range.from).num_days() as usize;
        let point = &mut series[idx];
        point.sale_count += 1;
        point.revenue_cents += sale.total_cents;
        point.profit_cents += sale.profit_cents;
    }

    Ok(series)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installment::{Frequency, InstallmentPlan};
    use crate::types::{NewProduct, Payment, PaymentMethod, SaleItem};
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 15, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sale(id: &str, date: DateTime<Utc>, sale_type: SaleType, lines: &[(&str, i64, i64, i64)]) -> Sale {
        let items: Vec<SaleItem> = lines
            .iter()
            .map(|(pid, qty, price, cost)| SaleItem {
                product_id: pid.to_string(),
                name: pid.to_uppercase(),
                quantity: *qty,
                unit_price_cents: *price,
                unit_cost_cents: *cost,
            })
            .collect();
        let subtotal: i64 = items.iter().map(|i| i.line_total().cents()).sum();
        let cost: i64 = items.iter().map(|i| i.line_cost().cents()).sum();
        let (status, remaining, payments) = match sale_type {
            SaleType::Cash => (
                SaleStatus::Paid,
                0,
                vec![Payment {
                    id: format!("{}-pay", id),
                    sale_id: id.to_string(),
                    amount_cents: subtotal,
                    method: PaymentMethod::Cash,
                    paid_at: date,
                    installment_numbers: vec![],
                    note: None,
                }],
            ),
            SaleType::Credit => (SaleStatus::Pending, subtotal, vec![]),
        };
        Sale {
            id: id.to_string(),
            date,
            subtotal_cents: subtotal,
            discount_cents: 0,
            total_cents: subtotal,
            cost_total_cents: cost,
            profit_cents: subtotal - cost,
            sale_type,
            items,
            customer_id: match sale_type {
                SaleType::Credit => Some("c-1".to_string()),
                SaleType::Cash => None,
            },
            status,
            payments,
            remaining_balance_cents: remaining,
            installment_plan: None,
        }
    }

    fn fixtures() -> Vec<Sale> {
        vec![
            sale("a", at(2026, 3, 1), SaleType::Cash, &[("shirt", 2, 2_500, 1_000)]),
            sale("b", at(2026, 3, 2), SaleType::Credit, &[("cap", 3, 1_000, 400), ("shirt", 1, 2_500, 1_000)]),
            sale("c", at(2026, 4, 10), SaleType::Cash, &[("cap", 1, 1_000, 400)]),
        ]
    }

    #[test]
    fn test_summarize_march() {
        let range = DateRange::new(day(2026, 3, 1), day(2026, 3, 31)).unwrap();
        let receivables = Receivables {
            collected_cents: 5_000,
            outstanding_cents: 5_500,
        };
        let summary = summarize(&fixtures(), range, receivables);

        assert_eq!(summary.sale_count, 2);
        assert_eq!(summary.units_sold, 6);
        assert_eq!(summary.revenue_cents, 10_500);
        assert_eq!(summary.cost_cents, 4_200);
        assert_eq!(summary.profit_cents, 6_300);
        assert_eq!(summary.margin_bps, 6_000);
        assert_eq!(summary.cash_revenue_cents, 5_000);
        assert_eq!(summary.credit_revenue_cents, 5_500);
        assert_eq!(summary.collected_cents, 5_000);
        assert_eq!(summary.outstanding_cents, 5_500);
        assert_eq!(summary.average_ticket_cents, 5_250);
    }

    #[test]
    fn test_top_products() {
        let range = DateRange::new(day(2026, 1, 1), day(2026, 12, 31)).unwrap();
        let top = top_products(&fixtures(), range, 10);
        assert_eq!(top[0].product_id, "cap");
        assert_eq!(top[0].quantity, 4);
        assert_eq!(top[1].product_id, "shirt");
        assert_eq!(top[1].revenue_cents, 7_500);

        assert_eq!(top_products(&fixtures(), range, 1).len(), 1);
    }

    #[test]
    fn test_daily_revenue_is_zero_filled() {
        let range = DateRange::new(day(2026, 3, 1), day(2026, 3, 3)).unwrap();
        let series = daily_revenue(&fixtures(), range).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].revenue_cents, 5_000);
        assert_eq!(series[1].sale_count, 1);
        assert_eq!(series[2].sale_count, 0);

        let huge = DateRange::new(day(2020, 1, 1), day(2026, 1, 1)).unwrap();
        assert!(daily_revenue(&fixtures(), huge).is_err());
    }

    #[test]
    fn test_overdue_with_customer_names() {
        let mut credit = sale("d", at(2026, 1, 5), SaleType::Credit, &[("cap", 3, 1_000, 400)]);
        credit.installment_plan = Some(
            InstallmentPlan::generate(Money::from_cents(3_000), 3, Frequency::Monthly, day(2026, 2, 1))
                .unwrap(),
        );
        let names: HashMap<String, String> =
            [("c-1".to_string(), "Lucía".to_string())].into_iter().collect();

        let rows = overdue(&[credit], &names, day(2026, 3, 10));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].number, 1);
        assert_eq!(rows[0].customer_name.as_deref(), Some("Lucía"));
        assert_eq!(rows[1].days_overdue, 9);
    }

    #[test]
    fn test_low_stock_and_valuation() {
        let now = Utc::now();
        let mk = |id: &str, stock: i64, active: bool| {
            let mut p = Product::new(
                id.to_string(),
                NewProduct {
                    name: id.to_string(),
                    cost_price_cents: 100,
                    sale_price_cents: 250,
                    stock,
                    ..Default::default()
                },
                now,
            );
            p.active = active;
            p
        };
        let products = vec![mk("a", 0, true), mk("b", 3, true), mk("c", 20, true), mk("d", 1, false), mk("e", -2, true)];

        let low = low_stock(&products, 3);
        let ids: Vec<&str> = low.iter().map(|l| l.product_id.as_str()).collect();
        assert_eq!(ids, vec!["e", "a", "b"]);

        let value = inventory_valuation(&products).unwrap();
        assert_eq!(value.product_count, 4);
        assert_eq!(value.units, 23);
        assert_eq!(value.cost_value_cents, 2_300);
        assert_eq!(value.retail_value_cents, 5_750);
        assert_eq!(value.potential_profit_cents, 3_450);
    }

    #[test]
    fn test_valuation_overflow_is_an_error() {
        let product = Product::new(
            "bulk".to_string(),
            NewProduct {
                name: "bulk".to_string(),
                cost_price_cents: 1,
                sale_price_cents: i64::MAX / 2,
                stock: 3,
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(matches!(
            inventory_valuation(&[product]),
            Err(CoreError::AmountOverflow(_))
        ));
    }

    #[test]
    fn test_range_rejects_reversed_dates() {
        assert!(DateRange::new(day(2026, 3, 2), day(2026, 3, 1)).is_err());
        assert_eq!(DateRange::day(day(2026, 3, 1)).days(), 1);
    }
}
