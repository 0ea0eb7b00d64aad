//! # Sale Repository
//!
//! Database operations for sales and their child rows.
//!
//! ## Storage Layout
//! ```text
//! sales ─┬─< sale_items    (line_no order, snapshot of name/price/cost)
//!        ├─< payments      (installment_numbers as JSON)
//!        └─< installments  (number order; plan header lives on `sales`)
//! ```
//!
//! ## Transactions
//! Every mutation runs in one transaction:
//! ```text
//! checkout          INSERT sale + children, stock -= qty, balance += owed
//! pay_installments  mark rows paid, INSERT payment, balance -= amount
//! add_payment       INSERT payment, balance -= amount
//! delete            stock += qty, balance -= owed, DELETE sale + children
//! ```
//! Business rules come from `mercado_core`; a rejected rule drops the
//! transaction, so nothing is written.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::generate_id;
use crate::repository::product::fetch_many;
use crate::repository::IN_CHUNK;
use mercado_core::checkout::{build_sale, CheckoutContext, CheckoutRequest};
use mercado_core::report::Receivables;
use mercado_core::{
    CoreError, Frequency, Installment, InstallmentPlan, InstallmentStatus, Money, Payment,
    PaymentMethod, Sale, SaleItem, SaleStatus, SaleType,
};

const SALE_COLUMNS: &str = "id, date, subtotal_cents, discount_cents, total_cents, \
     cost_total_cents, profit_cents, sale_type, customer_id, status, \
     remaining_balance_cents, plan_installments, plan_frequency";

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    date: DateTime<Utc>,
    subtotal_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    cost_total_cents: i64,
    profit_cents: i64,
    sale_type: SaleType,
    customer_id: Option<String>,
    status: SaleStatus,
    remaining_balance_cents: i64,
    plan_installments: Option<i64>,
    plan_frequency: Option<Frequency>,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    sale_id: String,
    product_id: String,
    name: String,
    quantity: i64,
    unit_price_cents: i64,
    unit_cost_cents: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: String,
    sale_id: String,
    amount_cents: i64,
    method: PaymentMethod,
    paid_at: DateTime<Utc>,
    installment_numbers: String,
    note: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct InstallmentRow {
    sale_id: String,
    number: i64,
    amount_cents: i64,
    due_date: NaiveDate,
    status: InstallmentStatus,
    paid_at: Option<DateTime<Utc>>,
}

fn to_u32(column: &str, value: i64) -> DbResult<u32> {
    u32::try_from(value).map_err(|_| DbError::CorruptColumn {
        column: column.to_string(),
        reason: format!("{} is out of range", value),
    })
}

impl PaymentRow {
    fn into_payment(self) -> DbResult<Payment> {
        let installment_numbers: Vec<u32> = serde_json::from_str(&self.installment_numbers)
            .map_err(|e| DbError::corrupt("payments.installment_numbers", e))?;

        Ok(Payment {
            id: self.id,
            sale_id: self.sale_id,
            amount_cents: self.amount_cents,
            method: self.method,
            paid_at: self.paid_at,
            installment_numbers,
            note: self.note,
        })
    }
}

#[derive(Default)]
struct Children {
    items: Vec<SaleItem>,
    payments: Vec<Payment>,
    installments: Vec<Installment>,
}

/// Builds the `IN (?, ?, ...)` query for one chunk of sale ids.
fn child_query<'a>(columns: &str, table: &str, order: &str, ids: &'a [String]) -> QueryBuilder<'a, Sqlite> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM {} WHERE sale_id IN (", columns, table));
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(format!(") ORDER BY {}", order));
    qb
}

/// Loads items, payments and installments for `rows` and assembles sales,
/// keeping the order of `rows`.
async fn hydrate(conn: &mut SqliteConnection, rows: Vec<SaleRow>) -> DbResult<Vec<Sale>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut children: HashMap<String, Children> = HashMap::with_capacity(ids.len());

    for chunk in ids.chunks(IN_CHUNK) {
        let items = child_query(
            "sale_id, product_id, name, quantity, unit_price_cents, unit_cost_cents",
            "sale_items",
            "sale_id, line_no",
            chunk,
        )
        .build_query_as::<ItemRow>()
        .fetch_all(&mut *conn)
        .await?;
        for row in items {
            children.entry(row.sale_id.clone()).or_default().items.push(SaleItem {
                product_id: row.product_id,
                name: row.name,
                quantity: row.quantity,
                unit_price_cents: row.unit_price_cents,
                unit_cost_cents: row.unit_cost_cents,
            });
        }

        let payments = child_query(
            "id, sale_id, amount_cents, method, paid_at, installment_numbers, note",
            "payments",
            "sale_id, paid_at, id",
            chunk,
        )
        .build_query_as::<PaymentRow>()
        .fetch_all(&mut *conn)
        .await?;
        for row in payments {
            let sale_id = row.sale_id.clone();
            children.entry(sale_id).or_default().payments.push(row.into_payment()?);
        }

        let installments = child_query(
            "sale_id, number, amount_cents, due_date, status, paid_at",
            "installments",
            "sale_id, number",
            chunk,
        )
        .build_query_as::<InstallmentRow>()
        .fetch_all(&mut *conn)
        .await?;
        for row in installments {
            children
                .entry(row.sale_id.clone())
                .or_default()
                .installments
                .push(Installment {
                    number: to_u32("installments.number", row.number)?,
                    amount_cents: row.amount_cents,
                    due_date: row.due_date,
                    status: row.status,
                    paid_at: row.paid_at,
                });
        }
    }

    rows.into_iter()
        .map(|row| -> DbResult<Sale> {
            let kids = children.remove(&row.id).unwrap_or_default();
            let installment_plan = match (row.plan_installments, row.plan_frequency) {
                (Some(count), Some(frequency)) => Some(InstallmentPlan {
                    number_of_installments: to_u32("sales.plan_installments", count)?,
                    frequency,
                    installments: kids.installments,
                }),
                _ => None,
            };

            Ok(Sale {
                id: row.id,
                date: row.date,
                subtotal_cents: row.subtotal_cents,
                discount_cents: row.discount_cents,
                total_cents: row.total_cents,
                cost_total_cents: row.cost_total_cents,
                profit_cents: row.profit_cents,
                sale_type: row.sale_type,
                items: kids.items,
                customer_id: row.customer_id,
                status: row.status,
                payments: kids.payments,
                remaining_balance_cents: row.remaining_balance_cents,
                installment_plan,
            })
        })
        .collect()
}

async fn load_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let row = sqlx::query_as::<_, SaleRow>(&format!(
        "SELECT {} FROM sales WHERE id = ?1",
        SALE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(hydrate(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

async fn require_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Sale> {
    load_sale(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", id))
}

// =============================================================================
// Writers (run inside a transaction)
// =============================================================================

async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    let numbers = serde_json::to_string(&payment.installment_numbers)
        .map_err(|e| DbError::corrupt("payments.installment_numbers", e))?;

    sqlx::query(
        r#"
        INSERT INTO payments (id, sale_id, amount_cents, method, paid_at, installment_numbers, note)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.sale_id)
    .bind(payment.amount_cents)
    .bind(payment.method)
    .bind(payment.paid_at)
    .bind(numbers)
    .bind(&payment.note)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    let (plan_installments, plan_frequency) = match &sale.installment_plan {
        Some(plan) => (Some(plan.number_of_installments as i64), Some(plan.frequency)),
        None => (None, None),
    };

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, date, subtotal_cents, discount_cents, total_cents,
            cost_total_cents, profit_cents, sale_type, customer_id, status,
            remaining_balance_cents, plan_installments, plan_frequency
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&sale.id)
    .bind(sale.date)
    .bind(sale.subtotal_cents)
    .bind(sale.discount_cents)
    .bind(sale.total_cents)
    .bind(sale.cost_total_cents)
    .bind(sale.profit_cents)
    .bind(sale.sale_type)
    .bind(&sale.customer_id)
    .bind(sale.status)
    .bind(sale.remaining_balance_cents)
    .bind(plan_installments)
    .bind(plan_frequency)
    .execute(&mut *conn)
    .await?;

    for (line_no, item) in sale.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                sale_id, line_no, product_id, name, quantity, unit_price_cents, unit_cost_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&sale.id)
        .bind(line_no as i64)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.unit_cost_cents)
        .execute(&mut *conn)
        .await?;
    }

    for payment in &sale.payments {
        insert_payment(conn, payment).await?;
    }

    if let Some(plan) = &sale.installment_plan {
        for row in &plan.installments {
            sqlx::query(
                r#"
                INSERT INTO installments (sale_id, number, amount_cents, due_date, status, paid_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&sale.id)
            .bind(row.number as i64)
            .bind(row.amount_cents)
            .bind(row.due_date)
            .bind(row.status)
            .bind(row.paid_at)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

async fn update_sale_state(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query("UPDATE sales SET status = ?2, remaining_balance_cents = ?3 WHERE id = ?1")
        .bind(&sale.id)
        .bind(sale.status)
        .bind(sale.remaining_balance_cents)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Adds `delta` to a customer's balance. A sale may outlive its customer,
/// so a missing row is logged, not fatal.
async fn shift_balance(
    conn: &mut SqliteConnection,
    customer_id: Option<&str>,
    delta: Money,
) -> DbResult<()> {
    let Some(customer_id) = customer_id else {
        return Ok(());
    };
    if delta.is_zero() {
        return Ok(());
    }

    let result = sqlx::query(
        "UPDATE customers SET balance_cents = balance_cents + ?2, updated_at = ?3 WHERE id = ?1",
    )
    .bind(customer_id)
    .bind(delta.cents())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        warn!(customer_id = %customer_id, delta = %delta, "Balance change for missing customer");
    }
    Ok(())
}

// =============================================================================
// Filter
// =============================================================================

/// Which sales to list. Dates are inclusive calendar days (UTC).
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<SaleStatus>,
    pub sale_type: Option<SaleType>,
    pub customer_id: Option<String>,
    pub limit: Option<u32>,
}

impl SaleFilter {
    /// Sales dated within `from..=to`.
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        SaleFilter {
            from: Some(from),
            to: Some(to),
            ..Default::default()
        }
    }

    /// Sales that still have something owed.
    pub fn pending() -> Self {
        SaleFilter {
            status: Some(SaleStatus::Pending),
            ..Default::default()
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale with its items, payments and installments.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        load_sale(&mut conn, id).await
    }

    /// Lists sales matching `filter`, newest first.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        debug!(?filter, "Listing sales");

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM sales WHERE 1 = 1", SALE_COLUMNS));

        if let Some(from) = filter.from {
            qb.push(" AND date(date) >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND date(date) <= ").push_bind(to);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(sale_type) = filter.sale_type {
            qb.push(" AND sale_type = ").push_bind(sale_type);
        }
        if let Some(customer_id) = &filter.customer_id {
            qb.push(" AND customer_id = ").push_bind(customer_id.clone());
        }
        qb.push(" ORDER BY date DESC, id");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let mut conn = self.pool.acquire().await?;
        let rows = qb.build_query_as::<SaleRow>().fetch_all(&mut *conn).await?;
        debug!(count = rows.len(), "Listed sales");

        hydrate(&mut conn, rows).await
    }

    /// Ids of a customer's sales, oldest first.
    pub async fn ids_for_customer(&self, customer_id: &str) -> DbResult<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM sales WHERE customer_id = ?1 ORDER BY date, id")
                .bind(customer_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    /// Records a sale at the register.
    ///
    /// ## What This Does (one transaction)
    /// 1. Loads the referenced products and checks the customer
    /// 2. Builds the sale (validation, snapshots, totals, plan)
    /// 3. Inserts the sale and its child rows
    /// 4. Decrements stock for every line
    /// 5. Adds the amount still owed to the customer's balance
    pub async fn checkout(
        &self,
        request: &CheckoutRequest,
        allow_negative_stock: bool,
    ) -> DbResult<Sale> {
        debug!(
            lines = request.items.len(),
            sale_type = request.sale_type.as_str(),
            "Starting checkout"
        );

        let mut tx = self.pool.begin().await?;

        let lines = request.merged_lines();
        let ids: Vec<&str> = lines.iter().map(|l| l.product_id.as_str()).collect();
        let products = fetch_many(&mut tx, &ids).await?;

        let customer_exists = match request.customer_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {
                let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE id = ?1")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
                count > 0
            }
            _ => false,
        };

        let ctx = CheckoutContext {
            products: &products,
            customer_exists,
            allow_negative_stock,
            now: Utc::now(),
        };
        let sale = build_sale(request, &ctx, generate_id)?;

        insert_sale(&mut tx, &sale).await?;

        for item in &sale.items {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock = stock - ?2, updated_at = ?3
                WHERE id = ?1 AND (?4 OR stock >= ?2)
                "#,
            )
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(sale.date)
            .bind(allow_negative_stock)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let available = products.get(&item.product_id).map(|p| p.stock).unwrap_or(0);
                return Err(CoreError::InsufficientStock {
                    product: item.name.clone(),
                    available,
                    requested: item.quantity,
                }
                .into());
            }
        }

        shift_balance(&mut tx, sale.customer_id.as_deref(), sale.remaining_balance()).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            sale_id = %sale.id,
            total = %sale.total(),
            sale_type = sale.sale_type.as_str(),
            items = sale.items.len(),
            "Sale recorded"
        );
        Ok(sale)
    }

    /// Pays the selected installments of a sale with one payment.
    pub async fn pay_installments(
        &self,
        sale_id: &str,
        numbers: &[u32],
        method: PaymentMethod,
        note: Option<String>,
    ) -> DbResult<Sale> {
        debug!(sale_id = %sale_id, ?numbers, "Paying installments");

        let mut tx = self.pool.begin().await?;
        let mut sale = require_sale(&mut tx, sale_id).await?;

        let payment = sale.pay_installments(generate_id(), numbers, method, note, Utc::now())?;

        for &number in &payment.installment_numbers {
            sqlx::query(
                "UPDATE installments SET status = ?3, paid_at = ?4 WHERE sale_id = ?1 AND number = ?2",
            )
            .bind(&sale.id)
            .bind(number as i64)
            .bind(InstallmentStatus::Paid)
            .bind(payment.paid_at)
            .execute(&mut *tx)
            .await?;
        }
        insert_payment(&mut tx, &payment).await?;
        update_sale_state(&mut tx, &sale).await?;
        shift_balance(&mut tx, sale.customer_id.as_deref(), -payment.amount()).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            sale_id = %sale.id,
            amount = %payment.amount(),
            installments = ?payment.installment_numbers,
            status = sale.status.as_str(),
            "Installments paid"
        );
        Ok(sale)
    }

    /// Records a free-form payment on a pending sale without a plan.
    pub async fn add_payment(
        &self,
        sale_id: &str,
        amount: Money,
        method: PaymentMethod,
        note: Option<String>,
    ) -> DbResult<Sale> {
        debug!(sale_id = %sale_id, amount = %amount, "Adding payment");

        let mut tx = self.pool.begin().await?;
        let mut sale = require_sale(&mut tx, sale_id).await?;

        let payment = sale.apply_payment(generate_id(), amount, method, note, Utc::now())?;

        insert_payment(&mut tx, &payment).await?;
        update_sale_state(&mut tx, &sale).await?;
        shift_balance(&mut tx, sale.customer_id.as_deref(), -payment.amount()).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            sale_id = %sale.id,
            amount = %payment.amount(),
            status = sale.status.as_str(),
            "Payment recorded"
        );
        Ok(sale)
    }

    /// Deletes a sale, returning its stock and forgiving what was owed.
    ///
    /// Products that no longer exist are skipped. Returns the deleted sale.
    pub async fn delete(&self, sale_id: &str) -> DbResult<Sale> {
        debug!(sale_id = %sale_id, "Deleting sale");

        let mut tx = self.pool.begin().await?;
        let sale = require_sale(&mut tx, sale_id).await?;

        let now = Utc::now();
        for item in &sale.items {
            sqlx::query("UPDATE products SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1")
                .bind(&item.product_id)
                .bind(item.quantity)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        shift_balance(&mut tx, sale.customer_id.as_deref(), -sale.remaining_balance()).await?;

        for table in ["installments", "payments", "sale_items"] {
            sqlx::query(&format!("DELETE FROM {} WHERE sale_id = ?1", table))
                .bind(&sale.id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(&sale.id)
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(sale_id = %sale.id, units = sale.units(), "Sale deleted");
        Ok(sale)
    }

    /// Payments received within `from..=to` and the balance still owed on
    /// every pending sale.
    pub async fn receivables(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Receivables> {
        let (collected_cents, outstanding_cents): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COALESCE(SUM(amount_cents), 0) FROM payments
                 WHERE date(paid_at) BETWEEN ?1 AND ?2),
                (SELECT COALESCE(SUM(remaining_balance_cents), 0) FROM sales
                 WHERE status = 'pending')
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(Receivables {
            collected_cents,
            outstanding_cents,
        })
    }

    /// Counts all recorded sales.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
