//! # Customer Repository
//!
//! Customers and their balances. A customer's `history` is not stored: it
//! is the ids of sales whose `customer_id` names them, oldest first.
//! Deleting a customer leaves those sales untouched.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::product::like_pattern;
use crate::repository::IN_CHUNK;
use mercado_core::Customer;

const CUSTOMER_COLUMNS: &str = "id, name, contact, balance_cents, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: String,
    name: String,
    contact: Option<String>,
    balance_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CustomerRow {
    fn into_customer(self, history: Vec<String>) -> Customer {
        Customer {
            id: self.id,
            name: self.name,
            contact: self.contact,
            balance_cents: self.balance_cents,
            history,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Lists customers by name, optionally matching `query` against name
    /// and contact.
    pub async fn list(&self, query: Option<&str>) -> DbResult<Vec<Customer>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM customers", CUSTOMER_COLUMNS));

        if let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = like_pattern(query);
            qb.push(" WHERE name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR contact LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\'");
        }
        qb.push(" ORDER BY name COLLATE NOCASE, id");

        let rows = qb
            .build_query_as::<CustomerRow>()
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        let mut histories = self.histories(&ids).await?;

        debug!(count = rows.len(), "Listed customers");
        Ok(rows
            .into_iter()
            .map(|row| {
                let history = histories.remove(&row.id).unwrap_or_default();
                row.into_customer(history)
            })
            .collect())
    }

    /// Gets a customer with their sale history.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers WHERE id = ?1",
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let history = self
                    .histories(&[id])
                    .await?
                    .remove(id)
                    .unwrap_or_default();
                Ok(Some(row.into_customer(history)))
            }
            None => Ok(None),
        }
    }

    /// Sale ids per customer, oldest first.
    async fn histories(&self, ids: &[&str]) -> DbResult<HashMap<String, Vec<String>>> {
        let mut histories: HashMap<String, Vec<String>> = HashMap::new();

        for chunk in ids.chunks(IN_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT customer_id, id FROM sales WHERE customer_id IN (");
            let mut separated = qb.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(") ORDER BY date, id");

            let rows: Vec<(String, String)> = qb.build_query_as().fetch_all(&self.pool).await?;
            for (customer_id, sale_id) in rows {
                histories.entry(customer_id).or_default().push(sale_id);
            }
        }

        Ok(histories)
    }

    /// Inserts a new customer. `balance_cents` is stored as given.
    pub async fn insert(&self, customer: &Customer) -> DbResult<Customer> {
        debug!(id = %customer.id, name = %customer.name, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, contact, balance_cents, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.contact)
        .bind(customer.balance_cents)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(customer.clone())
    }

    /// Updates name and contact. The balance is only changed by sales and
    /// payments.
    pub async fn update(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, "Updating customer");

        let result = sqlx::query(
            "UPDATE customers SET name = ?2, contact = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.contact)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", &customer.id));
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting customer");

        let result = sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }
        Ok(())
    }

    /// Customer names keyed by id, for labelling report rows.
    pub async fn names(&self) -> DbResult<HashMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT id, name FROM customers")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
