//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Storefront listing (active only, category filter, text search)
//! - Admin CRUD, stock adjustment, activate/deactivate
//! - Barcode lookup (barcodes are unique when present)
//!
//! ## Search
//! ```text
//! q = "lin"
//!   name LIKE '%lin%'          → "Linen Shirt", "Satin Linen Pants"
//!   description LIKE '%lin%'   → "... lined pockets ..."
//!   barcode = 'lin'            → exact scanner match
//! ```
//! `%`, `_` and `\` in the query are escaped, so they match literally.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::IN_CHUNK;
use mercado_core::{Category, CategoryCount, CoreError, Product, ValidationError, MAX_STOCK};

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, description, category, cost_price_cents, \
     sale_price_cents, stock, barcode, images, active, created_at, updated_at";

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: String,
    name: String,
    description: Option<String>,
    category: Category,
    cost_price_cents: i64,
    sale_price_cents: i64,
    stock: i64,
    barcode: Option<String>,
    images: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    pub(crate) fn into_product(self) -> DbResult<Product> {
        let images: Vec<String> =
            serde_json::from_str(&self.images).map_err(|e| DbError::corrupt("products.images", e))?;

        Ok(Product {
            id: self.id,
            name: self.name,
            description: self.description,
            category: self.category,
            cost_price_cents: self.cost_price_cents,
            sale_price_cents: self.sale_price_cents,
            stock: self.stock,
            barcode: self.barcode,
            images,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn collect(rows: Vec<ProductRow>) -> DbResult<Vec<Product>> {
    rows.into_iter().map(ProductRow::into_product).collect()
}

fn images_json(product: &Product) -> DbResult<String> {
    serde_json::to_string(&product.images).map_err(|e| DbError::corrupt("products.images", e))
}

/// Escapes LIKE wildcards and wraps the term in `%...%`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// =============================================================================
// Filter
// =============================================================================

/// Which products to list.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<Category>,
    /// Matched against name, description and barcode.
    pub query: Option<String>,
    /// Hide inactive products (storefront).
    pub active_only: bool,
    pub limit: Option<u32>,
}

impl ProductFilter {
    /// Active products only, as the storefront sees them.
    pub fn storefront() -> Self {
        ProductFilter {
            active_only: true,
            ..Default::default()
        }
    }

    /// Every product, active or not.
    pub fn all() -> Self {
        ProductFilter::default()
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists products matching `filter`, ordered by name.
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        debug!(
            category = ?filter.category,
            query = ?filter.query,
            active_only = filter.active_only,
            "Listing products"
        );

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM products WHERE 1 = 1", PRODUCT_COLUMNS));

        if filter.active_only {
            qb.push(" AND active = 1");
        }
        if let Some(category) = filter.category {
            qb.push(" AND category = ").push_bind(category);
        }
        if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = like_pattern(query);
            qb.push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR description LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\' OR barcode = ")
                .push_bind(query.to_string())
                .push(")");
        }
        qb.push(" ORDER BY name COLLATE NOCASE, id");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = qb
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await?;

        debug!(count = rows.len(), "Listed products");
        collect(rows)
    }

    /// Gets a product by its ID, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = ?1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProductRow::into_product).transpose()
    }

    /// Gets a product by exact barcode.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE barcode = ?1",
            PRODUCT_COLUMNS
        ))
        .bind(barcode.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProductRow::into_product).transpose()
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - barcode already used
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, category,
                cost_price_cents, sale_price_cents, stock,
                barcode, images, active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.category)
        .bind(product.cost_price_cents)
        .bind(product.sale_price_cents)
        .bind(product.stock)
        .bind(&product.barcode)
        .bind(images_json(product)?)
        .bind(product.active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_value(product.barcode.as_deref().unwrap_or("")))?;

        Ok(product.clone())
    }

    /// Writes every mutable field of `product`.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                description = ?3,
                category = ?4,
                cost_price_cents = ?5,
                sale_price_cents = ?6,
                stock = ?7,
                barcode = ?8,
                images = ?9,
                active = ?10,
                updated_at = ?11
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.category)
        .bind(product.cost_price_cents)
        .bind(product.sale_price_cents)
        .bind(product.stock)
        .bind(&product.barcode)
        .bind(images_json(product)?)
        .bind(product.active)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_value(product.barcode.as_deref().unwrap_or("")))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Changes stock by a signed delta (restock > 0, shrinkage < 0).
    ///
    /// The update is a single `stock = stock + delta` statement so concurrent
    /// adjustments never overwrite each other.
    ///
    /// ## Errors
    /// * `NotFound` - no such product
    /// * `Domain(InsufficientStock)` - result would be negative and
    ///   `allow_negative_stock` is false
    pub async fn adjust_stock(
        &self,
        id: &str,
        delta: i64,
        allow_negative_stock: bool,
    ) -> DbResult<Product> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + ?2, updated_at = ?3
            WHERE id = ?1 AND (?4 OR stock + ?2 >= 0) AND stock + ?2 BETWEEN -?5 AND ?5
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(Utc::now())
        .bind(allow_negative_stock)
        .bind(MAX_STOCK)
        .execute(&self.pool)
        .await?;

        let product = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        if result.rows_affected() == 0 {
            let target = product.stock.saturating_add(delta);
            if !(-MAX_STOCK..=MAX_STOCK).contains(&target) {
                return Err(CoreError::from(ValidationError::OutOfRange {
                    field: "stock".to_string(),
                    min: -MAX_STOCK,
                    max: MAX_STOCK,
                })
                .into());
            }
            return Err(CoreError::InsufficientStock {
                product: product.name,
                available: product.stock,
                requested: -delta,
            }
            .into());
        }

        Ok(product)
    }

    /// Shows or hides a product on the storefront and register.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<Product> {
        debug!(id = %id, active, "Setting product active flag");

        let result = sqlx::query("UPDATE products SET active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Deletes a product permanently. Past sales keep their snapshots.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Active product count for every category, in display order.
    pub async fn category_counts(&self) -> DbResult<Vec<CategoryCount>> {
        let rows: Vec<(Category, i64)> = sqlx::query_as(
            "SELECT category, COUNT(*) FROM products WHERE active = 1 GROUP BY category",
        )
        .fetch_all(&self.pool)
        .await?;

        let counts: HashMap<Category, i64> = rows.into_iter().collect();
        Ok(Category::all()
            .iter()
            .map(|&category| CategoryCount {
                category,
                count: counts.get(&category).copied().unwrap_or(0),
            })
            .collect())
    }
}

/// Loads the given products on an open connection, keyed by id.
///
/// Unknown ids are simply absent from the map.
pub(crate) async fn fetch_many(
    conn: &mut SqliteConnection,
    ids: &[&str],
) -> DbResult<HashMap<String, Product>> {
    let mut products = HashMap::with_capacity(ids.len());

    for chunk in ids.chunks(IN_CHUNK) {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM products WHERE id IN (", PRODUCT_COLUMNS));
        let mut separated = qb.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows = qb.build_query_as::<ProductRow>().fetch_all(&mut *conn).await?;
        for row in rows {
            let product = row.into_product()?;
            products.insert(product.id.clone(), product);
        }
    }

    Ok(products)
}

// =============================================================================
// Unit Tests
// =============================================================================
