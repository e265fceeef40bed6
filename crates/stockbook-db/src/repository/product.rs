//! # Product Repository
//!
//! Database operations for the catalog.
//!
//! ## Key Operations
//! - CRUD with optimistic versioning and soft delete
//! - Barcode lookup for the register
//! - Name/barcode substring search with category filter
//! - Low-stock and problematic (cost above price) listings
//!
//! Stock is only ever decremented by checkout (see `sale.rs`), through a
//! guarded `UPDATE ... WHERE quantity >= ?`.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use stockbook_core::validation::validate_search_query;
use stockbook_core::{CoreError, NewProduct, Product, ProductPatch};
use tracing::{debug, info};
use uuid::Uuid;

use super::{non_blank, PRODUCT_COLUMNS};
use crate::error::{DbError, DbResult};
use crate::pool::WriteGate;

const DEFAULT_LIST_LIMIT: u32 = 200;
const MAX_LIST_LIMIT: u32 = 1_000;

/// Catalog listing filter. All fields optional.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Substring of name or barcode.
    pub query: Option<String>,
    pub category_id: Option<String>,
    pub limit: Option<u32>,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.find_by_barcode("4780000000017").await?;
/// let low = repo.low_stock().await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    write_gate: WriteGate,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool, write_gate: WriteGate) -> Self {
        ProductRepository { pool, write_gate }
    }

    /// Lists active products in name order.
    ///
    /// ## Arguments
    /// * `filter.query` - matches anywhere in name or barcode, case-insensitive
    /// * `filter.category_id` - exact category match
    /// * `filter.limit` - defaults to 200, capped at 1000
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        let query = match filter.query.as_deref() {
            Some(raw) => validate_search_query(raw)?,
            None => String::new(),
        };
        let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

        debug!(query = %query, category = ?filter.category_id, limit, "Listing products");

        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE is_active = 1
              AND (?1 = '' OR name LIKE '%' || ?1 || '%' OR barcode LIKE '%' || ?1 || '%')
              AND (?2 IS NULL OR category_id = ?2)
            ORDER BY name COLLATE NOCASE, id
            LIMIT ?3
            "#
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(&query)
            .bind(&filter.category_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Listing returned products");
        Ok(products)
    }

    /// All active products, for the dashboard.
    pub async fn all_active(&self) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name, id");
        let products = sqlx::query_as::<_, Product>(&sql).fetch_all(&self.pool).await?;
        Ok(products)
    }

    /// Gets a product by its ID, active or not.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        debug!(id = %id, "Getting product");
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut *conn, id).await
    }

    /// Gets an active product or fails with `ProductNotFound`.
    pub async fn require_active(&self, id: &str) -> DbResult<Product> {
        self.get_by_id(id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Finds the active product carrying a barcode.
    pub async fn find_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let barcode = barcode.trim();
        debug!(barcode = %barcode, "Looking up product by barcode");

        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = ?1 AND is_active = 1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Products at or below their reorder threshold, emptiest first.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND quantity <= min_stock \
             ORDER BY quantity, name"
        );
        let products = sqlx::query_as::<_, Product>(&sql).fetch_all(&self.pool).await?;
        debug!(count = products.len(), "Low-stock products");
        Ok(products)
    }

    /// Products whose cost exceeds their price, largest unit loss first.
    pub async fn problematic(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND cost_cents > price_cents \
             ORDER BY (cost_cents - price_cents) DESC, name"
        );
        let products = sqlx::query_as::<_, Product>(&sql).fetch_all(&self.pool).await?;
        Ok(products)
    }

    /// Inserts a new product.
    pub async fn create(&self, input: &NewProduct) -> DbResult<Product> {
        input.validate()?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            barcode: non_blank(input.barcode.as_deref()),
            category_id: non_blank(input.category_id.as_deref()),
            unit: non_blank(input.unit.as_deref()).unwrap_or_else(|| "pcs".to_string()),
            cost_cents: input.cost_cents,
            price_cents: input.price_cents,
            quantity: input.quantity,
            min_stock: input.min_stock.unwrap_or(0),
            is_active: true,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let _gate = self.write_gate.lock().await;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, barcode, category_id, unit, cost_cents, price_cents,
                quantity, min_stock, is_active, version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.barcode)
        .bind(&product.category_id)
        .bind(&product.unit)
        .bind(product.cost_cents)
        .bind(product.price_cents)
        .bind(product.quantity)
        .bind(product.min_stock)
        .bind(product.is_active)
        .bind(product.version)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DbError::from(e).on_duplicate("barcode", product.barcode.as_deref().unwrap_or_default())
        })?;

        info!(id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Applies a partial edit.
    ///
    /// An empty `barcode` or `categoryId` clears the field. When `version`
    /// is given and differs from the stored row, nothing is written and a
    /// `Conflict` is returned.
    pub async fn update(&self, id: &str, patch: &ProductPatch) -> DbResult<Product> {
        patch.validate()?;

        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let current = fetch_by_id(&mut *tx, id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;

        if let Some(expected) = patch.version {
            if expected != current.version {
                return Err(CoreError::Conflict {
                    entity: "Product".to_string(),
                    id: id.to_string(),
                    expected,
                }
                .into());
            }
        }

        let mut next = current.clone();
        if let Some(name) = &patch.name {
            next.name = name.trim().to_string();
        }
        if let Some(barcode) = &patch.barcode {
            next.barcode = non_blank(Some(barcode));
        }
        if let Some(category_id) = &patch.category_id {
            next.category_id = non_blank(Some(category_id));
        }
        if let Some(unit) = non_blank(patch.unit.as_deref()) {
            next.unit = unit;
        }
        next.cost_cents = patch.cost_cents.unwrap_or(current.cost_cents);
        next.price_cents = patch.price_cents.unwrap_or(current.price_cents);
        next.quantity = patch.quantity.unwrap_or(current.quantity);
        next.min_stock = patch.min_stock.unwrap_or(current.min_stock);
        next.version = current.version + 1;
        next.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = ?1, barcode = ?2, category_id = ?3, unit = ?4,
                cost_cents = ?5, price_cents = ?6, quantity = ?7, min_stock = ?8,
                version = ?9, updated_at = ?10
            WHERE id = ?11 AND version = ?12
            "#,
        )
        .bind(&next.name)
        .bind(&next.barcode)
        .bind(&next.category_id)
        .bind(&next.unit)
        .bind(next.cost_cents)
        .bind(next.price_cents)
        .bind(next.quantity)
        .bind(next.min_stock)
        .bind(next.version)
        .bind(next.updated_at)
        .bind(id)
        .bind(current.version)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("barcode", next.barcode.as_deref().unwrap_or_default()))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict {
                entity: "Product".to_string(),
                id: id.to_string(),
                expected: current.version,
            }
            .into());
        }

        tx.commit().await?;

        info!(id = %id, version = next.version, "Product updated");
        Ok(next)
    }

    /// Soft-deletes a product. Past sales keep their snapshots.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let _gate = self.write_gate.lock().await;

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, version = version + 1, updated_at = ?1 \
             WHERE id = ?2 AND is_active = 1",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(id.to_string()).into());
        }

        info!(id = %id, "Product deactivated");
        Ok(())
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn fetch_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(product)
}

/// Loads the rows a checkout refers to. Unknown ids are simply absent.
pub(crate) async fn fetch_many(conn: &mut SqliteConnection, ids: &[&str]) -> DbResult<Vec<Product>> {
    let mut products = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(product) = fetch_by_id(conn, id).await? {
            products.push(product);
        }
    }
    Ok(products)
}

/// Removes stock only if enough is on hand. Bumps the version so a product
/// edit read before the sale can no longer overwrite the new quantity.
///
/// Returns `false` when the guard rejected the update.
pub(crate) async fn decrement_stock(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE products SET quantity = quantity - ?1, version = version + 1, updated_at = ?2 \
         WHERE id = ?3 AND is_active = 1 AND quantity >= ?1",
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Puts stock back after a cancellation. Inactive products are restocked too.
pub(crate) async fn restock(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<()> {
    sqlx::query(
        "UPDATE products SET quantity = quantity + ?1, version = version + 1, updated_at = ?2 WHERE id = ?3",
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
