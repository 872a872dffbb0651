//! Catalog record persistence
//!
//! Every operation checks a connection out of the pool for a single
//! statement; there is no run-long transaction, so partial progress from a
//! crashed run stays visible by design.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::domain::error::SyncResult;
use crate::domain::product::{CatalogFilter, CatalogRecord};

const RECORD_COLUMNS: &str = "sku, name, brand, category, wholesale_price, retail_price, \
     margin_percent, description, images, in_stock, stock_quantity, flavours, strengths, \
     ingredients, allergens, active, excluded, source_url, last_synced_at";

#[derive(Clone)]
pub struct CatalogRepository {
    pool: Arc<SqlitePool>,
}

impl CatalogRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    pub async fn find_by_sku(&self, sku: &str) -> SyncResult<Option<CatalogRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM products WHERE sku = ?"
        ))
        .bind(sku)
        .fetch_optional(&*self.pool)
        .await?;

        row.map(|r| record_from_row(&r)).transpose()
    }

    pub async fn insert(&self, record: &CatalogRecord) -> SyncResult<()> {
        sqlx::query(
            r"
            INSERT INTO products
            (sku, name, brand, category, wholesale_price, retail_price, margin_percent,
             description, images, in_stock, stock_quantity, flavours, strengths,
             ingredients, allergens, active, excluded, source_url, last_synced_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&record.sku)
        .bind(&record.name)
        .bind(&record.brand)
        .bind(&record.category)
        .bind(record.wholesale_price)
        .bind(record.retail_price)
        .bind(record.margin_percent)
        .bind(&record.description)
        .bind(serde_json::to_string(&record.images).unwrap_or_else(|_| "[]".to_string()))
        .bind(record.in_stock)
        .bind(record.stock_quantity)
        .bind(&record.flavours)
        .bind(&record.strengths)
        .bind(&record.ingredients)
        .bind(&record.allergens)
        .bind(record.active)
        .bind(record.excluded)
        .bind(&record.source_url)
        .bind(record.last_synced_at)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// Overwrite the sync-managed fields of an existing record. The manual
    /// flags (`active`, `excluded`) are deliberately not touched here.
    pub async fn update(&self, record: &CatalogRecord) -> SyncResult<()> {
        sqlx::query(
            r"
            UPDATE products SET
                name = ?, brand = ?, category = ?, wholesale_price = ?, retail_price = ?,
                margin_percent = ?, description = ?, images = ?, in_stock = ?,
                stock_quantity = ?, flavours = ?, strengths = ?, ingredients = ?,
                allergens = ?, source_url = ?, last_synced_at = ?
            WHERE sku = ?
            ",
        )
        .bind(&record.name)
        .bind(&record.brand)
        .bind(&record.category)
        .bind(record.wholesale_price)
        .bind(record.retail_price)
        .bind(record.margin_percent)
        .bind(&record.description)
        .bind(serde_json::to_string(&record.images).unwrap_or_else(|_| "[]".to_string()))
        .bind(record.in_stock)
        .bind(record.stock_quantity)
        .bind(&record.flavours)
        .bind(&record.strengths)
        .bind(&record.ingredients)
        .bind(&record.allergens)
        .bind(&record.source_url)
        .bind(record.last_synced_at)
        .bind(&record.sku)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_active(&self, sku: &str, active: bool) -> SyncResult<()> {
        sqlx::query("UPDATE products SET active = ? WHERE sku = ?")
            .bind(active)
            .bind(sku)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_excluded(&self, sku: &str, excluded: bool) -> SyncResult<()> {
        sqlx::query("UPDATE products SET excluded = ? WHERE sku = ?")
            .bind(excluded)
            .bind(sku)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_pricing(&self, sku: &str, retail: f64, margin: f64) -> SyncResult<()> {
        sqlx::query("UPDATE products SET retail_price = ?, margin_percent = ? WHERE sku = ?")
            .bind(retail)
            .bind(margin)
            .bind(sku)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_stock(
        &self,
        sku: &str,
        in_stock: bool,
        quantity: Option<i64>,
        synced_at: DateTime<Utc>,
    ) -> SyncResult<()> {
        sqlx::query(
            "UPDATE products SET in_stock = ?, stock_quantity = ?, last_synced_at = ? WHERE sku = ?",
        )
        .bind(in_stock)
        .bind(quantity)
        .bind(synced_at)
        .bind(sku)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// Records not refreshed since `cutoff`, oldest first, for incremental
    /// sync. Excluded records are left out at the query level.
    pub async fn stale_records(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> SyncResult<Vec<CatalogRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM products \
             WHERE last_synced_at < ? AND excluded = 0 \
             ORDER BY last_synced_at ASC LIMIT ?"
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Every known record, for the stock-check walk.
    pub async fn all_records(&self) -> SyncResult<Vec<CatalogRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM products ORDER BY sku ASC"
        ))
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn list(
        &self,
        filter: &CatalogFilter,
        page: u32,
        page_size: u32,
    ) -> SyncResult<Vec<CatalogRecord>> {
        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM products");
        let mut conditions = Vec::new();

        if filter.search.is_some() {
            conditions.push("(name LIKE ? OR sku LIKE ?)");
        }
        if filter.in_stock.is_some() {
            conditions.push("in_stock = ?");
        }
        if filter.active.is_some() {
            conditions.push("active = ?");
        }
        if filter.excluded.is_some() {
            conditions.push("excluded = ?");
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY name ASC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql);
        if let Some(search) = &filter.search {
            let pattern = format!("%{search}%");
            query = query.bind(pattern.clone()).bind(pattern);
        }
        if let Some(in_stock) = filter.in_stock {
            query = query.bind(in_stock);
        }
        if let Some(active) = filter.active {
            query = query.bind(active);
        }
        if let Some(excluded) = filter.excluded {
            query = query.bind(excluded);
        }

        let page = page.max(1);
        let offset = i64::from(page - 1) * i64::from(page_size);
        let rows = query
            .bind(i64::from(page_size))
            .bind(offset)
            .fetch_all(&*self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn count(&self) -> SyncResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
            .fetch_one(&*self.pool)
            .await?;
        Ok(count)
    }
}

fn record_from_row(row: &SqliteRow) -> SyncResult<CatalogRecord> {
    let images: String = row.try_get("images")?;
    Ok(CatalogRecord {
        sku: row.try_get("sku")?,
        name: row.try_get("name")?,
        brand: row.try_get("brand")?,
        category: row.try_get("category")?,
        wholesale_price: row.try_get("wholesale_price")?,
        retail_price: row.try_get("retail_price")?,
        margin_percent: row.try_get("margin_percent")?,
        description: row.try_get("description")?,
        images: serde_json::from_str(&images).unwrap_or_default(),
        in_stock: row.try_get("in_stock")?,
        stock_quantity: row.try_get("stock_quantity")?,
        flavours: row.try_get("flavours")?,
        strengths: row.try_get("strengths")?,
        ingredients: row.try_get("ingredients")?,
        allergens: row.try_get("allergens")?,
        active: row.try_get("active")?,
        excluded: row.try_get("excluded")?,
        source_url: row.try_get("source_url")?,
        last_synced_at: row.try_get("last_synced_at")?,
    })
}
