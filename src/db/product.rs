//! Product listing storage.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct ProductStore {
    pool: SqlitePool,
}

/// A product listing together with its owner's nickname.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: i64,
    pub uuid: String,
    pub user_id: i64,
    /// Nickname of the user who listed the product
    pub writer: String,
    pub brand: String,
    pub size: String,
    pub price: i64,
    pub description: String,
    pub kind: String,
    pub sold: bool,
    pub views: i64,
    pub likes: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    uuid: String,
    user_id: i64,
    writer: String,
    brand: String,
    size: String,
    price: i64,
    description: String,
    #[sqlx(rename = "type")]
    kind: String,
    sold: bool,
    views: i64,
    likes: i64,
    created_at: String,
    updated_at: String,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            user_id: row.user_id,
            writer: row.writer,
            brand: row.brand,
            size: row.size,
            price: row.price,
            description: row.description,
            kind: row.kind,
            sold: row.sold,
            views: row.views,
            likes: row.likes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Validated fields for a new listing.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub brand: String,
    pub size: String,
    pub price: i64,
    pub description: String,
    pub kind: String,
}

impl ProductStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new product owned by `user_id` and return it.
    pub async fn create(&self, user_id: i64, product: &NewProduct) -> Result<Product, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO products (uuid, user_id, brand, size, price, description, type) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(user_id)
        .bind(&product.brand)
        .bind(&product.size)
        .bind(product.price)
        .bind(&product.description)
        .bind(&product.kind)
        .execute(&self.pool)
        .await?;

        self.get_by_uuid(&uuid)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Get a product by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Product>, sqlx::Error> {
        let row: Option<ProductRow> = sqlx::query_as(
            "SELECT p.id, p.uuid, p.user_id, u.nick_name AS writer, p.brand, p.size, p.price, p.description, p.type, p.sold, p.views, p.likes, p.created_at, p.updated_at
             FROM products p JOIN users u ON u.id = p.user_id
             WHERE p.uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Product::from))
    }

    /// Increment the view counter and return the updated product.
    /// Returns None if the product does not exist.
    pub async fn record_view(&self, uuid: &str) -> Result<Option<Product>, sqlx::Error> {
        let result = sqlx::query("UPDATE products SET views = views + 1 WHERE uuid = ?")
            .bind(uuid)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_uuid(uuid).await
    }

    /// Delete a product. Only deletes if the product belongs to the given user.
    /// Returns true if the product was deleted.
    pub async fn delete(&self, uuid: &str, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM products WHERE uuid = ? AND user_id = ?")
            .bind(uuid)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
