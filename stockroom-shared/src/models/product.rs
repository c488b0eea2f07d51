/// Products and their links
///
/// A product owns two link sets:
///
/// - category links (`product_product_categories`), replaced wholesale on
///   every update and physically deleted
/// - image links (`product_images`), attached and detached one at a time and
///   soft deleted
///
/// Every query is scoped by `team_id`, so an id from another team behaves
/// exactly like a missing row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};

use super::image::Image;
use super::pagination::{Page, PageRequest};
use super::product_category::ProductCategory;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub team_id: i64,
    pub code: String,
    pub name: String,
    pub description: String,
    pub uom: String,
    /// Price in cents
    pub price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable product fields
#[derive(Debug, Clone)]
pub struct ProductFields {
    pub code: String,
    pub name: String,
    pub description: String,
    pub uom: String,
    pub price: i64,
}

/// Optional list filters, each an `ILIKE` pattern
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub name: Option<String>,
    pub code: Option<String>,
    pub uom: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductImage {
    pub id: i64,
    pub product_id: i64,
    pub image_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Image link joined with its image
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductImageDetail {
    pub product_image_id: i64,

    #[sqlx(flatten)]
    pub image: Image,
}

/// A product with both link sets resolved
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub categories: Vec<ProductCategory>,
    pub images: Vec<ProductImageDetail>,
}

impl Product {
    pub async fn insert<'e, E>(executor: E, team_id: i64, fields: ProductFields) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (team_id, code, name, description, uom, price)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, team_id, code, name, description, uom, price, created_at, updated_at
            "#,
        )
        .bind(team_id)
        .bind(fields.code)
        .bind(fields.name)
        .bind(fields.description)
        .bind(fields.uom)
        .bind(fields.price)
        .fetch_one(executor)
        .await
    }

    /// `None` when the product is not a live product of the team
    pub async fn update<'e, E>(
        executor: E,
        team_id: i64,
        id: i64,
        fields: ProductFields,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET code = $3, name = $4, description = $5, uom = $6, price = $7,
                updated_at = NOW()
            WHERE team_id = $1 AND id = $2 AND deleted_at IS NULL
            RETURNING id, team_id, code, name, description, uom, price, created_at, updated_at
            "#,
        )
        .bind(team_id)
        .bind(id)
        .bind(fields.code)
        .bind(fields.name)
        .bind(fields.description)
        .bind(fields.uom)
        .bind(fields.price)
        .fetch_optional(executor)
        .await
    }

    pub async fn find<'e, E>(executor: E, team_id: i64, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT id, team_id, code, name, description, uom, price, created_at, updated_at
            FROM products
            WHERE team_id = $1 AND id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(team_id)
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Loads the product with its categories and images
    pub async fn find_detail(pool: &PgPool, team_id: i64, id: i64) -> Result<Option<ProductDetail>, sqlx::Error> {
        let Some(product) = Self::find(pool, team_id, id).await? else {
            return Ok(None);
        };

        let categories = sqlx::query_as::<_, ProductCategory>(
            r#"
            SELECT c.id, c.team_id, c.name, c.created_at, c.updated_at
            FROM product_product_categories ppc
            JOIN product_categories c ON c.id = ppc.product_category_id AND c.deleted_at IS NULL
            WHERE ppc.product_id = $1
            ORDER BY c.name, c.id
            "#,
        )
        .bind(product.id)
        .fetch_all(pool)
        .await?;

        let images = sqlx::query_as::<_, ProductImageDetail>(
            r#"
            SELECT pi.id AS product_image_id, i.id, i.path, i.url, i.size, i.width,
                   i.height, i.mime_type, i.user_id, i.created_at
            FROM product_images pi
            JOIN images i ON i.id = pi.image_id AND i.deleted_at IS NULL
            WHERE pi.product_id = $1 AND pi.deleted_at IS NULL
            ORDER BY pi.id
            "#,
        )
        .bind(product.id)
        .fetch_all(pool)
        .await?;

        Ok(Some(ProductDetail {
            product,
            categories,
            images,
        }))
    }

    pub async fn list(
        pool: &PgPool,
        team_id: i64,
        filter: ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Self>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM products
            WHERE team_id = $1 AND deleted_at IS NULL
              AND ($2::TEXT IS NULL OR name ILIKE $2)
              AND ($3::TEXT IS NULL OR code ILIKE $3)
              AND ($4::TEXT IS NULL OR uom ILIKE $4)
            "#,
        )
        .bind(team_id)
        .bind(filter.name.as_deref())
        .bind(filter.code.as_deref())
        .bind(filter.uom.as_deref())
        .fetch_one(pool)
        .await?;

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, team_id, code, name, description, uom, price, created_at, updated_at
            FROM products
            WHERE team_id = $1 AND deleted_at IS NULL
              AND ($2::TEXT IS NULL OR name ILIKE $2)
              AND ($3::TEXT IS NULL OR code ILIKE $3)
              AND ($4::TEXT IS NULL OR uom ILIKE $4)
            ORDER BY created_at DESC, id DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(team_id)
        .bind(filter.name.as_deref())
        .bind(filter.code.as_deref())
        .bind(filter.uom.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok(Page::new(products, page, total))
    }

    /// Soft delete; false when nothing matched
    pub async fn delete<'e, E>(executor: E, team_id: i64, id: i64) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET deleted_at = NOW()
            WHERE team_id = $1 AND id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(team_id)
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Inserts one category link per id
    pub async fn insert_category_links(
        conn: &mut PgConnection,
        product_id: i64,
        category_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        if category_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO product_product_categories (product_id, product_category_id)
            SELECT $1, UNNEST($2::BIGINT[])
            "#,
        )
        .bind(product_id)
        .bind(category_ids)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Physically removes every category link of the product
    pub async fn clear_category_links(conn: &mut PgConnection, product_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM product_product_categories WHERE product_id = $1")
            .bind(product_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Category ids currently linked, ascending
    pub async fn category_ids<'e, E>(executor: E, product_id: i64) -> Result<Vec<i64>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT product_category_id
            FROM product_product_categories
            WHERE product_id = $1
            ORDER BY product_category_id
            "#,
        )
        .bind(product_id)
        .fetch_all(executor)
        .await
    }
}

impl ProductImage {
    pub async fn create<'e, E>(executor: E, product_id: i64, image_id: i64) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProductImage>(
            r#"
            INSERT INTO product_images (product_id, image_id)
            VALUES ($1, $2)
            RETURNING id, product_id, image_id, created_at
            "#,
        )
        .bind(product_id)
        .bind(image_id)
        .fetch_one(executor)
        .await
    }

    /// Soft deletes the link, scoped to a product of the team
    pub async fn delete<'e, E>(executor: E, team_id: i64, product_id: i64, id: i64) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE product_images pi
            SET deleted_at = NOW()
            FROM products p
            WHERE pi.id = $3 AND pi.product_id = $2 AND pi.deleted_at IS NULL
              AND p.id = pi.product_id AND p.team_id = $1 AND p.deleted_at IS NULL
            "#,
        )
        .bind(team_id)
        .bind(product_id)
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
