/// Product aggregate writes
///
/// A product and its category links are written in one transaction. The
/// submitted category ids must all be live categories of the product's team;
/// otherwise nothing is written. On update the link set is replaced: every
/// existing link is deleted, then one link per submitted id is inserted.
///
/// Image attach and detach are separate, smaller writes and never part of the
/// product transaction.

use chrono::Utc;
use futures::FutureExt;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};

use super::WriteError;
use crate::db::transaction::TransactionRunner;
use crate::models::{
    image::{CreateImage, Image},
    product::{Product, ProductFields, ProductImage, ProductImageDetail},
    product_category::ProductCategory,
};
use crate::sequence::{EntityType, SequenceGenerator};

/// Creates a product with its category links
///
/// An empty `code` is replaced by the team's next product code (`P000001`),
/// allocated inside the same transaction.
pub async fn create_product(
    runner: &TransactionRunner,
    sequences: &SequenceGenerator,
    team_id: i64,
    fields: ProductFields,
    category_ids: Vec<i64>,
) -> Result<Product, WriteError> {
    let sequences = sequences.clone();

    runner
        .with_transaction(move |conn| {
            async move {
                let category_ids = owned_categories(conn, team_id, category_ids).await?;

                let mut fields = fields;
                if fields.code.trim().is_empty() {
                    let value = sequences
                        .next(Some(&mut *conn), EntityType::Product, team_id, 0)
                        .await?;
                    fields.code = EntityType::Product.format_code(value, Utc::now());
                }

                let product = Product::insert(&mut *conn, team_id, fields).await?;
                Product::insert_category_links(conn, product.id, &category_ids).await?;

                info!(
                    team_id,
                    product_id = product.id,
                    code = %product.code,
                    categories = category_ids.len(),
                    "Product created"
                );
                Ok(product)
            }
            .boxed()
        })
        .await
}

/// Updates the product and replaces its category links
pub async fn update_product(
    runner: &TransactionRunner,
    team_id: i64,
    product_id: i64,
    fields: ProductFields,
    category_ids: Vec<i64>,
) -> Result<Product, WriteError> {
    runner
        .with_transaction(move |conn| {
            async move {
                let category_ids = owned_categories(conn, team_id, category_ids).await?;

                let product = Product::update(&mut *conn, team_id, product_id, fields)
                    .await?
                    .ok_or_else(|| WriteError::NotFound("Product not found".to_string()))?;

                let removed = Product::clear_category_links(conn, product.id).await?;
                Product::insert_category_links(conn, product.id, &category_ids).await?;

                debug!(product_id, removed, inserted = category_ids.len(), "Category links replaced");
                Ok(product)
            }
            .boxed()
        })
        .await
}

/// Stores image metadata and links it to a product of the team
pub async fn attach_image(
    runner: &TransactionRunner,
    team_id: i64,
    product_id: i64,
    uploader_id: i64,
    image: CreateImage,
) -> Result<ProductImageDetail, WriteError> {
    runner
        .with_transaction(move |conn| {
            async move {
                if Product::find(&mut *conn, team_id, product_id).await?.is_none() {
                    return Err(WriteError::NotFound("Product not found".to_string()));
                }

                let image = Image::create(&mut *conn, uploader_id, image).await?;
                let link = ProductImage::create(&mut *conn, product_id, image.id).await?;

                Ok(ProductImageDetail {
                    product_image_id: link.id,
                    image,
                })
            }
            .boxed()
        })
        .await
}

/// Soft deletes one image link of a product of the team
pub async fn detach_image(
    pool: &PgPool,
    team_id: i64,
    product_id: i64,
    product_image_id: i64,
) -> Result<(), WriteError> {
    if ProductImage::delete(pool, team_id, product_id, product_image_id).await? {
        Ok(())
    } else {
        Err(WriteError::NotFound("Product image not found".to_string()))
    }
}

/// Deduplicated ids, all checked to be live categories of the team
async fn owned_categories(
    conn: &mut PgConnection,
    team_id: i64,
    category_ids: Vec<i64>,
) -> Result<Vec<i64>, WriteError> {
    let ids = dedup_ids(category_ids);
    if ids.is_empty() {
        return Ok(ids);
    }

    let owned = ProductCategory::count_owned(&mut *conn, team_id, &ids).await?;
    if owned != ids.len() as i64 {
        return Err(WriteError::Validation(
            "Category does not belong to this team".to_string(),
        ));
    }

    Ok(ids)
}

fn dedup_ids(mut ids: Vec<i64>) -> Vec<i64> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_ids() {
        assert_eq!(dedup_ids(vec![3, 1, 3, 2, 1]), vec![1, 2, 3]);
        assert!(dedup_ids(Vec::new()).is_empty());
    }
}
