/// Database models for Stockroom
///
/// One module per table family. Every entity carries a nullable `deleted_at`
/// tombstone and every read filters on `deleted_at IS NULL`; the product to
/// category junction is the only table whose rows are physically deleted.
///
/// # Models
///
/// - `role`: global and team role catalogs
/// - `user`: accounts, email verification and profile images
/// - `team`: teams
/// - `membership`: team membership rows and their pending/active lifecycle
/// - `product_category`: per-team product categories
/// - `product`: products, category links and image links
/// - `image`: uploaded image metadata
/// - `report`: global report templates
/// - `policy`: persisted authorization rules
/// - `pagination`: page requests and page metadata shared by list queries

pub mod image;
pub mod membership;
pub mod pagination;
pub mod policy;
pub mod product;
pub mod product_category;
pub mod report;
pub mod role;
pub mod team;
pub mod user;
