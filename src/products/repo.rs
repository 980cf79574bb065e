use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    Red,
    Green,
    Orange,
    #[default]
    Gray,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Nutrient {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub color: ColorTag,
    #[serde(default)]
    pub rda: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Badge {
    pub name: String,
    #[serde(default)]
    pub color: ColorTag,
}

/// Nutrition-label block stored as jsonb on the product row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LabelData {
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub processing: String,
    #[serde(default)]
    pub nutrients: Vec<Nutrient>,
    #[serde(default)]
    pub ingredients: Vec<Badge>,
    #[serde(default)]
    pub additives: Vec<Badge>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub sub_category: String,
    #[serde(rename = "image")]
    pub images: Vec<String>,
    pub bestseller: bool,
    pub label_data: Json<LabelData>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields for a brand-new product.
#[derive(Debug)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub category: String,
    pub sub_category: String,
    pub images: Vec<String>,
    pub bestseller: bool,
    pub label_data: LabelData,
}

/// Field merge for an existing product. `None` keeps the stored value;
/// `append_images` is concatenated after the existing image list.
#[derive(Debug, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub bestseller: Option<bool>,
    pub label_data: Option<LabelData>,
    pub append_images: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    Added,
    Updated,
    Deleted,
}

impl HistoryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryAction::Added => "Added",
            HistoryAction::Updated => "Updated",
            HistoryAction::Deleted => "Deleted",
        }
    }
}

/// One audit record. Lives in its own table with no foreign key, so entries
/// for deleted products remain readable (product_id may dangle).
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub product_id: Uuid,
    #[serde(rename = "name")]
    pub product_name: String,
    pub action: String,
    pub admin_email: String,
    #[serde(rename = "date")]
    pub created_at: OffsetDateTime,
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, category, sub_category, images, bestseller, label_data, created_at, updated_at";

impl Product {
    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC"
        ))
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(product)
    }

    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        new: &NewProduct,
    ) -> anyhow::Result<Product> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (name, description, category, sub_category, images, bestseller, label_data)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.category)
        .bind(&new.sub_category)
        .bind(&new.images)
        .bind(new.bestseller)
        .bind(Json(&new.label_data))
        .fetch_one(&mut **tx)
        .await?;
        Ok(product)
    }

    pub async fn update_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        patch: &ProductPatch,
    ) -> anyhow::Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
               SET name = COALESCE($2, name),
                   description = COALESCE($3, description),
                   category = COALESCE($4, category),
                   sub_category = COALESCE($5, sub_category),
                   bestseller = COALESCE($6, bestseller),
                   label_data = COALESCE($7, label_data),
                   images = images || $8,
                   updated_at = now()
             WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(&patch.category)
        .bind(&patch.sub_category)
        .bind(patch.bestseller)
        .bind(patch.label_data.as_ref().map(Json))
        .bind(&patch.append_images)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(product)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub async fn append_history_tx(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    product_name: &str,
    action: HistoryAction,
    admin_email: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO product_history (product_id, product_name, action, admin_email)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(product_id)
    .bind(product_name)
    .bind(action.as_str())
    .bind(admin_email)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Non-transactional variant used by delete, where the audit row must commit
/// before the product row goes away.
pub async fn append_history(
    db: &PgPool,
    product_id: Uuid,
    product_name: &str,
    action: HistoryAction,
    admin_email: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO product_history (product_id, product_name, action, admin_email)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(product_id)
    .bind(product_name)
    .bind(action.as_str())
    .bind(admin_email)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn recent_history(db: &PgPool, limit: i64) -> anyhow::Result<Vec<HistoryEntry>> {
    let rows = sqlx::query_as::<_, HistoryEntry>(
        r#"
        SELECT id, product_id, product_name, action, admin_email, created_at
          FROM product_history
         ORDER BY created_at DESC
         LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
