use anyhow::Context;
use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::ApiError,
    state::AppState,
    storage::ext_from_mime,
};

use super::repo::{
    self, HistoryAction, NewProduct, Product, ProductPatch,
};

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Uploads product images concurrently and returns their durable URLs in the
/// original order. A single failed upload fails the whole batch; objects that
/// already made it to storage are not retracted.
pub async fn upload_images(state: &AppState, items: Vec<UploadItem>) -> anyhow::Result<Vec<String>> {
    let count = items.len();
    let mut set = JoinSet::new();
    for (idx, item) in items.into_iter().enumerate() {
        let storage = state.storage.clone();
        set.spawn(async move {
            let ext = ext_from_mime(&item.content_type).unwrap_or("bin");
            let key = format!("products/{}.{}", Uuid::new_v4(), ext);
            let url = storage
                .upload(&key, item.body, &item.content_type)
                .await
                .with_context(|| format!("upload {}", key))?;
            anyhow::Ok((idx, url))
        });
    }

    let mut urls: Vec<Option<String>> = vec![None; count];
    while let Some(joined) = set.join_next().await {
        let (idx, url) = joined.context("upload task panicked")??;
        urls[idx] = Some(url);
    }
    urls.into_iter()
        .map(|u| u.context("upload slot missing"))
        .collect()
}

/// Persists a new product together with its `Added` audit entry in a single
/// transaction.
pub async fn create(
    state: &AppState,
    new: NewProduct,
    admin_email: &str,
) -> Result<Product, ApiError> {
    if new.name.trim().is_empty() || new.category.trim().is_empty() {
        return Err(ApiError::validation("Name and category are required"));
    }

    let mut tx = state.db.begin().await.context("begin tx")?;
    let product = Product::insert_tx(&mut tx, &new).await?;
    repo::append_history_tx(
        &mut tx,
        product.id,
        &product.name,
        HistoryAction::Added,
        admin_email,
    )
    .await?;
    tx.commit().await.context("commit tx")?;

    info!(product_id = %product.id, admin = %admin_email, "product created");
    Ok(product)
}

/// Merges the patch and appends the `Updated` audit entry atomically: both
/// commit or neither does. Concurrent updates race last-write-wins; there is
/// no version check.
pub async fn update(
    state: &AppState,
    id: Uuid,
    patch: ProductPatch,
    admin_email: &str,
) -> Result<Product, ApiError> {
    let mut tx = state.db.begin().await.context("begin tx")?;
    let product = Product::update_tx(&mut tx, id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    repo::append_history_tx(
        &mut tx,
        product.id,
        &product.name,
        HistoryAction::Updated,
        admin_email,
    )
    .await?;
    tx.commit().await.context("commit tx")?;

    info!(product_id = %product.id, admin = %admin_email, "product updated");
    Ok(product)
}

/// Two-step delete: the `Deleted` audit entry is committed first, then the
/// product row is removed. Audit durability takes precedence over entity
/// consistency, so a crash between the steps leaves a Deleted entry for a
/// still-existing product rather than an unaudited disappearance.
pub async fn remove(state: &AppState, id: Uuid, admin_email: &str) -> Result<(), ApiError> {
    let product = Product::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    repo::append_history(
        &state.db,
        product.id,
        &product.name,
        HistoryAction::Deleted,
        admin_email,
    )
    .await?;

    Product::delete(&state.db, id).await?;

    info!(product_id = %id, admin = %admin_email, "product deleted");
    Ok(())
}
