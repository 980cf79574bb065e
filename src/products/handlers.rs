use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::AdminPrincipal,
    error::ApiError,
    state::AppState,
};

use super::dto::{
    CreateProductJson, HistoryResponse, LabelDataInput, MessageResponse, ProductResponse,
    ProductsResponse, UpdateProductJson,
};
use super::repo::{self, LabelData, NewProduct, Product, ProductPatch};
use super::services::{self, UploadItem};

const HISTORY_LIMIT: i64 = 50;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/product/list", get(list_products))
        .route("/api/product/:id", get(get_product))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/products",
            get(admin_list_products).post(create_product),
        )
        .route("/api/admin/products/history", get(product_history))
        .route(
            "/api/admin/products/:id",
            axum::routing::put(update_product).delete(delete_product),
        )
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
}

// --- public reads ---

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<ProductsResponse>, ApiError> {
    let products = Product::list(&state.db).await?;
    Ok(Json(ProductsResponse {
        success: true,
        products,
    }))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = Product::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(Json(ProductResponse {
        success: true,
        product,
    }))
}

// --- admin mutations ---

#[instrument(skip(state))]
pub async fn admin_list_products(
    State(state): State<AppState>,
    AdminPrincipal(_admin): AdminPrincipal,
) -> Result<Json<ProductsResponse>, ApiError> {
    let products = Product::list(&state.db).await?;
    Ok(Json(ProductsResponse {
        success: true,
        products,
    }))
}

/// POST /api/admin/products. Two admission routes on the same path: a JSON
/// body carrying pre-uploaded image URLs (required non-empty), or multipart
/// form data whose files are uploaded here before the insert.
#[instrument(skip(state, req))]
pub async fn create_product(
    State(state): State<AppState>,
    AdminPrincipal(admin_email): AdminPrincipal,
    req: Request,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let new = if is_multipart(&req) {
        let mp = Multipart::from_request(req, &())
            .await
            .map_err(|e| ApiError::validation(e.to_string()))?;
        let form = parse_product_form(mp).await?;
        // Label text is resolved before the uploads start, so a malformed
        // label never costs a stored object.
        let label_data = resolve_label(form.label_data)?;
        let images = services::upload_images(&state, form.files).await?;
        NewProduct {
            name: form.name.unwrap_or_default(),
            description: form.description.unwrap_or_default(),
            category: form.category.unwrap_or_default(),
            sub_category: form.sub_category.unwrap_or_default(),
            images,
            bestseller: form.bestseller.unwrap_or(false),
            label_data,
        }
    } else {
        let Json(body) = Json::<CreateProductJson>::from_request(req, &())
            .await
            .map_err(|e| ApiError::validation(e.to_string()))?;
        if body.image.is_empty() {
            return Err(ApiError::validation(
                "Missing required fields: name and image (array of URLs)",
            ));
        }
        NewProduct {
            name: body.name,
            description: body.description,
            category: body.category,
            sub_category: body.sub_category,
            images: body.image,
            bestseller: body.bestseller,
            label_data: resolve_label(body.label_data)?,
        }
    };

    let product = services::create(&state, new, &admin_email).await?;
    Ok((
        StatusCode::CREATED,
        Json(ProductResponse {
            success: true,
            product,
        }),
    ))
}

/// PUT /api/admin/products/:id. Same dual admission as create; images from
/// either route are appended to the existing list, never replacing it.
#[instrument(skip(state, req))]
pub async fn update_product(
    State(state): State<AppState>,
    AdminPrincipal(admin_email): AdminPrincipal,
    Path(id): Path<Uuid>,
    req: Request,
) -> Result<Json<ProductResponse>, ApiError> {
    let patch = if is_multipart(&req) {
        let mp = Multipart::from_request(req, &())
            .await
            .map_err(|e| ApiError::validation(e.to_string()))?;
        let form = parse_product_form(mp).await?;
        let label_data = form.label_data.map(LabelDataInput::resolve).transpose()?;
        let append_images = services::upload_images(&state, form.files).await?;
        ProductPatch {
            name: form.name,
            description: form.description,
            category: form.category,
            sub_category: form.sub_category,
            bestseller: form.bestseller,
            label_data,
            append_images,
        }
    } else {
        let Json(body) = Json::<UpdateProductJson>::from_request(req, &())
            .await
            .map_err(|e| ApiError::validation(e.to_string()))?;
        ProductPatch {
            name: body.name,
            description: body.description,
            category: body.category,
            sub_category: body.sub_category,
            bestseller: body.bestseller,
            label_data: body.label_data.map(LabelDataInput::resolve).transpose()?,
            append_images: body.image,
        }
    };

    let product = services::update(&state, id, patch, &admin_email).await?;
    Ok(Json(ProductResponse {
        success: true,
        product,
    }))
}

#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    AdminPrincipal(admin_email): AdminPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::remove(&state, id, &admin_email).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Product removed".into(),
    }))
}

/// GET /api/admin/products/history. Flattened recent audit entries, newest
/// first. Entries whose product has since been deleted are still returned.
#[instrument(skip(state))]
pub async fn product_history(
    State(state): State<AppState>,
    AdminPrincipal(_admin): AdminPrincipal,
) -> Result<Json<HistoryResponse>, ApiError> {
    let history = repo::recent_history(&state.db, HISTORY_LIMIT).await?;
    Ok(Json(HistoryResponse {
        success: true,
        history,
    }))
}

// --- shared form plumbing ---

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

fn resolve_label(input: Option<LabelDataInput>) -> Result<LabelData, ApiError> {
    input.map(LabelDataInput::resolve).transpose().map(Option::unwrap_or_default)
}

#[derive(Default)]
struct ProductForm {
    name: Option<String>,
    description: Option<String>,
    category: Option<String>,
    sub_category: Option<String>,
    bestseller: Option<bool>,
    label_data: Option<LabelDataInput>,
    files: Vec<UploadItem>,
}

async fn parse_product_form(mut mp: Multipart) -> Result<ProductForm, ApiError> {
    let mut form = ProductForm::default();

    while let Ok(Some(field)) = mp.next_field().await {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };

        if name == "images" || name == "images[]" {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let body = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation(e.to_string()))?;
            if !body.is_empty() {
                form.files.push(UploadItem { body, content_type });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::validation(e.to_string()))?;
        if value.is_empty() {
            continue;
        }
        match name.as_str() {
            "name" => form.name = Some(value),
            "description" => form.description = Some(value),
            "category" => form.category = Some(value),
            "subCategory" => form.sub_category = Some(value),
            "bestseller" => form.bestseller = Some(value == "true"),
            "labelData" => form.label_data = Some(LabelDataInput::Raw(value)),
            _ => {}
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_label_defaults_when_absent() {
        let label = resolve_label(None).unwrap();
        assert_eq!(label, LabelData::default());
    }

    #[test]
    fn resolve_label_rejects_malformed_text() {
        let err = resolve_label(Some(LabelDataInput::Raw("nope{".into()))).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn multipart_detection_reads_content_type() {
        let req = Request::builder()
            .header(CONTENT_TYPE, "multipart/form-data; boundary=x")
            .body(axum::body::Body::empty())
            .unwrap();
        assert!(is_multipart(&req));

        let req = Request::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(axum::body::Body::empty())
            .unwrap();
        assert!(!is_multipart(&req));
    }
}
