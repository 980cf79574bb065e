use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::products::repo::{HistoryEntry, LabelData, Product};

/// Label payload as it arrives from clients: either already-structured JSON
/// or a serialized JSON string (the multipart path always sends text).
/// Resolved exactly once at the input boundary, before any store write.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LabelDataInput {
    Raw(String),
    Structured(LabelData),
}

impl LabelDataInput {
    pub fn resolve(self) -> Result<LabelData, ApiError> {
        match self {
            LabelDataInput::Raw(text) => serde_json::from_str(&text)
                .map_err(|_| ApiError::validation("Invalid labelData format")),
            LabelDataInput::Structured(label) => Ok(label),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductJson {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub sub_category: String,
    /// Pre-uploaded asset URLs; required and non-empty on this route.
    #[serde(default)]
    pub image: Vec<String>,
    #[serde(default)]
    pub bestseller: bool,
    pub label_data: Option<LabelDataInput>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductJson {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    /// Additional asset URLs, appended after the existing images.
    #[serde(default)]
    pub image: Vec<String>,
    pub bestseller: Option<bool>,
    pub label_data: Option<LabelDataInput>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub success: bool,
    pub product: Product,
}

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub success: bool,
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub history: Vec<HistoryEntry>,
}
