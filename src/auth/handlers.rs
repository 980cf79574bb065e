use axum::{
    extract::{FromRef, Multipart, State},
    routing::{get, post, put},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            AdminAuthResponse, AdminIdentity, AdminLoginRequest, AuthResponse, LoginRequest,
            ProfileResponse, RegisterRequest,
        },
        extractors::CurrentUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::{ProfilePatch, User},
    },
    error::ApiError,
    state::AppState,
    storage::ext_from_mime,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/user/register", post(register))
        .route("/api/user/login", post(login))
        .route("/api/admin/login", post(admin_login))
        .route("/api/user/profile", get(get_profile))
        .route("/api/user/update", put(update_profile))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.name.trim().is_empty() {
        return Err(ApiError::validation("Name is required"));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::conflict("User already exists"));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, payload.name.trim(), &payload.email, &hash).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_user(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(AuthResponse {
        success: true,
        token,
        user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::validation("Missing credentials"));
    }

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::unauthorized("Invalid credentials")
        })?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_user(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        success: true,
        token,
        user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<Json<AdminAuthResponse>, ApiError> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }

    let admin = &state.config.admin;
    if payload.email != admin.email || payload.password != admin.password {
        warn!(email = %payload.email, "admin login rejected");
        return Err(ApiError::unauthorized("Invalid admin credentials"));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_admin(&admin.email)?;

    info!(email = %admin.email, "admin logged in");
    Ok(Json(AdminAuthResponse {
        success: true,
        token,
        admin: AdminIdentity {
            email: admin.email.clone(),
            role: "admin",
        },
    }))
}

#[instrument(skip_all)]
pub async fn get_profile(CurrentUser(user): CurrentUser) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        success: true,
        user,
    })
}

/// PUT /api/user/update (multipart). Text fields are merged into the profile;
/// empty-string values are ignored. An optional `profilePic` file is uploaded
/// to the asset store and its URL stored.
#[instrument(skip(state, user, mp))]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut mp: Multipart,
) -> Result<Json<ProfileResponse>, ApiError> {
    let mut patch = ProfilePatch::default();

    while let Ok(Some(field)) = mp.next_field().await {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };

        if name == "profilePic" {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation(e.to_string()))?;
            if data.is_empty() {
                continue;
            }
            let ext = ext_from_mime(&content_type).unwrap_or("bin");
            let key = format!("profiles/{}/{}.{}", user.id, Uuid::new_v4(), ext);
            let url = state.storage.upload(&key, data, &content_type).await?;
            patch.profile_pic = Some(url);
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
            "name" => patch.name = Some(value),
            "age" => {
                patch.age = Some(
                    value
                        .parse::<i32>()
                        .map_err(|_| ApiError::validation("Invalid age"))?,
                )
            }
            "weight" => {
                patch.weight = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| ApiError::validation("Invalid weight"))?,
                )
            }
            "height" => {
                patch.height = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| ApiError::validation("Invalid height"))?,
                )
            }
            _ => {}
        }
    }

    let updated = User::update_profile(&state.db, user.id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!(user_id = %updated.id, "profile updated");
    Ok(Json(ProfileResponse {
        success: true,
        user: updated,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("@example.com"));
    }
}
