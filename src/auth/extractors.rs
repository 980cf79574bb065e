use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::{
    auth::{
        jwt::{Claims, JwtKeys, TokenKind},
        repo::User,
    },
    error::ApiError,
    state::AppState,
};

/// Resolved regular-user principal. Verifies the bearer token and loads the
/// user row; a token whose subject no longer exists is rejected.
pub struct CurrentUser(pub User);

/// Resolved admin principal (the configured admin email). Stateless: the
/// claim's email must exactly equal the configured admin identity. A valid
/// token of the wrong kind or with a different email is 403, not 401.
pub struct AdminPrincipal(pub String);

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Unauthorized: No token provided"))?;

    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Unauthorized: No token provided"))
}

fn verify_bearer(keys: &JwtKeys, parts: &Parts) -> Result<Claims, ApiError> {
    let token = bearer_token(parts)?;
    keys.verify(token).map_err(|e| {
        warn!(error = %e, "token rejected");
        ApiError::unauthorized("Invalid or expired token")
    })
}

pub(crate) fn resolve_admin(claims: &Claims, admin_email: &str) -> Result<String, ApiError> {
    if claims.kind != TokenKind::Admin {
        return Err(ApiError::Forbidden);
    }
    match claims.email.as_deref() {
        Some(email) if email == admin_email => Ok(email.to_string()),
        _ => Err(ApiError::Forbidden),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let keys = JwtKeys::from_ref(&state);
        let claims = verify_bearer(&keys, parts)?;

        if claims.kind != TokenKind::User {
            return Err(ApiError::unauthorized("User token required"));
        }
        let user_id = claims
            .sub
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

        let user = User::find_by_id(&state.db, user_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Unauthorized: User not found"))?;

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminPrincipal
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let keys = JwtKeys::from_ref(&state);
        let claims = verify_bearer(&keys, parts)?;
        let email = resolve_admin(&claims, &state.config.admin.email)?;
        Ok(AdminPrincipal(email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::FromRef;
    use uuid::Uuid;

    fn claims_of(kind: TokenKind, sub: Option<Uuid>, email: Option<&str>) -> Claims {
        let now = time::OffsetDateTime::now_utc().unix_timestamp() as usize;
        Claims {
            sub,
            email: email.map(|e| e.to_string()),
            iat: now,
            exp: now + 3600,
            kind,
        }
    }

    #[test]
    fn resolve_admin_accepts_matching_email() {
        let claims = claims_of(TokenKind::Admin, None, Some("admin@nutrimart.test"));
        let email = resolve_admin(&claims, "admin@nutrimart.test").expect("admin resolves");
        assert_eq!(email, "admin@nutrimart.test");
    }

    #[test]
    fn resolve_admin_rejects_user_token_with_forbidden() {
        let claims = claims_of(TokenKind::User, Some(Uuid::new_v4()), None);
        let err = resolve_admin(&claims, "admin@nutrimart.test").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
    }

    #[test]
    fn resolve_admin_rejects_mismatched_email_with_forbidden() {
        let claims = claims_of(TokenKind::Admin, None, Some("intruder@example.com"));
        let err = resolve_admin(&claims, "admin@nutrimart.test").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
    }

    #[test]
    fn resolve_admin_rejects_admin_token_without_email() {
        let claims = claims_of(TokenKind::Admin, None, None);
        let err = resolve_admin(&claims, "admin@nutrimart.test").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let state = AppState::fake();
        let req = axum::http::Request::builder()
            .uri("/api/admin/products")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let err = AdminPrincipal::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn garbage_token_is_unauthorized() {
        let state = AppState::fake();
        let req = axum::http::Request::builder()
            .uri("/api/admin/products")
            .header(axum::http::header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let err = AdminPrincipal::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn well_formed_user_token_is_forbidden_on_admin_gate() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_user(Uuid::new_v4()).expect("sign user");
        let req = axum::http::Request::builder()
            .uri("/api/admin/products")
            .header(
                axum::http::header::AUTHORIZATION,
                format!("Bearer {}", token),
            )
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let err = AdminPrincipal::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::Forbidden));
    }

    #[tokio::test]
    async fn admin_token_resolves_principal() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys
            .sign_admin(&state.config.admin.email)
            .expect("sign admin");
        let req = axum::http::Request::builder()
            .uri("/api/admin/products")
            .header(
                axum::http::header::AUTHORIZATION,
                format!("Bearer {}", token),
            )
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let AdminPrincipal(email) = AdminPrincipal::from_request_parts(&mut parts, &state)
            .await
            .expect("should resolve");
        assert_eq!(email, state.config.admin.email);
    }
}
