use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, state::AppState};

/// Which principal a token was minted for.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    User,
    Admin,
}

/// Self-contained claim set. User tokens carry `sub`, admin tokens carry
/// `email`; expiry is the only invalidation mechanism, there is no blocklist.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub iat: usize,
    pub exp: usize,
    pub kind: TokenKind,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig { secret, ttl_days } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_secs((ttl_days as u64) * 24 * 60 * 60),
        }
    }
}

impl JwtKeys {
    fn sign(&self, claims: &Claims) -> anyhow::Result<String> {
        let token = encode(&Header::default(), claims, &self.encoding)?;
        debug!(kind = ?claims.kind, "jwt signed");
        Ok(token)
    }

    fn stamp(&self) -> (usize, usize) {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        (now.unix_timestamp() as usize, exp.unix_timestamp() as usize)
    }

    pub fn sign_user(&self, user_id: Uuid) -> anyhow::Result<String> {
        let (iat, exp) = self.stamp();
        self.sign(&Claims {
            sub: Some(user_id),
            email: None,
            iat,
            exp,
            kind: TokenKind::User,
        })
    }

    pub fn sign_admin(&self, email: &str) -> anyhow::Result<String> {
        let (iat, exp) = self.stamp();
        self.sign(&Claims {
            sub: None,
            email: Some(email.to_string()),
            iat,
            exp,
            kind: TokenKind::Admin,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            },
        )?;
        debug!(kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_user_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_user(user_id).expect("sign user");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, Some(user_id));
        assert_eq!(claims.email, None);
        assert_eq!(claims.kind, TokenKind::User);
    }

    #[tokio::test]
    async fn sign_and_verify_admin_token() {
        let keys = make_keys();
        let token = keys.sign_admin("admin@nutrimart.test").expect("sign admin");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, None);
        assert_eq!(claims.email.as_deref(), Some("admin@nutrimart.test"));
        assert_eq!(claims.kind, TokenKind::Admin);
    }

    #[tokio::test]
    async fn token_lives_seven_days() {
        let keys = make_keys();
        let token = keys.sign_user(Uuid::new_v4()).expect("sign user");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys();
        // Well-formed in every way except the timestamps: minted 8 days ago.
        let eight_days_ago = OffsetDateTime::now_utc() - TimeDuration::days(8);
        let claims = Claims {
            sub: Some(Uuid::new_v4()),
            email: None,
            iat: (eight_days_ago - TimeDuration::days(7)).unix_timestamp() as usize,
            exp: eight_days_ago.unix_timestamp() as usize,
            kind: TokenKind::User,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).expect("encode");
        assert_eq!(keys.verify(&token), Err(TokenError::Expired));
    }

    #[tokio::test]
    async fn verify_rejects_tampered_signature() {
        let keys = make_keys();
        let token = keys.sign_user(Uuid::new_v4()).expect("sign user");
        let mut forged = token;
        forged.push('x');
        assert_eq!(keys.verify(&forged), Err(TokenError::Invalid));
    }

    #[tokio::test]
    async fn verify_rejects_token_from_other_secret() {
        let keys = make_keys();
        let other = JwtKeys {
            encoding: EncodingKey::from_secret(b"other-secret"),
            decoding: DecodingKey::from_secret(b"other-secret"),
            ttl: keys.ttl,
        };
        let token = other.sign_user(Uuid::new_v4()).expect("sign user");
        assert_eq!(keys.verify(&token), Err(TokenError::Invalid));
    }
}
