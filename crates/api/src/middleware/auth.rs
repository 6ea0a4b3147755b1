//! Admin JWT authentication.
//!
//! Provides JWT encoding/decoding plus an `AdminUser` Axum extractor that
//! validates the `Authorization: Bearer <token>` header on admin routes.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use printshop_common::error::AppError;

use crate::state::AppState;

/// Role claim required on admin routes.
pub const ADMIN_ROLE: &str = "admin";

/// JWT claims stored in the token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the staff member's email
    pub sub: String,
    /// Role: must be `admin` for back-office routes
    pub role: String,
    /// Expiration time (UNIX timestamp)
    pub exp: i64,
    /// Issued at (UNIX timestamp)
    pub iat: i64,
}

/// Authenticated staff member extracted from an admin JWT.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub email: String,
    pub claims: Claims,
}

/// Encode a JWT token for a staff member.
pub fn encode_jwt(
    subject: &str,
    role: &str,
    secret: &str,
    expiry_hours: u64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiry_hours as i64);

    let claims = Claims {
        sub: subject.to_string(),
        role: role.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Auth(format!("Failed to encode JWT: {}", e)))?;

    Ok(token)
}

/// Decode and validate a JWT token.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

    Ok(token_data.claims)
}

fn admin_from_header(auth_header: Option<&str>, secret: &str) -> Result<AdminUser, AppError> {
    let token = auth_header
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Auth("Missing or invalid Authorization header. Use 'Bearer <JWT>'".to_string())
        })?;

    let claims = decode_jwt(token, secret)?;
    if claims.role != ADMIN_ROLE {
        return Err(AppError::Auth("Admin role required".to_string()));
    }

    Ok(AdminUser {
        email: claims.sub.clone(),
        claims,
    })
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok());

        admin_from_header(auth_header, &state.config.jwt_secret)
    }
}
