//! Authorization for the cron trigger.
//!
//! A scheduled invocation is accepted when it presents the shared secret as
//! `Authorization: Bearer <secret>` or `x-cron-secret: <secret>`, or, when
//! `CRON_TRUST_PLATFORM_HEADER` is on, when it carries the hosting
//! platform's `x-vercel-cron` header.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use subtle::ConstantTimeEq;

use printshop_common::error::AppError;

use crate::state::AppState;

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";
pub const PLATFORM_CRON_HEADER: &str = "x-vercel-cron";

/// Marker extractor for an authorized cron invocation.
#[derive(Debug, Clone, Copy)]
pub struct CronAuth;

/// Whether `headers` authorize a cron invocation.
pub fn is_authorized(headers: &HeaderMap, secret: Option<&str>, trust_platform_header: bool) -> bool {
    if trust_platform_header && headers.contains_key(PLATFORM_CRON_HEADER) {
        return true;
    }

    let Some(secret) = secret else {
        return false;
    };

    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let shared = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    [bearer, shared]
        .into_iter()
        .flatten()
        .any(|presented| bool::from(presented.as_bytes().ct_eq(secret.as_bytes())))
}

impl FromRequestParts<AppState> for CronAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if is_authorized(
            &parts.headers,
            state.config.cron_secret.as_deref(),
            state.config.cron_trust_platform_header,
        ) {
            Ok(CronAuth)
        } else {
            tracing::warn!("Rejected unauthorized cron invocation");
            Err(AppError::Auth("Unauthorized cron invocation".to_string()))
        }
    }
}
