// ABOUTME: Request identity for API handlers
// ABOUTME: Resolves the caller's account from trusted headers and checks internal bearer secrets

use agentbay_core::secrets_match;
use agentbay_storage::Account;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use crate::error::AppError;
use crate::AppState;

/// External identity set by the identity provider in front of this service
pub const ACCOUNT_ID_HEADER: &str = "x-account-id";
pub const ACCOUNT_EMAIL_HEADER: &str = "x-account-email";

/// The calling account, created on first sight
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Account);

impl FromRequestParts<AppState> for CurrentAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let external_id = header_value(&parts.headers, ACCOUNT_ID_HEADER)
            .ok_or(AppError::Unauthenticated)?
            .to_string();
        let email = header_value(&parts.headers, ACCOUNT_EMAIL_HEADER).map(str::to_string);

        let account = state
            .account_storage
            .get_or_create(&external_id, email.as_deref())
            .await?;
        Ok(Self(account))
    }
}

/// Marker extractor for endpoints called by other services with the shared secret
#[derive(Debug, Clone, Copy)]
pub struct InternalCaller;

impl FromRequestParts<AppState> for InternalCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(&parts.headers) {
            Some(token) if secrets_match(token, state.internal_secret()) => Ok(Self),
            _ => {
                warn!(path = %parts.uri.path(), "Rejected internal call with invalid credentials");
                Err(AppError::Unauthorized)
            }
        }
    }
}

/// Token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
