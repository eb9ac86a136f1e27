//! Bearer tokens identifying customers.
//!
//! Login and registration live in a separate service that shares
//! `AUTH_TOKEN_SECRET` with this one. A token reads
//! `v1.{customer_id}.{expires_at_unix}.{hex hmac-sha256}`.

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::models::CustomerId;
use crate::state::AppState;
use crate::utils::error::AppError;

const TOKEN_VERSION: &str = "v1";
const SIGNING_PREFIX: &str = "boxoffice";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization header is missing")]
    MissingHeader,

    #[error("Token is missing")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("token signing key rejected")]
    SigningKey,
}

pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn issue(&self, customer_id: CustomerId, now: DateTime<Utc>) -> Result<String, AuthError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = now.timestamp().saturating_add(ttl);
        let signature = hex::encode(self.mac(customer_id, expires_at)?.finalize().into_bytes());
        Ok(format!("{TOKEN_VERSION}.{customer_id}.{expires_at}.{signature}"))
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<CustomerId, AuthError> {
        let mut parts = token.split('.');
        let (Some(version), Some(id), Some(expires_at), Some(signature), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(AuthError::InvalidToken);
        };
        if version != TOKEN_VERSION {
            return Err(AuthError::InvalidToken);
        }

        let customer_id: CustomerId = id.parse().map_err(|_| AuthError::InvalidToken)?;
        let expires_at: i64 = expires_at.parse().map_err(|_| AuthError::InvalidToken)?;
        let signature = hex::decode(signature).map_err(|_| AuthError::InvalidToken)?;

        self.mac(customer_id, expires_at)?
            .verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        if customer_id <= 0 || now.timestamp() >= expires_at {
            return Err(AuthError::InvalidToken);
        }
        Ok(customer_id)
    }

    fn mac(&self, customer_id: CustomerId, expires_at: i64) -> Result<HmacSha256, AuthError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::SigningKey)?;
        let payload = format!("{SIGNING_PREFIX}|{TOKEN_VERSION}|{customer_id}|{expires_at}");
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}

/// The customer behind a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedCustomer {
    pub id: CustomerId,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedCustomer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidToken)?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let id = state.tokens.verify(token, state.clock.now())?;
        Ok(Self { id })
    }
}
