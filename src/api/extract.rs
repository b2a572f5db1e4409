//! Header extractors shared by the order and ledger handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::{RequestToken, UserId};
use crate::error::BookingError;
use crate::headers;

/// Caller identity from the `X-User-Id` header.
///
/// Missing header ⇒ 401, non-integer value ⇒ 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = BookingError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(headers::USER_ID)
            .ok_or(BookingError::Unauthorized)?;
        let raw = value.to_str().map_err(|_| {
            BookingError::InvalidRequest(format!("{} is not valid text", headers::USER_ID))
        })?;
        let id = raw.trim().parse::<i64>().map_err(|_| {
            BookingError::InvalidRequest(format!("{} must be an integer, got `{raw}`", headers::USER_ID))
        })?;
        Ok(Self(UserId::new(id)))
    }
}

/// Optional ledger token from the `X-Request-Id` header. Blank counts as
/// absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdHeader(pub Option<RequestToken>);

impl RequestIdHeader {
    /// The token, or [`BookingError::MissingRequestId`].
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::MissingRequestId`] if the header was absent.
    pub fn required(self) -> Result<RequestToken, BookingError> {
        self.0.ok_or(BookingError::MissingRequestId)
    }
}

impl<S> FromRequestParts<S> for RequestIdHeader
where
    S: Send + Sync,
{
    type Rejection = BookingError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(headers::REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .and_then(RequestToken::parse);
        Ok(Self(token))
    }
}
