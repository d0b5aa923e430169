//! Request body schemas.
//!
//! Payloads derive [`validator::Validate`] in `models`; handlers receive them
//! through [`ValidJson`], so a body that fails to parse or to validate never
//! reaches a controller.

use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    error::AppError,
    models::{ContactFilter, ContactQuery, UpdateContactRequest},
};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 5;

const PHONE_MIN: usize = 5;
const PHONE_MAX: usize = 20;

/// ValidJson
///
/// JSON body extractor that runs the payload's schema before the handler.
/// Parse errors and schema violations both reject with `400 {message}`.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(payload) = Json::<T>::from_request(req, state).await?;
        payload.validate().map_err(|errors| bad_request(first_message(&errors)))?;
        Ok(Self(payload))
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::BadRequest(message.into())
}

/// Picks one message out of a validation report. Fields are visited in name
/// order so the same body always produces the same message; struct-level
/// errors (`__all__`) sort first.
pub fn first_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .find_map(|(field, errors)| {
            errors.first().map(|error| match &error.message {
                Some(message) => message.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .unwrap_or_else(|| "Invalid request body".to_string())
}

/// Digits plus the usual separators, with at least five actual digits.
pub fn is_valid_phone(phone: &str) -> bool {
    let len = phone.chars().count();
    if !(PHONE_MIN..=PHONE_MAX).contains(&len) {
        return false;
    }
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
    allowed && phone.chars().filter(char::is_ascii_digit).count() >= 5
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if is_valid_phone(phone) {
        Ok(())
    } else {
        Err(ValidationError::new("phone")
            .with_message(Cow::Borrowed("phone must be a valid phone number")))
    }
}

pub fn require_any_field(changes: &UpdateContactRequest) -> Result<(), ValidationError> {
    if changes.is_empty() {
        Err(ValidationError::new("empty")
            .with_message(Cow::Borrowed("Body must have at least one field")))
    } else {
        Ok(())
    }
}

/// Lowercased, trimmed form under which emails are stored and looked up.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Parses a path id; anything that is not a well-formed id is a client error.
pub fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| bad_request(format!("{raw} is not a valid id")))
}

impl ContactQuery {
    /// Resolves defaults and turns page/limit into a store filter.
    /// Returns the filter together with the effective page and page size.
    pub fn into_filter(self) -> Result<(ContactFilter, i64, i64), AppError> {
        let page = self.page.unwrap_or(DEFAULT_PAGE);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if page < 1 {
            return Err(bad_request("page must be a positive integer"));
        }
        if limit < 1 {
            return Err(bad_request("limit must be a positive integer"));
        }

        let filter = ContactFilter {
            favorite: self.favorite.map(|value| value == "true"),
            skip: (page - 1).saturating_mul(limit),
            limit,
        };
        Ok((filter, page, limit))
    }
}
