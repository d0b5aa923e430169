use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use thiserror::Error;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::validation::{require_any_field, validate_phone};

// --- Stored Documents ---

/// User
///
/// The account record. `password` only ever holds a bcrypt hash. `token` is the
/// single active bearer session (`None` once logged out) and
/// `verification_token` is cleared when the email address is confirmed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    #[sqlx(try_from = "String")]
    pub subscription: Subscription,
    pub token: Option<String>,
    #[serde(rename = "avatarURL")]
    pub avatar_url: String,
    pub verify: bool,
    pub verification_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Subscription
///
/// Plan tier attribute on a user. Purely informational, no billing behind it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Subscription {
    #[default]
    Starter,
    Pro,
    Business,
}

#[derive(Debug, Error)]
#[error("unknown subscription tier: {0}")]
pub struct UnknownSubscription(pub String);

impl Subscription {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Business => "business",
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subscription {
    type Err = UnknownSubscription;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starter" => Ok(Self::Starter),
            "pro" => Ok(Self::Pro),
            "business" => Ok(Self::Business),
            other => Err(UnknownSubscription(other.to_string())),
        }
    }
}

impl TryFrom<String> for Subscription {
    type Error = UnknownSubscription;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Contact
///
/// A personal contact record. `owner` is always stamped server-side from the
/// authenticated requester.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema, TS, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub favorite: bool,
    pub owner: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// NewUser
///
/// Everything the service has derived for a registration, ready to persist.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub subscription: Subscription,
    pub avatar_url: String,
    pub verification_token: String,
}

/// ContactFilter
///
/// Owner-independent part of a list query, already translated to skip/limit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContactFilter {
    pub favorite: Option<bool>,
    pub skip: i64,
    pub limit: i64,
}

// --- Request Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Validate)]
#[ts(export)]
pub struct RegisterRequest {
    #[schema(example = "alice@example.com")]
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, max = 64, message = "password length must be between 6 and 64 characters"))]
    pub password: String,
    #[serde(default)]
    pub subscription: Option<Subscription>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Validate)]
#[ts(export)]
pub struct LoginRequest {
    #[schema(example = "alice@example.com")]
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, max = 64, message = "password length must be between 6 and 64 characters"))]
    pub password: String,
}

/// Body of `POST /users/verify`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Validate)]
#[ts(export)]
pub struct EmailRequest {
    #[serde(default)]
    #[validate(required(message = "missing required field email"), email(message = "email must be a valid email address"))]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Validate)]
#[ts(export)]
pub struct SubscriptionRequest {
    pub subscription: Subscription,
}

/// CreateContactRequest
///
/// Unknown fields, including any `owner`, are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default, Validate)]
#[ts(export)]
pub struct CreateContactRequest {
    #[validate(length(min = 2, max = 50, message = "name length must be between 2 and 50 characters"))]
    pub name: String,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[serde(default)]
    pub favorite: Option<bool>,
}

/// UpdateContactRequest
///
/// Partial update for `PUT /contacts/{id}`. Only provided fields change.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "require_any_field"))]
#[ts(export)]
pub struct UpdateContactRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 2, max = 50, message = "name length must be between 2 and 50 characters"))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "email must be a valid email address"))]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
}

impl UpdateContactRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none() && self.favorite.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Validate)]
#[serde(deny_unknown_fields)]
#[ts(export)]
pub struct FavoriteRequest {
    pub favorite: bool,
}

/// ContactQuery
///
/// Query string of `GET /contacts`. `favorite` is compared against the literal
/// `"true"`, any other value filters for non-favorites.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ContactQuery {
    /// 1-based page number, default 1.
    pub page: Option<i64>,
    /// Page size, default 5.
    pub limit: Option<i64>,
    pub favorite: Option<String>,
}

// --- Responses ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, PartialEq)]
#[ts(export)]
pub struct UserSummary {
    pub email: String,
    pub subscription: Subscription,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            subscription: user.subscription,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct RegisterResponse {
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct SubscriptionResponse {
    pub subscription: Subscription,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct AvatarResponse {
    #[serde(rename = "avatarURL")]
    pub avatar_url: String,
}

/// ContactPage
///
/// One page of the requester's contacts. `total` counts every matching contact,
/// ignoring pagination.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ContactPage {
    pub total: i64,
    pub per_page: i64,
    pub current_page: i64,
    pub contacts: Vec<Contact>,
}
