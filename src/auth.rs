use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::AppError, models::User, repository::RepositoryState};

/// Bearer sessions last eight hours.
pub const TOKEN_TTL_HOURS: i64 = 8;

/// Claims
///
/// Payload signed into every bearer token. `jti` keeps two tokens issued to the
/// same user in the same second distinct, so a new login always replaces the
/// previous session.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The user's id.
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    pub jti: Uuid,
}

/// TokenIssuer
///
/// Signs and verifies HS256 bearer tokens with the configured secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(TOKEN_TTL_HOURS),
        }
    }

    /// Overrides the token lifetime. Mostly useful for exercising expiry.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            iat: timestamp(now),
            exp: timestamp(now + self.ttl),
            jti: Uuid::new_v4(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))
    }

    /// Checks signature and expiry. Any failure is a plain 401.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected bearer token");
                AppError::Unauthorized(None)
            })
    }
}

fn timestamp(at: chrono::DateTime<Utc>) -> usize {
    usize::try_from(at.timestamp()).unwrap_or_default()
}

// --- Password Hasher ---

/// One-way bcrypt hash, computed on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(format!("failed to hash password: {e}")))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(format!("failed to verify password: {e}")))
}

// --- Authentication ---

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthorized(None))
}

/// authenticate
///
/// The single gate for bearer credentials: the token must carry a valid
/// signature and expiry, name an existing user, and still be that user's stored
/// session token. The last check is what makes logout and re-login revoke
/// earlier tokens.
pub async fn authenticate(
    repo: &RepositoryState,
    tokens: &TokenIssuer,
    token: &str,
) -> Result<User, AppError> {
    let claims = tokens.verify(token)?;

    let user = repo
        .find_user_by_id(claims.sub)
        .await?
        .ok_or(AppError::Unauthorized(None))?;

    if user.token.as_deref() != Some(token) {
        tracing::debug!(user_id = %user.id, "bearer token is not the active session");
        return Err(AppError::Unauthorized(None));
    }

    Ok(user)
}

/// AuthUser
///
/// The authenticated requester. Placed in the request extensions by
/// [`require_auth`]; when a handler is mounted without that layer the extractor
/// runs the full authentication itself.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenIssuer: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let tokens = TokenIssuer::from_ref(state);
        let token = bearer_token(&parts.headers)?;

        authenticate(&repo, &tokens, token).await.map(AuthUser)
    }
}

/// require_auth
///
/// Route layer for every authenticated route: rejects with 401 before the
/// handler runs, otherwise attaches the loaded [`AuthUser`] to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?.to_owned();
    let user = authenticate(&state.repo, &state.tokens, &token).await?;

    request.extensions_mut().insert(AuthUser(user));
    Ok(next.run(request).await)
}
