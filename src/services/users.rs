use axum::extract::FromRef;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{self, TokenIssuer},
    avatar::{self, TempUpload},
    config::AppConfig,
    error::AppError,
    mailer::{self, MailerState},
    models::{
        LoginRequest, LoginResponse, NewUser, RegisterRequest, Subscription, User, UserSummary,
    },
    repository::{EMAIL_IN_USE, RepositoryState},
    storage::{self, StorageState},
    validation::normalize_email,
};

const WRONG_CREDENTIALS: &str = "Email or password is wrong";
const DEFAULT_AVATAR_BASE: &str = "https://api.dicebear.com/7.x/identicon/svg?seed=";

/// Deterministic placeholder avatar for a (normalised) email address.
pub fn default_avatar_url(email: &str) -> String {
    format!(
        "{DEFAULT_AVATAR_BASE}{}",
        urlencoding::encode(&email.to_lowercase())
    )
}

fn new_verification_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// UsersService
///
/// Registration, email verification, sessions and profile changes. Holds the
/// collaborators those flows call out to: the store, the token issuer, the
/// email sender and the avatar file store.
#[derive(Clone)]
pub struct UsersService {
    repo: RepositoryState,
    tokens: TokenIssuer,
    mailer: MailerState,
    storage: StorageState,
    config: AppConfig,
}

impl FromRef<AppState> for UsersService {
    fn from_ref(state: &AppState) -> Self {
        Self {
            repo: state.repo.clone(),
            tokens: state.tokens.clone(),
            mailer: state.mailer.clone(),
            storage: state.storage.clone(),
            config: state.config.clone(),
        }
    }
}

impl UsersService {
    /// register
    ///
    /// Creates an unverified account and mails its verification link. The
    /// early lookup gives the common duplicate case a cheap answer, while two
    /// racing registrations are settled by the store's own uniqueness check.
    /// A failed email is logged and the account is kept.
    pub async fn register(&self, req: RegisterRequest) -> Result<UserSummary, AppError> {
        let email = normalize_email(&req.email);

        if self.repo.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(EMAIL_IN_USE.to_string()));
        }

        let password_hash = auth::hash_password(req.password, self.config.bcrypt_cost).await?;
        let verification_token = new_verification_token();

        let user = self
            .repo
            .create_user(NewUser {
                avatar_url: default_avatar_url(&email),
                email,
                password_hash,
                subscription: req.subscription.unwrap_or_default(),
                verification_token: verification_token.clone(),
            })
            .await?;

        tracing::info!(user_id = %user.id, "user registered");
        self.send_verification(&user.email, &verification_token).await;

        Ok(UserSummary::from(&user))
    }

    /// Confirms the address holding `verification_token`. The token is single-use.
    pub async fn verify(&self, verification_token: &str) -> Result<(), AppError> {
        let user = self
            .repo
            .verify_email(verification_token)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        tracing::info!(user_id = %user.id, "email verified");
        Ok(())
    }

    /// Sends the existing verification link again.
    pub async fn resend_verification(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        let user = self
            .repo
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let token = match (&user.verification_token, user.verify) {
            (Some(token), false) => token.clone(),
            _ => {
                return Err(AppError::BadRequest(
                    "Verification has already been passed".to_string(),
                ));
            }
        };

        self.send_verification(&user.email, &token).await;
        Ok(())
    }

    async fn send_verification(&self, to: &str, verification_token: &str) {
        let message = mailer::verification_email(to, &self.config.base_url, verification_token);
        if let Err(e) = self.mailer.send(message).await {
            tracing::error!(to = %to, error = %e, "failed to send verification email");
        }
    }

    /// login
    ///
    /// Unknown email and wrong password share one message. An unverified
    /// account gets the bare rejection instead.
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        let email = normalize_email(&req.email);
        let user = self
            .repo
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::unauthorized(WRONG_CREDENTIALS))?;

        if !auth::verify_password(req.password, user.password.clone()).await? {
            return Err(AppError::unauthorized(WRONG_CREDENTIALS));
        }

        if !user.verify {
            tracing::debug!(user_id = %user.id, "login refused, email not verified");
            return Err(AppError::Unauthorized(None));
        }

        let token = self.tokens.issue(user.id)?;
        let user = self
            .repo
            .set_session_token(user.id, Some(token.clone()))
            .await?
            .ok_or(AppError::Unauthorized(None))?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(LoginResponse {
            token,
            user: UserSummary::from(&user),
        })
    }

    pub async fn logout(&self, user: &User) -> Result<(), AppError> {
        self.repo.set_session_token(user.id, None).await?;
        tracing::info!(user_id = %user.id, "user logged out");
        Ok(())
    }

    pub async fn change_subscription(
        &self,
        user: &User,
        subscription: Subscription,
    ) -> Result<Subscription, AppError> {
        let updated = self
            .repo
            .set_subscription(user.id, subscription)
            .await?
            .ok_or(AppError::Unauthorized(None))?;
        Ok(updated.subscription)
    }

    /// change_avatar
    ///
    /// Parks the upload in the scratch directory, resizes it to the avatar
    /// square, publishes it under `<userId>_<name>` and records the new URL.
    /// The scratch file is removed on every path, and the previously published
    /// avatar once the new URL is recorded.
    pub async fn change_avatar(
        &self,
        user: &User,
        original_name: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<String, AppError> {
        let upload = TempUpload::write(&self.config.tmp_dir, &bytes).await?;
        let processed = avatar::process_upload(&upload).await;
        upload.remove().await;
        let image = processed?;

        let file_name = avatar::avatar_file_name(user.id, original_name.as_deref(), image.extension);
        let url = self
            .storage
            .put_avatar(
                &file_name,
                image.bytes,
                storage::content_type_for(image.extension),
            )
            .await?;

        self.repo
            .set_avatar_url(user.id, &url)
            .await?
            .ok_or(AppError::Unauthorized(None))?;

        if user.avatar_url != url {
            if let Err(e) = self.storage.remove_avatar(&user.avatar_url).await {
                tracing::warn!(
                    user_id = %user.id,
                    previous = %user.avatar_url,
                    error = %e,
                    "failed to remove previous avatar"
                );
            }
        }

        tracing::info!(user_id = %user.id, avatar = %url, "avatar updated");
        Ok(url)
    }
}
