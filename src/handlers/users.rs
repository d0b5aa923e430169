use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::StatusCode,
};

use crate::{
    auth::AuthUser,
    error::{AppError, ErrorBody},
    models::{
        AvatarResponse, EmailRequest, LoginRequest, LoginResponse, MessageResponse,
        RegisterRequest, RegisterResponse, SubscriptionRequest, SubscriptionResponse,
        UserSummary,
    },
    services::UsersService,
    validation::ValidJson,
};

/// Multipart field carrying the avatar image.
pub const AVATAR_FIELD: &str = "avatarURL";

/// register_user
///
/// [Public Route] Creates an unverified account and emails the verification link.
/// Only the public profile is echoed back.
#[utoipa::path(
    post,
    path = "/users/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = RegisterResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 409, description = "Email in use", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(users): State<UsersService>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let user = users.register(payload).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { user })))
}

#[utoipa::path(
    get,
    path = "/users/verify/{verification_token}",
    params(("verification_token" = String, Path, description = "Token from the verification email")),
    responses(
        (status = 200, description = "Verified", body = MessageResponse),
        (status = 404, description = "Unknown or used token", body = ErrorBody)
    )
)]
pub async fn verify_email(
    State(users): State<UsersService>,
    Path(verification_token): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    users.verify(&verification_token).await?;
    Ok(Json(MessageResponse::new("Verification successful")))
}

/// resend_verification
///
/// [Public Route] Mails the existing verification link again while the account
/// is still unverified.
#[utoipa::path(
    post,
    path = "/users/verify",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Sent", body = MessageResponse),
        (status = 400, description = "Already verified or invalid body", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
pub async fn resend_verification(
    State(users): State<UsersService>,
    ValidJson(payload): ValidJson<EmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = payload
        .email
        .ok_or_else(|| AppError::BadRequest("missing required field email".to_string()))?;
    users.resend_verification(&email).await?;
    Ok(Json(MessageResponse::new("Verification email sent")))
}

#[utoipa::path(
    post,
    path = "/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Wrong credentials or unverified", body = ErrorBody)
    )
)]
pub async fn login_user(
    State(users): State<UsersService>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    Ok(Json(users.login(payload).await?))
}

/// logout_user
///
/// [Authenticated Route] Clears the stored session, which revokes the bearer
/// token that made this request.
#[utoipa::path(
    post,
    path = "/users/logout",
    responses(
        (status = 204, description = "Logged out"),
        (status = 401, description = "Not authorized", body = ErrorBody)
    )
)]
pub async fn logout_user(
    AuthUser(user): AuthUser,
    State(users): State<UsersService>,
) -> Result<StatusCode, AppError> {
    users.logout(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/users/current",
    responses(
        (status = 200, description = "Current user", body = UserSummary),
        (status = 401, description = "Not authorized", body = ErrorBody)
    )
)]
pub async fn current_user(AuthUser(user): AuthUser) -> Json<UserSummary> {
    Json(UserSummary::from(&user))
}

#[utoipa::path(
    patch,
    path = "/users",
    request_body = SubscriptionRequest,
    responses(
        (status = 200, description = "Changed", body = SubscriptionResponse),
        (status = 400, description = "Unknown tier", body = ErrorBody)
    )
)]
pub async fn change_subscription(
    AuthUser(user): AuthUser,
    State(users): State<UsersService>,
    ValidJson(payload): ValidJson<SubscriptionRequest>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    let subscription = users
        .change_subscription(&user, payload.subscription)
        .await?;
    Ok(Json(SubscriptionResponse {
        subscription,
        message: "Subscription successfully changed".to_string(),
    }))
}

/// change_avatar
///
/// [Authenticated Route] Accepts the image in the `avatarURL` multipart field.
/// Other fields are skipped. No file, or an empty one, is a 400.
#[utoipa::path(
    patch,
    path = "/users/avatars",
    request_body(
        content = String,
        content_type = "multipart/form-data",
        description = "Image file in the `avatarURL` field"
    ),
    responses(
        (status = 200, description = "Avatar replaced", body = AvatarResponse),
        (status = 400, description = "No file or not an image", body = ErrorBody)
    )
)]
pub async fn change_avatar(
    AuthUser(user): AuthUser,
    State(users): State<UsersService>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AvatarResponse>, AppError> {
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_owned);
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            break;
        }

        let avatar_url = users.change_avatar(&user, file_name, bytes.to_vec()).await?;
        return Ok(Json(AvatarResponse { avatar_url }));
    }

    Err(AppError::BadRequest("File not provided".to_string()))
}
