use axum::{http::StatusCode, response::IntoResponse};
use contacts_api::{
    avatar::{self, AvatarError},
    error::{AppError, ErrorBody},
    repository::RepositoryError,
    storage::StorageError,
};

async fn render(err: AppError) -> (StatusCode, String) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    (status, body.message)
}

#[tokio::test]
async fn test_taxonomy_maps_to_status_and_message() {
    let cases = [
        (AppError::BadRequest("bad".into()), StatusCode::BAD_REQUEST, "bad"),
        (
            AppError::unauthorized("Email or password is wrong"),
            StatusCode::UNAUTHORIZED,
            "Email or password is wrong",
        ),
        (AppError::Unauthorized(None), StatusCode::UNAUTHORIZED, "Not authorized"),
        (AppError::not_found(), StatusCode::NOT_FOUND, "Not found"),
        (AppError::Conflict("Email in use".into()), StatusCode::CONFLICT, "Email in use"),
    ];

    for (err, status, message) in cases {
        assert_eq!(render(err).await, (status, message.to_string()));
    }
}

#[tokio::test]
async fn test_internal_details_are_not_leaked() {
    let (status, message) = render(AppError::Internal("connection refused on 10.0.0.7".into())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(message, "Server error");
}

#[tokio::test]
async fn test_lower_layer_conversions() {
    let conflict: AppError = RepositoryError::Conflict("Email in use".into()).into();
    assert!(matches!(conflict, AppError::Conflict(ref m) if m == "Email in use"));

    let io: AppError = RepositoryError::Io(std::io::Error::other("disk full")).into();
    assert_eq!(io.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let storage: AppError = StorageError::Simulated.into();
    assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let decode = avatar::resize_avatar(b"garbage").unwrap_err();
    assert!(matches!(decode, AvatarError::Decode(_)));
    let decode: AppError = decode.into();
    assert_eq!(render(decode).await, (StatusCode::BAD_REQUEST, "Unsupported image file".to_string()));
}
