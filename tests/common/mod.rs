#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use contacts_api::{
    AppConfig, AppState, JsonFileRepository, MailerState, MockMailer, MockStorageService,
    RepositoryState, StorageState, create_router, repository::Repository,
};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use serde_json::{Value, json};
use std::{io::Cursor, sync::Arc};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "s3cret-pass";
pub const BOUNDARY: &str = "contacts-api-test-boundary";

/// Fast, isolated configuration: low bcrypt cost and a private scratch area.
pub fn test_config(scratch: &TempDir) -> AppConfig {
    AppConfig {
        bcrypt_cost: 4,
        public_dir: scratch.path().join("public"),
        tmp_dir: scratch.path().join("tmp"),
        data_file: scratch.path().join("store.json"),
        ..AppConfig::default()
    }
}

/// TestApp
///
/// The full router over an in-memory store, with handles on the mocks so tests
/// can look behind the HTTP surface.
pub struct TestApp {
    pub router: Router,
    pub repo: RepositoryState,
    pub mailer: MockMailer,
    pub storage: MockStorageService,
    pub config: AppConfig,
    _scratch: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(MockMailer::new(), MockStorageService::new())
    }

    pub fn with(mailer: MockMailer, storage: MockStorageService) -> Self {
        let scratch = tempfile::tempdir().expect("failed to create scratch dir");
        let config = test_config(&scratch);
        let repo: RepositoryState = Arc::new(JsonFileRepository::in_memory());

        let state = AppState::new(
            repo.clone(),
            Arc::new(storage.clone()) as StorageState,
            Arc::new(mailer.clone()) as MailerState,
            config.clone(),
        );

        Self {
            router: create_router(state),
            repo,
            mailer,
            storage,
            config,
            _scratch: scratch,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn register(&self, email: &str) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/users/register",
            None,
            Some(json!({ "email": email, "password": PASSWORD })),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/users/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    pub async fn verification_token(&self, email: &str) -> String {
        self.repo
            .find_user_by_email(email)
            .await
            .unwrap()
            .and_then(|user| user.verification_token)
            .expect("user has no pending verification token")
    }

    pub async fn verify(&self, email: &str) {
        let token = self.verification_token(email).await;
        let (status, body) = self
            .call(Method::GET, &format!("/users/verify/{token}"), None, None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    /// Registers, verifies and logs in; returns the bearer token.
    pub async fn signed_in(&self, email: &str) -> String {
        let (status, body) = self.register(email).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        self.verify(email).await;

        let (status, body) = self.login(email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn user_id(&self, email: &str) -> Uuid {
        self.repo
            .find_user_by_email(email)
            .await
            .unwrap()
            .expect("user not found")
            .id
    }

    pub async fn create_contact(&self, token: &str, name: &str, favorite: bool) -> Value {
        let local: String = name
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_lowercase();

        let (status, body) = self
            .call(
                Method::POST,
                "/contacts",
                Some(token),
                Some(json!({
                    "name": name,
                    "email": format!("{local}@example.com"),
                    "phone": "(093) 123-4567",
                    "favorite": favorite,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(width, height, Rgba([30u8, 144, 255, 255]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

/// A single-part `multipart/form-data` body.
pub fn multipart_body(field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::PATCH)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
