mod common;

use axum::http::{Method, StatusCode};
use chrono::Duration;
use common::{PASSWORD, TestApp, multipart_body, multipart_request, png_bytes};
use contacts_api::{
    MockMailer, MockStorageService, TokenIssuer, avatar::AVATAR_SIZE, repository::Repository,
};
use serde_json::json;

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_register_returns_public_profile_and_sends_link() {
    let app = TestApp::new();

    let (status, body) = app.register("Alice@Example.com").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        json!({ "user": { "email": "alice@example.com", "subscription": "starter" } })
    );

    let user = app
        .repo
        .find_user_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(!user.verify);
    assert_ne!(user.password, PASSWORD);
    assert!(user.token.is_none());
    assert!(user.avatar_url.starts_with("https://api.dicebear.com/"));

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "alice@example.com");
    let link = format!(
        "{}/users/verify/{}",
        app.config.base_url,
        user.verification_token.unwrap()
    );
    assert!(sent[0].html.contains(&link));
}

#[tokio::test]
async fn test_register_with_subscription() {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            Method::POST,
            "/users/register",
            None,
            Some(json!({ "email": "pro@example.com", "password": PASSWORD, "subscription": "pro" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["subscription"], "pro");
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = TestApp::new();
    assert_eq!(app.register("dup@example.com").await.0, StatusCode::CREATED);

    let (status, body) = app.register("DUP@example.com").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({ "message": "Email in use" }));
    assert_eq!(app.mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_register_validation() {
    let app = TestApp::new();
    let cases = [
        json!({ "email": "bad-email", "password": PASSWORD }),
        json!({ "email": "short@example.com", "password": "12345" }),
        json!({ "email": "tier@example.com", "password": PASSWORD, "subscription": "gold" }),
        json!({ "password": PASSWORD }),
    ];

    for payload in cases {
        let (status, body) = app
            .call(Method::POST, "/users/register", None, Some(payload.clone()))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
        assert!(body["message"].is_string());
    }
}

#[tokio::test]
async fn test_concurrent_registrations_yield_one_account() {
    let app = TestApp::new();

    let (first, second) = tokio::join!(
        app.register("race@example.com"),
        app.register("race@example.com")
    );
    let mut statuses = [first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);

    let loser = if first.0 == StatusCode::CONFLICT { first.1 } else { second.1 };
    assert_eq!(loser, json!({ "message": "Email in use" }));

    // Only the stored account got a verification email.
    assert_eq!(app.mailer.sent().len(), 1);
    assert!(
        app.repo
            .find_user_by_email("race@example.com")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_register_survives_mail_failure() {
    let app = TestApp::with(MockMailer::new_failing(), MockStorageService::new());

    let (status, _) = app.register("offline@example.com").await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(
        app.repo
            .find_user_by_email("offline@example.com")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_login_requires_verification() {
    let app = TestApp::new();
    app.register("new@example.com").await;

    let (status, body) = app.login("new@example.com", PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "message": "Not authorized" }));

    app.verify("new@example.com").await;

    let (status, body) = app.login("new@example.com", PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(
        body["user"],
        json!({ "email": "new@example.com", "subscription": "starter" })
    );
}

#[tokio::test]
async fn test_login_wrong_credentials() {
    let app = TestApp::new();
    app.signed_in("known@example.com").await;

    let expected = json!({ "message": "Email or password is wrong" });

    let (status, body) = app.login("known@example.com", "wrong-password").await;
    assert_eq!((status, body), (StatusCode::UNAUTHORIZED, expected.clone()));

    let (status, body) = app.login("unknown@example.com", PASSWORD).await;
    assert_eq!((status, body), (StatusCode::UNAUTHORIZED, expected));
}

#[tokio::test]
async fn test_verification_token_is_single_use() {
    let app = TestApp::new();
    app.register("once@example.com").await;
    let token = app.verification_token("once@example.com").await;
    let uri = format!("/users/verify/{token}");

    let (status, body) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Verification successful" }));

    let user = app
        .repo
        .find_user_by_email("once@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(user.verify);
    assert!(user.verification_token.is_none());

    let (status, _) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_resend_verification() {
    let app = TestApp::new();
    app.register("later@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/users/verify",
            None,
            Some(json!({ "email": "later@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Verification email sent" }));

    // Same token both times.
    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].html, sent[1].html);

    let (status, body) = app
        .call(Method::POST, "/users/verify", None, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "message": "missing required field email" }));

    let (status, _) = app
        .call(
            Method::POST,
            "/users/verify",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.verify("later@example.com").await;
    let (status, body) = app
        .call(
            Method::POST,
            "/users/verify",
            None,
            Some(json!({ "email": "later@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "message": "Verification has already been passed" }));
}

#[tokio::test]
async fn test_current_and_logout_revokes_token() {
    let app = TestApp::new();
    let token = app.signed_in("session@example.com").await;

    let (status, body) = app
        .call(Method::POST, "/users/current", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "email": "session@example.com", "subscription": "starter" })
    );

    let (status, body) = app
        .call(Method::POST, "/users/logout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app
        .call(Method::POST, "/users/current", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(Method::POST, "/users/logout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_new_login_replaces_previous_session() {
    let app = TestApp::new();
    let first = app.signed_in("twice@example.com").await;

    let (_, body) = app.login("twice@example.com", PASSWORD).await;
    let second = body["token"].as_str().unwrap().to_string();
    assert_ne!(first, second);

    let (status, _) = app
        .call(Method::POST, "/users/current", Some(&first), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(Method::POST, "/users/current", Some(&second), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = TestApp::new();
    app.signed_in("expired@example.com").await;
    let id = app.user_id("expired@example.com").await;

    let expired = TokenIssuer::new(&app.config.jwt_secret)
        .with_ttl(Duration::hours(-1))
        .issue(id)
        .unwrap();
    app.repo
        .set_session_token(id, Some(expired.clone()))
        .await
        .unwrap();

    let (status, _) = app
        .call(Method::POST, "/users/current", Some(&expired), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_subscription() {
    let app = TestApp::new();
    let token = app.signed_in("tier@example.com").await;

    let (status, body) = app
        .call(
            Method::PATCH,
            "/users",
            Some(&token),
            Some(json!({ "subscription": "business" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "subscription": "business", "message": "Subscription successfully changed" })
    );

    let (_, body) = app
        .call(Method::POST, "/users/current", Some(&token), None)
        .await;
    assert_eq!(body["subscription"], "business");

    let (status, _) = app
        .call(
            Method::PATCH,
            "/users",
            Some(&token),
            Some(json!({ "subscription": "platinum" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_avatar_upload_is_resized_and_recorded() {
    let app = TestApp::new();
    let token = app.signed_in("face@example.com").await;
    let id = app.user_id("face@example.com").await;

    let body = multipart_body("avatarURL", "selfie.png", "image/png", &png_bytes(800, 600));
    let (status, body) = app
        .send(multipart_request("/users/avatars", &token, body))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let avatar_url = body["avatarURL"].as_str().unwrap();
    assert_eq!(avatar_url, format!("/avatars/{id}_selfie.png"));

    let stored = app.storage.object(avatar_url).expect("avatar not stored");
    let decoded = image::load_from_memory(&stored).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (AVATAR_SIZE, AVATAR_SIZE));

    let user = app.repo.find_user_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.avatar_url, avatar_url);

    // Scratch uploads are cleaned up.
    let leftovers = std::fs::read_dir(&app.config.tmp_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_new_avatar_replaces_previous_file() {
    let app = TestApp::new();
    let token = app.signed_in("twice@example.com").await;
    let id = app.user_id("twice@example.com").await;

    let body = multipart_body("avatarURL", "first.png", "image/png", &png_bytes(300, 300));
    let (status, _) = app
        .send(multipart_request("/users/avatars", &token, body))
        .await;
    assert_eq!(status, StatusCode::OK);
    let first = format!("/avatars/{id}_first.png");
    assert!(app.storage.object(&first).is_some());

    let body = multipart_body("avatarURL", "second.png", "image/png", &png_bytes(400, 300));
    let (status, body) = app
        .send(multipart_request("/users/avatars", &token, body))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["avatarURL"], format!("/avatars/{id}_second.png"));

    assert!(app.storage.object(&first).is_none());
    assert_eq!(app.storage.len(), 1);

    // Same name again overwrites in place and keeps the file.
    let body = multipart_body("avatarURL", "second.png", "image/png", &png_bytes(260, 260));
    let (status, _) = app
        .send(multipart_request("/users/avatars", &token, body))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        app.storage
            .object(&format!("/avatars/{id}_second.png"))
            .is_some()
    );
    assert_eq!(app.storage.len(), 1);
}

#[tokio::test]
async fn test_avatar_without_file_is_bad_request() {
    let app = TestApp::new();
    let token = app.signed_in("nofile@example.com").await;

    let body = multipart_body("somethingElse", "notes.txt", "text/plain", b"hello");
    let (status, body) = app
        .send(multipart_request("/users/avatars", &token, body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "message": "File not provided" }));

    let (status, _) = app
        .call(Method::PATCH, "/users/avatars", Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.storage.is_empty());
}

#[tokio::test]
async fn test_avatar_rejects_non_image() {
    let app = TestApp::new();
    let token = app.signed_in("text@example.com").await;

    let body = multipart_body("avatarURL", "avatar.png", "image/png", b"not really a png");
    let (status, body) = app
        .send(multipart_request("/users/avatars", &token, body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "message": "Unsupported image file" }));
    assert!(app.storage.is_empty());
}

#[tokio::test]
async fn test_avatar_storage_failure_is_server_error() {
    let app = TestApp::with(MockMailer::new(), MockStorageService::new_failing());
    let token = app.signed_in("broken@example.com").await;

    let body = multipart_body("avatarURL", "me.png", "image/png", &png_bytes(300, 300));
    let (status, body) = app
        .send(multipart_request("/users/avatars", &token, body))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "message": "Server error" }));
}
