use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::auth_routes;
use shared_utils::test_utils::{MockApiResponses, TestConfig, TestUser};

fn app(server: &MockServer) -> Router {
    auth_routes(TestConfig::with_base_url(&server.uri()).to_arc())
}

fn post(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn login_returns_token_from_nested_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "ada@example.com", "password": "secret1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"token": "jwt-1", "role": "doctor", "name": "Ada"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post(
            "/login",
            json!({"email": " ada@example.com ", "password": "secret1"}),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["token"], "jwt-1");
    assert_eq!(body["role"], "doctor");
}

#[tokio::test]
async fn malformed_email_never_reaches_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post("/login", json!({"email": "ada", "password": "secret1"}), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})))
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post("/login", json!({"email": "ada@example.com", "password": "nope"}), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["message"], "Invalid credentials");
}

#[tokio::test]
async fn registration_forwards_role() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .and(body_json(json!({
            "name": "Ada",
            "username": null,
            "email": "ada@example.com",
            "password": "secret1",
            "role": "doctor"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"message": "Account created"})))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post(
            "/register",
            json!({"name": "Ada", "email": "ada@example.com", "password": "secret1", "role": "doctor"}),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Account created");
    assert_eq!(body["token"], Value::Null);
}

#[tokio::test]
async fn admin_self_registration_is_refused() {
    let server = MockServer::start().await;

    let response = app(&server)
        .oneshot(post(
            "/register",
            json!({"name": "Eve", "email": "eve@example.com", "password": "secret1", "role": "admin"}),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verify_requires_a_bearer_token() {
    let server = MockServer::start().await;
    let user = TestUser::patient("pat@example.com");
    Mock::given(method("GET"))
        .and(path("/auth/verify-token"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::verify_token_response(&user)))
        .mount(&server)
        .await;

    let missing = app(&server)
        .oneshot(Request::builder().uri("/verify").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let verified = app(&server)
        .oneshot(
            Request::builder()
                .uri("/verify")
                .header("Authorization", "Bearer tok")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(verified.status(), StatusCode::OK);
    assert_eq!(json_body(verified).await["user"]["id"], user.id);
}

#[tokio::test]
async fn reset_requires_token_and_long_password() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/reset-password"))
        .and(body_json(json!({"email": "ada@example.com", "token": "r-123", "password": "secret1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Password updated"})))
        .expect(1)
        .mount(&server)
        .await;

    let rejected = app(&server)
        .oneshot(post(
            "/reset-password",
            json!({"email": "ada@example.com", "token": "", "password": "secret1"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    let accepted = app(&server)
        .oneshot(post(
            "/reset-password",
            json!({"email": "ada@example.com", "token": "r-123", "password": "secret1"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);
    assert_eq!(json_body(accepted).await["message"], "Password updated");
}

#[tokio::test]
async fn change_password_needs_a_session_and_a_new_password() {
    let server = MockServer::start().await;
    let user = TestUser::patient("pat@example.com");
    Mock::given(method("GET"))
        .and(path("/auth/verify-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::verify_token_response(&user)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/change-password"))
        .and(header("authorization", "Bearer tok"))
        .and(body_json(json!({"oldPassword": "secret1", "newPassword": "secret2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let anonymous = app(&server)
        .oneshot(post(
            "/change-password",
            json!({"oldPassword": "secret1", "newPassword": "secret2"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let unchanged = app(&server)
        .oneshot(post(
            "/change-password",
            json!({"oldPassword": "secret1", "newPassword": "secret1"}),
            Some("tok"),
        ))
        .await
        .unwrap();
    assert_eq!(unchanged.status(), StatusCode::BAD_REQUEST);

    let changed = app(&server)
        .oneshot(post(
            "/change-password",
            json!({"oldPassword": "secret1", "newPassword": "secret2"}),
            Some("tok"),
        ))
        .await
        .unwrap();
    assert_eq!(changed.status(), StatusCode::OK);
    assert_eq!(json_body(changed).await["message"], "Password changed");
}
