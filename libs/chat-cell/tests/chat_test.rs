use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chat_cell::{chat_routes, ChatState, DeliveryStatus};
use shared_utils::test_utils::{MockApiResponses, TestConfig, TestUser};

async fn mount_verify(server: &MockServer, user: &TestUser) {
    Mock::given(method("GET"))
        .and(path("/auth/verify-token"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::verify_token_response(user)))
        .mount(server)
        .await;
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", "Bearer tok");
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn patient_conversations_use_the_patient_listing() {
    let server = MockServer::start().await;
    let patient = TestUser::patient("pat@example.com");
    mount_verify(&server, &patient).await;
    Mock::given(method("GET"))
        .and(path("/chat/conversations/patient"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::envelope(json!([
            {"userId": "d1", "name": "Dr. Grey", "specialty": "Cardiology",
             "lastMessage": {"message": "See you", "timestamp": "2024-06-03T09:00:00Z"}}
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    let app = chat_routes(ChatState::new(TestConfig::with_base_url(&server.uri()).to_arc()));
    let response = app.oneshot(request("GET", "/conversations", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["lastMessage"]["message"], "See you");
}

#[tokio::test]
async fn admins_have_no_conversations() {
    let server = MockServer::start().await;
    mount_verify(&server, &TestUser::admin("root@example.com")).await;

    let app = chat_routes(ChatState::new(TestConfig::with_base_url(&server.uri()).to_arc()));
    let response = app.oneshot(request("GET", "/conversations", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn sent_message_is_confirmed_in_the_open_thread() {
    let server = MockServer::start().await;
    let patient = TestUser::patient("pat@example.com");
    mount_verify(&server, &patient).await;
    Mock::given(method("GET"))
        .and(path("/chat/history"))
        .and(query_param("withUserId", "d1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::envelope(json!([
            {"_id": "m1", "senderId": "d1", "receiverId": patient.id, "message": "Hello", "createdAt": "2024-06-03T09:00:00Z"}
        ]))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/send"))
        .and(body_json(json!({"to": "d1", "message": "Thanks"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(MockApiResponses::envelope(json!({
            "_id": "m2", "senderId": patient.id, "receiverId": "d1", "message": "Thanks", "createdAt": "2024-06-03T09:05:00Z"
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let state = ChatState::new(TestConfig::with_base_url(&server.uri()).to_arc());
    let app = chat_routes(state.clone());

    let response = app.clone().oneshot(request("GET", "/history/d1", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"][0]["status"], "sent");

    let response = app
        .oneshot(request("POST", "/send", Some(json!({"to": "d1", "message": " Thanks "}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["data"]["id"], "m2");

    let entries = state.threads.snapshot(&patient.id, "d1").unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.status == DeliveryStatus::Sent));
    assert_eq!(entries[1].message.id.as_deref(), Some("m2"));
}

#[tokio::test]
async fn failed_send_leaves_a_failed_entry() {
    let server = MockServer::start().await;
    let patient = TestUser::patient("pat@example.com");
    mount_verify(&server, &patient).await;
    Mock::given(method("POST"))
        .and(path("/chat/send"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .mount(&server)
        .await;

    let state = ChatState::new(TestConfig::with_base_url(&server.uri()).to_arc());
    let response = chat_routes(state.clone())
        .oneshot(request("POST", "/send", Some(json!({"to": "d1", "message": "Hello"}))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let entries = state.threads.snapshot(&patient.id, "d1").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, DeliveryStatus::Failed);
}

#[tokio::test]
async fn blank_message_is_never_sent() {
    let server = MockServer::start().await;
    mount_verify(&server, &TestUser::patient("pat@example.com")).await;
    Mock::given(method("POST"))
        .and(path("/chat/send"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let state = ChatState::new(TestConfig::with_base_url(&server.uri()).to_arc());
    let response = chat_routes(state.clone())
        .oneshot(request("POST", "/send", Some(json!({"to": "d1", "message": "  "}))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(state.threads.is_empty());
}

#[tokio::test]
async fn open_thread_can_be_read_and_closed() {
    let server = MockServer::start().await;
    let patient = TestUser::patient("pat@example.com");
    mount_verify(&server, &patient).await;
    Mock::given(method("GET"))
        .and(path("/chat/history"))
        .and(query_param("withUserId", "d1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::envelope(json!([
            {"_id": "m1", "from": "d1", "to": patient.id, "message": "Welcome", "timestamp": "2024-06-03T09:00:00Z"}
        ]))))
        .mount(&server)
        .await;

    let state = ChatState::new(TestConfig::with_base_url(&server.uri()).to_arc());
    let app = chat_routes(state.clone());

    let unopened = app.clone().oneshot(request("GET", "/thread/d1", None)).await.unwrap();
    assert_eq!(unopened.status(), StatusCode::NOT_FOUND);

    app.clone().oneshot(request("GET", "/history/d1", None)).await.unwrap();
    let thread = app.clone().oneshot(request("GET", "/thread/d1", None)).await.unwrap();
    assert_eq!(thread.status(), StatusCode::OK);
    assert_eq!(json_body(thread).await["data"][0]["message"], "Welcome");

    let closed = app.clone().oneshot(request("DELETE", "/thread/d1", None)).await.unwrap();
    assert_eq!(json_body(closed).await["closed"], true);
    assert!(state.threads.is_empty());
}
