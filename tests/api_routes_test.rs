use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use forum_api::db::DatabaseClient;
use forum_api::library::CaptchaBuilder;
use forum_api::routes::create_routes;
use forum_api::{AppConfig, AppState, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct FixedCaptcha;

impl CaptchaBuilder for FixedCaptcha {
    fn build(&self, _width: u32, _height: u32) -> Result<(String, Vec<u8>)> {
        Ok(("AbCd5".to_string(), vec![0x89, 0x50, 0x4e, 0x47]))
    }
}

struct TestApp {
    state: AppState,
    _dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::for_testing(dir.path().to_str().unwrap());
        let state = AppState::with_parts(config, DatabaseClient::in_memory(), Arc::new(FixedCaptcha));
        Self { state, _dir: dir }
    }

    fn router(&self) -> Router {
        create_routes(&self.state).with_state(self.state.clone())
    }

    fn token(&self, user_id: i64, username: &str, is_admin: bool) -> String {
        self.state
            .auth_service
            .generate_token(user_id, username, is_admin)
            .unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
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

    async fn ask(&self, token: &str, title: &str) -> i64 {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/questions",
                Some(token),
                Some(json!({ "title": title, "content_markdown": "Some *details*" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["data"]["question_id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/api/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "ok");
    assert_eq!(body["backend"], "memory");
}

#[tokio::test]
async fn test_create_requires_login() {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            Method::POST,
            "/api/questions",
            None,
            Some(json!({ "title": "Anonymous", "content_markdown": "Hi" })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let app = TestApp::new();
    let (status, _) = app.call(Method::GET, "/api/questions", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_question_create_and_list_with_includes() {
    let app = TestApp::new();
    let alice = app.token(1, "alice", false);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/questions?include=user",
            Some(&alice),
            Some(json!({ "title": "  Borrow checker?  ", "content_markdown": "Why **this**?" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["need_captcha"], false);
    assert_eq!(body["data"]["title"], "Borrow checker?");
    assert!(body["data"]["content_rendered"].as_str().unwrap().contains("<strong>this</strong>"));
    assert_eq!(body["data"]["relationships"]["user"]["username"], "alice");

    let (status, body) = app
        .call(Method::GET, "/api/questions?include=user,voting", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["per_page"], 20);
    let first = &body["data"][0];
    assert_eq!(first["relationships"]["user"]["user_id"], 1);
    assert_eq!(first["relationships"]["voting"], "");
}

#[tokio::test]
async fn test_empty_title_reports_field_error() {
    let app = TestApp::new();
    let alice = app.token(1, "alice", false);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/questions",
            Some(&alice),
            Some(json!({ "title": "   ", "content_markdown": "Body" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["title"].is_string());
    assert_eq!(body["need_captcha"], false);
}

#[tokio::test]
async fn test_bad_paging_is_rejected() {
    let app = TestApp::new();
    let (status, _) = app.call(Method::GET, "/api/questions?per_page=1000", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_vote_shows_in_voting_relationship() {
    let app = TestApp::new();
    let alice = app.token(1, "alice", false);
    let bob = app.token(2, "bob", false);
    let question_id = app.ask(&alice, "Vote on me").await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/questions/{}/votes", question_id),
            Some(&bob),
            Some(json!({ "type": "up" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let uri = format!("/api/questions/{}?include=voting", question_id);
    let (_, body) = app.call(Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(body["data"]["relationships"]["voting"], "up");

    // Only the voter sees their vote.
    let (_, body) = app.call(Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(body["data"]["relationships"]["voting"], "");

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/questions/{}/votes", question_id), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.call(Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(body["data"]["relationships"]["voting"], "");
}

#[tokio::test]
async fn test_trash_is_admin_only_and_restorable() {
    let app = TestApp::new();
    let alice = app.token(1, "alice", false);
    let admin = app.token(99, "admin", true);
    let question_id = app.ask(&alice, "Spam?").await;

    let trash_uri = format!("/api/questions/{}/trash", question_id);
    let (status, _) = app.call(Method::POST, &trash_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call(Method::POST, &trash_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["delete_time"].is_i64());

    let get_uri = format!("/api/questions/{}", question_id);
    let (status, _) = app.call(Method::GET, &get_uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.call(Method::GET, "/api/trash/questions", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["question_id"], question_id);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/trash/questions/untrash",
            Some(&admin),
            Some(json!({ "ids": [question_id] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["delete_time"], Value::Null);

    let (status, body) = app.call(Method::GET, &get_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Spam?");

    let (_, body) = app
        .call(Method::GET, "/api/notifications?type=question_deleted", Some(&alice), None)
        .await;
    assert_eq!(body["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_batch_delete_from_trash() {
    let app = TestApp::new();
    let alice = app.token(1, "alice", false);
    let admin = app.token(99, "admin", true);
    let first = app.ask(&alice, "First").await;
    let second = app.ask(&alice, "Second").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/trash/questions",
            Some(&admin),
            Some(json!({ "ids": [first, second] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, _) = app
        .call(Method::POST, "/api/trash/questions", Some(&admin), Some(json!({ "ids": [] })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/trash/questions?ids={},{}", first, second);
    let (status, _) = app.call(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.call(Method::GET, "/api/trash/questions", Some(&admin), None).await;
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_answer_notifies_question_owner() {
    let app = TestApp::new();
    let alice = app.token(1, "alice", false);
    let bob = app.token(2, "bob", false);
    let question_id = app.ask(&alice, "Who answers?").await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/questions/{}/answers", question_id),
            Some(&bob),
            Some(json!({ "content_markdown": "Me" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["question_id"], question_id);

    let (_, body) = app.call(Method::GET, "/api/notifications/unread_count", Some(&alice), None).await;
    assert_eq!(body["data"]["unread_count"], 1);

    let (status, body) = app.call(Method::GET, "/api/notifications", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let notice = &body["data"][0];
    assert_eq!(notice["type"], "question_answered");
    assert_eq!(notice["relationships"]["sender"]["username"], "bob");
    assert_eq!(notice["relationships"]["question"]["title"], "Who answers?");

    let (status, _) = app.call(Method::POST, "/api/notifications/read", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.call(Method::GET, "/api/notifications/unread_count", Some(&alice), None).await;
    assert_eq!(body["data"]["unread_count"], 0);

    // Bob sees nothing of Alice's.
    let (_, body) = app.call(Method::GET, "/api/notifications", Some(&bob), None).await;
    assert_eq!(body["pagination"]["total"], 0);

    let (_, body) = app.call(Method::GET, &format!("/api/questions/{}", question_id), None, None).await;
    assert_eq!(body["data"]["answer_count"], 1);
}

#[tokio::test]
async fn test_only_owner_can_edit() {
    let app = TestApp::new();
    let alice = app.token(1, "alice", false);
    let bob = app.token(2, "bob", false);
    let question_id = app.ask(&alice, "Original").await;
    let uri = format!("/api/questions/{}", question_id);

    let (status, _) = app
        .call(Method::PATCH, &uri, Some(&bob), Some(json!({ "title": "Hijacked" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(Method::PATCH, &uri, Some(&alice), Some(json!({ "title": "Edited" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Edited");

    let (status, _) = app.call(Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app.call(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_captcha_endpoint() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/api/captcha", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["image"].as_str().unwrap().starts_with("data:image/png;base64,"));
    assert!(!body["data"]["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_rss_latest_questions() {
    let app = TestApp::new();
    let alice = app.token(1, "alice", false);
    let question_id = app.ask(&alice, "Feed me").await;

    let request = Request::builder().uri("/rss/questions").body(Body::empty()).unwrap();
    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/rss+xml; charset=utf-8"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let xml = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(xml.contains("<title>Feed me</title>"));
    assert!(xml.contains(&format!("http://forum.test/questions/{}", question_id)));
    assert!(xml.contains("<author>alice</author>"));
}

#[tokio::test]
async fn test_rss_unknown_user_is_not_found() {
    let app = TestApp::new();
    let request = Request::builder().uri("/rss/users/42/questions").body(Body::empty()).unwrap();
    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn png_bytes() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(4, 3, image::Rgb([200, 30, 30]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn multipart_upload(token: &str, filename: &str, data: &[u8]) -> Request<Body> {
    let boundary = "forumtestboundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/images")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_image_upload_and_owner_delete() {
    let app = TestApp::new();
    let alice = app.token(1, "alice", false);
    let bob = app.token(2, "bob", false);

    let (status, body) = app.send(multipart_upload(&alice, "red.png", &png_bytes())).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let data = &body["data"];
    let key = data["key"].as_str().unwrap().to_string();
    assert!(key.ends_with("_png"));
    assert_eq!(data["width"], 4);
    assert_eq!(data["height"], 3);
    assert_eq!(data["filename"], "red.png");
    assert!(data["urls"]["o"].as_str().unwrap().starts_with("/upload/"));
    assert!(data["urls"]["r"].as_str().unwrap().ends_with("_r.png"));

    let uri = format!("/api/images/{}", key);
    let (status, _) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call(Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn upload(app: &TestApp, token: &str, filename: &str) -> String {
    let (status, body) = app.send(multipart_upload(token, filename, &png_bytes())).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"]["key"].as_str().unwrap().to_string()
}

/// Stored keys keep the dot that the API replaces with `_`.
fn stored_key(api_key: &str) -> String {
    api_key.replace('_', ".")
}

#[tokio::test]
async fn test_image_filename_is_html_escaped() {
    let app = TestApp::new();
    let alice = app.token(1, "alice", false);

    let (status, body) = app.send(multipart_upload(&alice, "a<b>.png", &png_bytes())).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["filename"], "a&lt;b&gt;.png");
}

#[tokio::test]
async fn test_images_link_to_the_content_that_uses_them() {
    let app = TestApp::new();
    let alice = app.token(1, "alice", false);

    let for_question = upload(&app, &alice, "q.png").await;
    let for_article = upload(&app, &alice, "a.png").await;
    let for_answer = upload(&app, &alice, "r.png").await;
    let unused = upload(&app, &alice, "u.png").await;

    let (_, body) = app
        .call(
            Method::POST,
            "/api/questions",
            Some(&alice),
            Some(json!({
                "title": "pic",
                "content_markdown": format!("![q](/upload/{})", stored_key(&for_question)),
            })),
        )
        .await;
    let question_id = body["data"]["question_id"].as_i64().unwrap();

    let (_, body) = app
        .call(
            Method::POST,
            "/api/articles",
            Some(&alice),
            Some(json!({
                "title": "gallery",
                "content_markdown": format!("See ![a](/upload/{})", stored_key(&for_article)),
            })),
        )
        .await;
    let article_id = body["data"]["article_id"].as_i64().unwrap();

    let (_, body) = app
        .call(
            Method::POST,
            &format!("/api/questions/{}/answers", question_id),
            Some(&alice),
            Some(json!({ "content_markdown": format!("![r](/upload/{})", stored_key(&for_answer)) })),
        )
        .await;
    let answer_id = body["data"]["answer_id"].as_i64().unwrap();

    let include = "?include=user,question,article,answer";

    let (_, body) = app.call(Method::GET, &format!("/api/images/{}{}", for_question, include), None, None).await;
    assert_eq!(body["data"]["item_type"], "question");
    assert_eq!(body["data"]["relationships"]["question"]["question_id"], question_id);
    assert_eq!(body["data"]["relationships"]["question"]["title"], "pic");
    assert_eq!(body["data"]["relationships"]["user"]["username"], "alice");
    assert!(body["data"]["relationships"]["article"].is_null());

    let (_, body) = app.call(Method::GET, &format!("/api/images/{}{}", for_article, include), None, None).await;
    assert_eq!(body["data"]["item_type"], "article");
    assert_eq!(body["data"]["relationships"]["article"]["article_id"], article_id);
    assert!(body["data"]["relationships"]["question"].is_null());

    let (_, body) = app.call(Method::GET, &format!("/api/images/{}{}", for_answer, include), None, None).await;
    assert_eq!(body["data"]["item_type"], "answer");
    assert_eq!(body["data"]["relationships"]["answer"]["answer_id"], answer_id);
    assert_eq!(body["data"]["relationships"]["answer"]["question_id"], question_id);

    let (_, body) = app.call(Method::GET, &format!("/api/images/{}{}", unused, include), None, None).await;
    assert!(body["data"]["item_type"].is_null());
    assert!(body["data"]["relationships"]["question"].is_null());

    // Without the include nothing is embedded.
    let (_, body) = app.call(Method::GET, &format!("/api/images/{}", for_question), None, None).await;
    assert!(body["data"]["relationships"]["question"].is_null());
}

#[tokio::test]
async fn test_batch_delete_images_by_api_key() {
    let app = TestApp::new();
    let alice = app.token(1, "alice", false);
    let bob = app.token(2, "bob", false);

    let first = upload(&app, &alice, "one.png").await;
    let second = upload(&app, &alice, "two.png").await;
    let bobs = upload(&app, &bob, "bob.png").await;

    let uri = format!("/api/images?keys={},{},{}", first, second, bobs);
    let (status, _) = app.call(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);

    for key in [&first, &second] {
        let (status, _) = app.call(Method::GET, &format!("/api/images/{}", key), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    // Images of other users are skipped.
    let (status, _) = app.call(Method::GET, &format!("/api/images/{}", bobs), None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call(Method::DELETE, "/api/images?keys=", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_image_upload_rejected() {
    let app = TestApp::new();
    let alice = app.token(1, "alice", false);

    let (status, body) = app.send(multipart_upload(&alice, "notes.txt", b"plain text")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["image"].is_string());
}

#[tokio::test]
async fn test_inbox_conversation() {
    let app = TestApp::new();
    let alice = app.token(1, "alice", false);
    let bob = app.token(2, "bob", false);

    // Bob becomes known locally by posting.
    app.ask(&bob, "Hello there").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/inbox",
            Some(&alice),
            Some(json!({ "receiver_id": 2, "content_markdown": "Hi **Bob**" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, body) = app.call(Method::GET, "/api/inbox", Some(&bob), None).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["relationships"]["sender"]["username"], "alice");

    let (_, body) = app.call(Method::GET, "/api/inbox/users/1", Some(&bob), None).await;
    assert_eq!(body["pagination"]["total"], 1);
}
