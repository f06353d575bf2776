mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use common::*;
use event_portal::{
    auth::ACCESS_TOKEN_COOKIE,
    handlers::safe_next,
    models::{Address, Category, EventDetails, KeyValue, RegistrationRequest, RequestStatus, Role},
    storage::MockStorageService,
};
use serde_json::json;
use uuid::Uuid;

fn event_form(institution_id: Option<Uuid>) -> serde_json::Value {
    json!({
        "institution_id": institution_id.map(|id| id.to_string()),
        "title": "Spring Hackathon",
        "summary": "24 hours of building",
        "starts_at": "2026-04-10T09:00:00Z"
    })
}

// --- Event pages ---

#[tokio::test]
async fn test_event_details_unknown_id_is_not_found() {
    let app = TestApp::default_app();

    let response = app
        .send(get(&format!("/events/{}", Uuid::new_v4()), None))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json(response).await;
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_event_details_resolve_banner_url() {
    let org = institution(ADMIN_ID, "Robotics Society");
    let mut evt = event(org.id, "Robot Wars");
    evt.banner = Some("banners/robot.png".to_string());
    let repo = default_repo().with_institution(org).with_event(evt.clone());
    repo.details.lock().unwrap().push(EventDetails {
        event: evt.clone(),
        faqs: vec![KeyValue {
            key: "Bring a robot?".to_string(),
            value: "Yes".to_string(),
        }],
        ..EventDetails::default()
    });
    let app = TestApp::new(default_auth(), repo);

    let response = app.send(get(&format!("/events/{}", evt.id), None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["event"]["title"], "Robot Wars");
    assert_eq!(
        body["banner_url"],
        "http://localhost:9000/mock-bucket/banners/robot.png"
    );
    assert_eq!(body["faqs"][0]["value"], "Yes");
    assert_eq!(body["activities"], json!([]));
}

#[tokio::test]
async fn test_event_listing_filters_by_search() {
    let org = institution(ADMIN_ID, "Robotics Society");
    let repo = default_repo()
        .with_event(event(org.id, "Robot Wars"))
        .with_event(event(org.id, "Poetry Night"));
    let app = TestApp::new(default_auth(), repo);

    let response = app.send(get("/events?search=robot", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "Robot Wars");
}

#[tokio::test]
async fn test_register_twice_is_conflict() {
    let org = institution(ADMIN_ID, "Robotics Society");
    let evt = event(org.id, "Robot Wars");
    let app = TestApp::new(default_auth(), default_repo().with_event(evt.clone()));
    let uri = format!("/events/{}/register", evt.id);

    let first = app
        .send(request(Method::POST, &uri, Some(USER_TOKEN), None))
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let ticket = read_json(first).await;
    assert_eq!(ticket["user_id"], USER_ID.to_string());

    let second = app
        .send(request(Method::POST, &uri, Some(USER_TOKEN), None))
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(app.repo.tickets.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_register_for_unknown_event() {
    let app = TestApp::default_app();
    let uri = format!("/events/{}/register", Uuid::new_v4());

    let response = app
        .send(request(Method::POST, &uri, Some(USER_TOKEN), None))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_event_requires_institution_editor() {
    let owned = institution(USER_ID, "Chess Club");
    let foreign = institution(ADMIN_ID, "Robotics Society");
    let app = TestApp::new(
        default_auth(),
        default_repo()
            .with_institution(owned.clone())
            .with_institution(foreign.clone()),
    );

    let denied = app
        .send(request(
            Method::POST,
            "/events",
            Some(USER_TOKEN),
            Some(event_form(Some(foreign.id))),
        ))
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let created = app
        .send(request(
            Method::POST,
            "/events",
            Some(USER_TOKEN),
            Some(event_form(Some(owned.id))),
        ))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = read_json(created).await;
    assert_eq!(body["institution_id"], owned.id.to_string());

    // Admins may create for any institution.
    let by_admin = app
        .send(request(
            Method::POST,
            "/events",
            Some(ADMIN_TOKEN),
            Some(event_form(Some(owned.id))),
        ))
        .await;
    assert_eq!(by_admin.status(), StatusCode::CREATED);
    assert_eq!(app.repo.events.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_event_without_institution_is_invalid() {
    let app = TestApp::default_app();

    let response = app
        .send(request(
            Method::POST,
            "/events",
            Some(USER_TOKEN),
            Some(event_form(None)),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json(response).await;
    assert_eq!(body["fields"]["institution_id"][0], "is required");
}

#[tokio::test]
async fn test_update_event_by_owner() {
    let owned = institution(USER_ID, "Chess Club");
    let evt = event(owned.id, "Blitz Night");
    let app = TestApp::new(
        default_auth(),
        default_repo()
            .with_institution(owned)
            .with_event(evt.clone()),
    );

    let response = app
        .send(request(
            Method::PUT,
            &format!("/events/{}", evt.id),
            Some(USER_TOKEN),
            Some(event_form(None)),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["title"], "Spring Hackathon");
}

// --- Validation through the extractor ---

#[tokio::test]
async fn test_invalid_form_is_rejected_before_any_write() {
    let app = TestApp::default_app();

    let response = app
        .send(request(
            Method::POST,
            "/admin/categories",
            Some(ADMIN_TOKEN),
            Some(json!({ "name": "x" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json(response).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert_eq!(body["fields"]["name"][0], "must be at least 2 characters");
    assert!(app.repo.categories.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() {
    let app = TestApp::default_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/organizations/follow")
        .header(header::COOKIE, format!("{}={}", ACCESS_TOKEN_COOKIE, USER_TOKEN))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- Admin pages ---

#[tokio::test]
async fn test_admin_creates_and_deletes_category() {
    let app = TestApp::default_app();

    let created = app
        .send(request(
            Method::POST,
            "/admin/categories",
            Some(ADMIN_TOKEN),
            Some(json!({ "name": "Workshops", "icon": "wrench" })),
        ))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let category = read_json(created).await;
    let id = category["id"].as_str().unwrap().to_string();

    let deleted = app
        .send(request(
            Method::DELETE,
            &format!("/admin/categories/{}", id),
            Some(ADMIN_TOKEN),
            None,
        ))
        .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let again = app
        .send(request(
            Method::DELETE,
            &format!("/admin/categories/{}", id),
            Some(ADMIN_TOKEN),
            None,
        ))
        .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_admin_cannot_create_category() {
    let app = TestApp::default_app();

    let response = app
        .send(request(
            Method::POST,
            "/admin/categories",
            Some(USER_TOKEN),
            Some(json!({ "name": "Workshops" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.repo.categories.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_changes_user_role() {
    let app = TestApp::default_app();

    let response = app
        .send(request(
            Method::PUT,
            &format!("/admin/users/{}/role", USER_ID),
            Some(ADMIN_TOKEN),
            Some(json!({ "role": "institution_admin" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["role"], "institution_admin");

    let profiles = app.repo.profiles.lock().unwrap();
    let user = profiles.iter().find(|p| p.id == USER_ID).unwrap();
    assert_eq!(user.role, Role::InstitutionAdmin);
}

#[tokio::test]
async fn test_admin_role_change_for_unknown_user() {
    let app = TestApp::default_app();

    let response = app
        .send(request(
            Method::PUT,
            &format!("/admin/users/{}/role", Uuid::new_v4()),
            Some(ADMIN_TOKEN),
            Some(json!({ "role": "admin" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_decides_request() {
    let pending = RegistrationRequest {
        id: Uuid::new_v4(),
        user_id: USER_ID,
        institution_name: "Chess Club".to_string(),
        contact_email: "chess@example.com".to_string(),
        address: Address::default(),
        status: RequestStatus::Pending,
        ..RegistrationRequest::default()
    };
    let app = TestApp::new(default_auth(), default_repo().with_request(pending.clone()));

    let queue = app
        .send(get("/admin/requests-approval?status=pending", Some(ADMIN_TOKEN)))
        .await;
    assert_eq!(queue.status(), StatusCode::OK);
    assert_eq!(read_json(queue).await.as_array().unwrap().len(), 1);

    let decided = app
        .send(request(
            Method::PUT,
            &format!("/admin/requests-approval/{}", pending.id),
            Some(ADMIN_TOKEN),
            Some(json!({ "status": "approved" })),
        ))
        .await;
    assert_eq!(decided.status(), StatusCode::OK);
    assert_eq!(read_json(decided).await["status"], "approved");

    let queue = app
        .send(get("/admin/requests-approval?status=pending", Some(ADMIN_TOKEN)))
        .await;
    assert_eq!(read_json(queue).await, json!([]));
}

#[tokio::test]
async fn test_admin_request_filter_must_be_known() {
    let app = TestApp::default_app();

    let response = app
        .send(get("/admin/requests-approval?status=maybe", Some(ADMIN_TOKEN)))
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- Organizations ---

#[tokio::test]
async fn test_follow_toggles() {
    let org = institution(ADMIN_ID, "Robotics Society");
    let app = TestApp::new(default_auth(), default_repo().with_institution(org.clone()));
    let form = json!({ "institution_id": org.id.to_string() });

    let first = app
        .send(request(
            Method::POST,
            "/organizations/follow",
            Some(USER_TOKEN),
            Some(form.clone()),
        ))
        .await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(read_json(first).await["following"], true);

    let listing = app.send(get("/organizations", Some(USER_TOKEN))).await;
    assert_eq!(read_json(listing).await[0]["following"], true);

    let second = app
        .send(request(
            Method::POST,
            "/organizations/follow",
            Some(USER_TOKEN),
            Some(form),
        ))
        .await;
    assert_eq!(read_json(second).await["following"], false);
    assert!(app.repo.follows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_follow_unknown_institution() {
    let app = TestApp::default_app();

    let response = app
        .send(request(
            Method::POST,
            "/organizations/follow",
            Some(USER_TOKEN),
            Some(json!({ "institution_id": Uuid::new_v4().to_string() })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submit_institution_request() {
    let app = TestApp::default_app();

    let response = app
        .send(request(
            Method::POST,
            "/organizations/requests",
            Some(USER_TOKEN),
            Some(json!({
                "institution_name": "Chess Club",
                "contact_email": "chess@example.com",
                "address": {
                    "street": "1 Main Street",
                    "city": "Limerick",
                    "postal_code": "V94 T9PX",
                    "country": "Ireland"
                }
            })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["user_id"], USER_ID.to_string());
}

// --- Sign-in flow ---

#[tokio::test]
async fn test_login_sets_cookie_and_redirects() {
    let app = TestApp::default_app();

    let response = app
        .send(request(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": USER_EMAIL, "password": "whatever" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/dashboard"));
    let cookie = set_cookie(&response).unwrap();
    assert!(cookie.starts_with(&format!("{}={}", ACCESS_TOKEN_COOKIE, USER_TOKEN)));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=3600"));
}

#[tokio::test]
async fn test_login_with_unknown_credentials() {
    let app = TestApp::default_app();

    let response = app
        .send(request(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "whatever" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "AUTH_REJECTED");
    assert_eq!(body["message"], "Invalid login credentials");
}

#[tokio::test]
async fn test_signup_creates_profile() {
    let app = TestApp::default_app();

    let response = app
        .send(request(
            Method::POST,
            "/signup",
            None,
            Some(json!({
                "email": "new@example.com",
                "password": "secret123",
                "full_name": "New Person"
            })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["signed_in"], false);

    let profiles = app.repo.profiles.lock().unwrap();
    let created = profiles
        .iter()
        .find(|p| p.email == "new@example.com")
        .unwrap();
    assert_eq!(created.full_name.as_deref(), Some("New Person"));
    assert_eq!(created.role, Role::User);
}

#[tokio::test]
async fn test_signup_profile_failure_is_bad_gateway() {
    let app = TestApp::new(default_auth(), InMemoryRepository::failing(Failure::Profiles));

    let response = app
        .send(request(
            Method::POST,
            "/signup",
            None,
            Some(json!({ "email": "new@example.com", "password": "secret123" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(read_json(response).await["error"], "BACKEND_ERROR");
    assert!(app.repo.profiles.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_signup_with_taken_email() {
    let app = TestApp::default_app();

    let response = app
        .send(request(
            Method::POST,
            "/signup",
            None,
            Some(json!({ "email": USER_EMAIL, "password": "secret123" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = TestApp::default_app();

    let response = app
        .send(request(Method::POST, "/logout", Some(USER_TOKEN), None))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    let cookie = set_cookie(&response).unwrap();
    assert!(cookie.starts_with(&format!("{}=;", ACCESS_TOKEN_COOKIE)));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_callback_exchanges_code_and_follows_next() {
    let app = TestApp::default_app();

    let response = app
        .send(get(
            &format!("/auth/callback?code={}&next=/tickets", USER_TOKEN),
            None,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/tickets"));
    assert!(set_cookie(&response).is_some());
}

#[tokio::test]
async fn test_callback_ignores_offsite_next() {
    let app = TestApp::default_app();

    let response = app
        .send(get(
            &format!("/auth/callback?code={}&next=//evil.example", USER_TOKEN),
            None,
        ))
        .await;

    assert_eq!(location(&response), Some("/dashboard"));
}

#[tokio::test]
async fn test_callback_ignores_next_with_control_characters() {
    let app = TestApp::default_app();

    for next in ["%2F%09%2Fevil.example", "%2Fa%0Ab"] {
        let response = app
            .send(get(
                &format!("/auth/callback?code={}&next={}", USER_TOKEN, next),
                None,
            ))
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER, "next={}", next);
        assert_eq!(location(&response), Some("/dashboard"));
        assert!(set_cookie(&response).is_some());
    }
}

#[tokio::test]
async fn test_callback_failures_go_to_login() {
    let app = TestApp::default_app();

    let missing = app.send(get("/auth/callback", None)).await;
    assert_eq!(location(&missing), Some("/login"));
    assert!(set_cookie(&missing).is_none());

    let bad = app.send(get("/auth/callback?code=bogus", None)).await;
    assert_eq!(location(&bad), Some("/login"));
    assert!(set_cookie(&bad).is_none());
}

#[test]
fn test_safe_next() {
    assert_eq!(safe_next(Some("/events/abc")), "/events/abc");
    assert_eq!(safe_next(Some("https://evil.example")), "/dashboard");
    assert_eq!(safe_next(Some("//evil.example")), "/dashboard");
    assert_eq!(safe_next(Some("/\\evil.example")), "/dashboard");
    // Browsers drop tab and newline, so these would act as `//evil.example`.
    assert_eq!(safe_next(Some("/\t/evil.example")), "/dashboard");
    assert_eq!(safe_next(Some("/\n/evil.example")), "/dashboard");
    assert_eq!(safe_next(Some("/a\nb")), "/dashboard");
    assert_eq!(safe_next(None), "/dashboard");
}

// --- Settings & uploads ---

#[tokio::test]
async fn test_update_settings() {
    let app = TestApp::default_app();

    let response = app
        .send(request(
            Method::PUT,
            "/settings",
            Some(USER_TOKEN),
            Some(json!({ "full_name": "Renamed Person" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["profile"]["full_name"], "Renamed Person");
    assert!(body["avatar_url"].is_null());
}

#[tokio::test]
async fn test_avatar_upload() {
    let app = TestApp::default_app();
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/settings/avatar")
        .header(header::COOKIE, format!("{}={}", ACCESS_TOKEN_COOKIE, USER_TOKEN))
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(vec![0x89, 0x50, 0x4e, 0x47]))
        .unwrap();

    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let keys = app.storage.uploaded_keys();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with(&format!("avatars/{}/", USER_ID)));
    assert!(keys[0].ends_with(".png"));
    assert_eq!(
        body["avatar_url"],
        format!("http://localhost:9000/mock-bucket/{}", keys[0])
    );
}

#[tokio::test]
async fn test_avatar_upload_rejects_non_images() {
    let app = TestApp::default_app();
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/settings/avatar")
        .header(header::COOKIE, format!("{}={}", ACCESS_TOKEN_COOKIE, USER_TOKEN))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hello"))
        .unwrap();

    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(app.storage.uploaded_keys().is_empty());
}

#[tokio::test]
async fn test_presigned_url() {
    let app = TestApp::default_app();

    let response = app
        .send(request(
            Method::POST,
            "/upload/presigned",
            Some(USER_TOKEN),
            Some(json!({ "filename": "banner.pdf", "file_type": "application/pdf" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let key = body["resource_key"].as_str().unwrap();
    assert!(key.starts_with(&format!("uploads/{}/", USER_ID)));
    assert!(key.ends_with(".pdf"));
    assert!(
        body["upload_url"]
            .as_str()
            .unwrap()
            .starts_with("http://localhost:9000/mock-bucket/")
    );
}

#[tokio::test]
async fn test_presigned_url_rejects_invalid_file() {
    let app = TestApp::default_app();

    let response = app
        .send(request(
            Method::POST,
            "/upload/presigned",
            Some(USER_TOKEN),
            Some(json!({ "filename": "", "file_type": "text/html" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json(response).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert!(body["fields"]["filename"].is_array());
    assert!(body["fields"]["file_type"].is_array());

    let malformed = Request::builder()
        .method(Method::POST)
        .uri("/upload/presigned")
        .header(header::COOKIE, format!("{}={}", ACCESS_TOKEN_COOKIE, USER_TOKEN))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.send(malformed).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(read_json(response).await["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_storage_failure_is_bad_gateway() {
    let app = TestApp::with_storage(
        default_auth(),
        default_repo(),
        MockStorageService::new_failing(),
    );

    let response = app
        .send(request(
            Method::POST,
            "/upload/presigned",
            Some(USER_TOKEN),
            Some(json!({ "filename": "banner.png", "file_type": "image/png" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(read_json(response).await["error"], "BACKEND_ERROR");
}

// --- Backend failures ---

#[tokio::test]
async fn test_database_failure_is_bad_gateway() {
    let app = TestApp::new(default_auth(), InMemoryRepository::failing(Failure::All));

    let response = app.send(get("/events", None)).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = read_json(response).await;
    assert_eq!(body["error"], "BACKEND_ERROR");
    // Backend details stay in the log.
    assert!(!body["message"].as_str().unwrap().contains("pool"));
}

#[tokio::test]
async fn test_categories_listing() {
    let category = Category {
        id: Uuid::new_v4(),
        name: "Talks".to_string(),
        ..Category::default()
    };
    let app = TestApp::new(default_auth(), default_repo().with_category(category));

    let response = app.send(get("/categories", None)).await;

    assert_eq!(read_json(response).await[0]["name"], "Talks");
}
