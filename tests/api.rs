use actix_web::http::StatusCode;
use actix_web::{get, test, web, App, HttpResponse};
use chrono::NaiveDate;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use rde_roster::handlers;
use rde_roster::kafka::{DummyKafkaProducer, KafkaProducer};
use rde_roster::middleware::{RequestLogger, REQUEST_ID_HEADER};
use rde_roster::models::{UserAccount, UserLevel};
use rde_roster::services::AuthService;
use rde_roster::{AppConfig, DbPool, Notifier, Requester};

fn config() -> AppConfig {
    AppConfig {
        jwt_secret: "integration-secret-0123456789".to_string(),
        jwt_expiry: 1,
        refresh_expiry: 1,
        otp_step_secs: 300,
        media_root: std::env::temp_dir().join("rde-roster-api-tests"),
        max_upload_bytes: 1024,
        web_app_url: "http://localhost:3000".to_string(),
        email_from: "tests@rde-roster.local".to_string(),
    }
}

// Never connects: these routes fail before reaching the database.
fn unused_pool() -> DbPool {
    Pool::builder()
        .connection_timeout(Duration::from_millis(100))
        .build_unchecked(ConnectionManager::<PgConnection>::new(
            "postgres://nobody@127.0.0.1:1/none",
        ))
}

fn account(is_staff: bool, level: UserLevel, region: Option<i32>) -> UserAccount {
    UserAccount {
        id: 41,
        username: "wanjiru".to_string(),
        email: "wanjiru@example.org".to_string(),
        password_hash: String::new(),
        first_name: Some("Wanjiru".to_string()),
        last_name: None,
        phone_number: None,
        staff_number: None,
        level,
        is_staff,
        is_superuser: false,
        is_active: true,
        email_verified: true,
        attached_region_id: region,
        otp: None,
        otp_used: false,
        otp_issued_at: None,
        otp_attempts: 0,
        last_login: None,
        date_joined: NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap(),
    }
}

fn bearer(user: &UserAccount, country: Option<i32>) -> (&'static str, String) {
    let token = AuthService::generate_token(user, country, &config()).unwrap();
    ("Authorization", format!("Bearer {}", token))
}

#[get("/whoami")]
async fn whoami(requester: Requester) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "user_id": requester.user_id,
        "username": requester.username,
        "level": requester.level,
        "is_admin": requester.is_admin(),
        "attached_country_id": requester.attached_country_id,
    }))
}

macro_rules! app {
    () => {{
        let notifier = Notifier::new(
            Arc::new(KafkaProducer::Dummy(DummyKafkaProducer::new())),
            &config(),
        );
        test::init_service(
            App::new()
                .wrap(RequestLogger)
                .app_data(web::Data::new(unused_pool()))
                .app_data(web::Data::new(config()))
                .app_data(web::Data::new(notifier))
                .service(whoami)
                .configure(handlers::configure),
        )
        .await
    }};
}

#[actix_web::test]
async fn health_reports_ok_and_tags_request_id() {
    let app = app!();
    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key(REQUEST_ID_HEADER));
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn caller_request_id_is_echoed() {
    let app = app!();
    let req = test::TestRequest::get()
        .uri("/api/health")
        .insert_header((REQUEST_ID_HEADER, "trace-42"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get(REQUEST_ID_HEADER).unwrap(), "trace-42");
}

#[actix_web::test]
async fn missing_bearer_token_is_unauthorized() {
    let app = app!();
    for uri in ["/api/fetch_stats", "/api/profile", "/api/deployment", "/api/users"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[actix_web::test]
async fn invalid_bearer_token_is_unauthorized() {
    let app = app!();
    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", "Bearer not-a-jwt"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().is_some());
}

#[actix_web::test]
async fn token_signed_with_another_secret_is_rejected() {
    let app = app!();
    let mut other = config();
    other.jwt_secret = "some-other-secret-abcdefghijkl".to_string();
    let token = AuthService::generate_token(&account(false, UserLevel::Rde, None), None, &other).unwrap();

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn requester_carries_token_claims() {
    let app = app!();
    let staff = account(true, UserLevel::Country, Some(3));
    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(bearer(&staff, Some(2)))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["user_id"], 41);
    assert_eq!(body["username"], "wanjiru");
    assert_eq!(body["level"], "country");
    assert_eq!(body["is_admin"], true);
    assert_eq!(body["attached_country_id"], 2);
}

#[actix_web::test]
async fn non_staff_cannot_change_reference_data() {
    let app = app!();
    let rde = account(false, UserLevel::Rde, None);
    let req = test::TestRequest::post()
        .uri("/api/country")
        .insert_header(bearer(&rde, None))
        .set_json(json!({ "name": "Atlantis", "phone_code": "+999" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn non_staff_cannot_create_outbreaks() {
    let app = app!();
    let rde = account(false, UserLevel::Rde, None);
    let req = test::TestRequest::post()
        .uri("/api/outbreak")
        .insert_header(bearer(&rde, None))
        .set_json(json!({
            "name": "Marburg",
            "description": "Regional response",
            "severity": "severe",
            "start_date": "2024-03-01"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn owner_may_only_answer_a_deployment() {
    let app = app!();
    let rde = account(false, UserLevel::Rde, None);
    let req = test::TestRequest::patch()
        .uri("/api/deployment/9")
        .insert_header(bearer(&rde, None))
        .set_json(json!({ "status": "deployed" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn staff_without_region_cannot_list_profiles() {
    let app = app!();
    let staff = account(true, UserLevel::Country, None);
    let req = test::TestRequest::get()
        .uri("/api/profile")
        .insert_header(bearer(&staff, None))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn out_of_range_page_is_a_bad_request() {
    let app = app!();
    let staff = account(true, UserLevel::Country, Some(3));
    let req = test::TestRequest::get()
        .uri("/api/profile?page=9223372036854775807&page_size=100")
        .insert_header(bearer(&staff, Some(2)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unknown_route_is_not_found() {
    let app = app!();
    let req = test::TestRequest::get().uri("/api/nothing-here").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
