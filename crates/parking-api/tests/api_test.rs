//! HTTP tests for the parking API
//!
//! Routes run against the in-memory store and a manual clock, so fares and
//! daily windows are deterministic.

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use chrono::{Duration, TimeZone, Utc};
use parking_api::{configure, json_config, query_config};
use parking_auth::{JwtService, Role};
use parking_core::config::InventoryConfig;
use parking_db::MemoryStore;
use parking_services::{EngineSettings, ManualClock, ParkingEngine};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;

const SECRET: &str = "test-secret-key-for-api-tests";

struct Harness {
    engine: Arc<ParkingEngine<MemoryStore>>,
    clock: Arc<ManualClock>,
    jwt: Arc<JwtService>,
}

impl Harness {
    async fn new(standard: u32, pmr: u32) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        ));
        let engine = ParkingEngine::new(
            Arc::new(MemoryStore::new()),
            EngineSettings::default(),
            clock.clone(),
        );
        engine
            .bootstrap(&InventoryConfig {
                standard_places: standard,
                pmr_places: pmr,
                subscriber_rate: Some(dec!(2.0)),
                non_subscriber_rate: Some(dec!(5.0)),
            })
            .await
            .unwrap();

        Self {
            engine: Arc::new(engine),
            clock,
            jwt: Arc::new(JwtService::new(SECRET, 3600)),
        }
    }

    fn bearer(&self, role: Role) -> (&'static str, String) {
        let token = self.jwt.create_token_for_user("operator", role).unwrap();
        ("Authorization", format!("Bearer {}", token))
    }
}

macro_rules! app {
    ($h:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::from($h.engine.clone()))
                .app_data(web::Data::new($h.jwt.clone()))
                .app_data(query_config())
                .app_data(json_config())
                .configure(configure::<MemoryStore>),
        )
        .await
    };
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}

fn entry(phone: &str) -> Value {
    json!({ "surname": "Martin", "given_name": "Paul", "phone": phone })
}

#[actix_rt::test]
async fn test_health_needs_no_token() {
    let h = Harness::new(1, 0).await;
    let app = app!(h);

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_rt::test]
async fn test_missing_or_bad_token_is_401() {
    let h = Harness::new(1, 0).await;
    let app = app!(h);

    let req = test::TestRequest::get().uri("/api/v1/statistics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/v1/statistics")
        .insert_header(("Authorization", "Bearer not-a-token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_agent_cannot_update_tariffs() {
    let h = Harness::new(1, 0).await;
    let app = app!(h);
    let body = json!({ "subscriber_rate": "1.50", "non_subscriber_rate": "4.00" });

    let req = test::TestRequest::put()
        .uri("/api/v1/tariffs")
        .insert_header(h.bearer(Role::Agent))
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::put()
        .uri("/api/v1/tariffs")
        .insert_header(h.bearer(Role::Admin))
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(decimal(&body["data"]["subscriber"]["hourly_rate"]), dec!(1.5));
    assert_eq!(body["data"]["non_subscriber"]["version"], 2);
}

#[actix_rt::test]
async fn test_invalid_tariff_is_rejected() {
    let h = Harness::new(1, 0).await;
    let app = app!(h);

    let req = test::TestRequest::put()
        .uri("/api/v1/tariffs")
        .insert_header(h.bearer(Role::Admin))
        .set_json(json!({ "subscriber_rate": "0", "non_subscriber_rate": "4.00" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_rate");

    let current = h.engine.current_tariffs().await.unwrap();
    assert_eq!(current.subscriber.hourly_rate, dec!(2.0));
}

#[actix_rt::test]
async fn test_entry_exit_flow() {
    let h = Harness::new(2, 0).await;
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/api/v1/tickets")
        .insert_header(h.bearer(Role::Agent))
        .set_json(entry("0600000001"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    let ticket_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["status"], "open");
    assert_eq!(body["data"]["place_number"], 1);

    h.clock.advance(Duration::minutes(150));

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/tickets/{}/close", ticket_id))
        .insert_header(h.bearer(Role::Agent))
        .set_json(json!({ "mode": "card" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(decimal(&body["data"]["amount"]), dec!(15));
    assert_eq!(body["data"]["duration_minutes"], 150);
    assert_eq!(body["data"]["mode"], "card");

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/tickets/{}/close", ticket_id))
        .insert_header(h.bearer(Role::Agent))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "already_closed");
    assert_eq!(body["kind"], "conflict");

    let req = test::TestRequest::get()
        .uri("/api/v1/statistics")
        .insert_header(h.bearer(Role::Agent))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["valid_payments"], 1);
    assert_eq!(body["data"]["occupied_places"], 0);
    assert_eq!(decimal(&body["data"]["daily_revenue"]), dec!(15));
}

#[actix_rt::test]
async fn test_full_car_park_is_503() {
    let h = Harness::new(1, 0).await;
    let app = app!(h);

    for (phone, expected) in [
        ("0600000010", StatusCode::CREATED),
        ("0600000011", StatusCode::SERVICE_UNAVAILABLE),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/v1/tickets")
            .insert_header(h.bearer(Role::Agent))
            .set_json(entry(phone))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), expected);
    }
}

#[actix_rt::test]
async fn test_bad_entry_body_is_400() {
    let h = Harness::new(1, 0).await;
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/api/v1/tickets")
        .insert_header(h.bearer(Role::Agent))
        .set_json(json!({ "surname": "Martin", "given_name": "Paul", "phone": "" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/v1/tickets")
        .insert_header(h.bearer(Role::Agent))
        .set_json(json!({ "surname": "Martin" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_subscription_by_identity_is_idempotent() {
    let h = Harness::new(1, 0).await;
    let app = app!(h);
    let body = json!({
        "surname": "Bernard",
        "given_name": "Lea",
        "phone": "0600000020",
        "since": "2024-02-01"
    });

    let req = test::TestRequest::post()
        .uri("/api/v1/subscriptions")
        .insert_header(h.bearer(Role::Agent))
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let first: Value = test::read_body_json(resp).await;
    assert_eq!(first["data"]["created"], true);
    assert_eq!(first["data"]["subscription"]["since"], "2024-02-01");

    let req = test::TestRequest::post()
        .uri("/api/v1/subscriptions")
        .insert_header(h.bearer(Role::Agent))
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let second: Value = test::read_body_json(resp).await;
    assert_eq!(second["data"]["created"], false);
    assert_eq!(
        second["data"]["subscription"]["id"],
        first["data"]["subscription"]["id"]
    );

    let req = test::TestRequest::get()
        .uri("/api/v1/subscriptions?active=true")
        .insert_header(h.bearer(Role::Agent))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[actix_rt::test]
async fn test_client_crud() {
    let h = Harness::new(1, 0).await;
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/api/v1/clients")
        .insert_header(h.bearer(Role::Agent))
        .set_json(json!({ "surname": "Petit", "given_name": "Marc", "phone": "0600000030", "pmr": true }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["mobility"], "pmr");

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/clients/{}", id))
        .insert_header(h.bearer(Role::Agent))
        .set_json(json!({ "surname": "Petit", "given_name": "Marc", "phone": "0600000031" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["phone"], "0600000031");
    assert_eq!(body["data"]["mobility"], "standard");

    let req = test::TestRequest::get()
        .uri("/api/v1/clients?page=1&per_page=10")
        .insert_header(h.bearer(Role::Agent))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["pagination"]["total"], 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/clients/{}", id))
        .insert_header(h.bearer(Role::Agent))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/clients/{}", id))
        .insert_header(h.bearer(Role::Agent))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_ticket_listing_and_places() {
    let h = Harness::new(2, 1).await;
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/api/v1/tickets")
        .insert_header(h.bearer(Role::Agent))
        .set_json(json!({ "surname": "Roux", "given_name": "Ana", "phone": "0600000040", "pmr": true }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/api/v1/places/available?type=pmr")
        .insert_header(h.bearer(Role::Agent))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let req = test::TestRequest::get()
        .uri("/api/v1/places/available")
        .insert_header(h.bearer(Role::Agent))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::get()
        .uri("/api/v1/tickets?open=true&from=2024-03-01&to=2024-03-01")
        .insert_header(h.bearer(Role::Agent))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["place_type"], "pmr");

    let req = test::TestRequest::get()
        .uri("/api/v1/tickets?from=2024-03-02&to=2024-03-01")
        .insert_header(h.bearer(Role::Agent))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/v1/places?type=bogus")
        .insert_header(h.bearer(Role::Agent))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_out_of_range_page_is_400() {
    let h = Harness::new(1, 0).await;
    let app = app!(h);

    for uri in [
        "/api/v1/clients?page=9223372036854775807",
        "/api/v1/tickets?page=9223372036854775807",
        "/api/v1/payments?page=9223372036854775807&per_page=1000",
    ] {
        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header(h.bearer(Role::Agent))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "validation_error");
    }
}
