use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;
use serde_json::{json, Value};
use tower::ServiceExt;
use transportpro::config::{AuthConfig, PaymentsConfig, SubscriptionConfig};
use transportpro::marketplace::payments::{
    sign, CallbackEvent, Checkout, CheckoutRequest, FondyGateway, GatewayError, PaymentGateway,
};
use transportpro::marketplace::{marketplace_router, Marketplace, SharedClock, Stores};

const MERCHANT_PASSWORD: &str = "integration-secret";

#[derive(Clone)]
struct SteppingClock(Arc<Mutex<DateTime<Utc>>>);

impl SteppingClock {
    fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 5, 4, 8, 30, 0)
            .single()
            .expect("valid timestamp");
        Self(Arc::new(Mutex::new(start)))
    }

    fn advance(&self, by: Duration) {
        *self.0.lock().expect("clock lock") += by;
    }
}

impl Clock for SteppingClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock lock")
    }
}

/// Hosted checkout is stubbed; callbacks go through the real Fondy signature
/// check.
struct StubbedCheckout {
    fondy: FondyGateway,
}

#[async_trait]
impl PaymentGateway for StubbedCheckout {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<Checkout, GatewayError> {
        Ok(Checkout {
            checkout_url: format!("https://pay.fondy.test/merchants/{}", request.order_id),
        })
    }

    fn parse_callback(&self, payload: &Value) -> Result<CallbackEvent, GatewayError> {
        self.fondy.parse_callback(payload)
    }
}

fn payments_config() -> PaymentsConfig {
    PaymentsConfig {
        merchant_id: 1_396_424,
        merchant_password: MERCHANT_PASSWORD.to_string(),
        api_url: "https://pay.fondy.test/api".to_string(),
        currency: "UAH".to_string(),
        response_url: "http://localhost:3000/payment/success".to_string(),
        callback_url: "http://localhost:8001/api/payments/webhook".to_string(),
    }
}

fn app() -> (Router, SteppingClock) {
    let clock = SteppingClock::new();
    let shared: SharedClock = Arc::new(clock.clone());
    let gateway = StubbedCheckout {
        fondy: FondyGateway::new(payments_config()).expect("client builds"),
    };
    let auth = AuthConfig {
        jwt_secret: "integration-jwt".to_string(),
        token_ttl_hours: 24 * 90,
    };
    let marketplace = Marketplace::new(
        &auth,
        SubscriptionConfig::default(),
        Stores::in_memory(),
        Arc::new(gateway),
        shared,
    );
    (marketplace_router(marketplace), clock)
}

fn signed_callback(order_id: &str, status: &str) -> Value {
    let mut fields = BTreeMap::new();
    fields.insert("order_id".to_string(), json!(order_id));
    fields.insert("order_status".to_string(), json!(status));
    fields.insert("merchant_id".to_string(), json!(1_396_424));
    fields.insert("currency".to_string(), json!("UAH"));
    let signature = sign(MERCHANT_PASSWORD, fields.iter());
    fields.insert("signature".to_string(), json!(signature));
    json!({ "response": fields })
}

async fn call(
    router: &Router,
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
        Some(payload) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request builds");

    let response = router.clone().oneshot(request).await.expect("responds");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn register_and_login(router: &Router, email: &str, city: &str) -> String {
    let (status, _) = call(
        router,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "email": email,
            "password": "road-trip-2026",
            "name": "Integration Driver",
            "phone": "+380671234567",
            "city": city,
            "user_type": "driver"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        router,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": "road-trip-2026" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().expect("token").to_string()
}

fn refrigerated_truck() -> Value {
    json!({
        "vehicle_type": "cargo",
        "brand": "DAF",
        "model": "XF",
        "year": 2022,
        "capacity_tons": 20,
        "dimensions_length": 13.6,
        "price_per_km": 15,
        "description": "Refrigerated, ADR certified"
    })
}

#[tokio::test]
async fn paid_subscription_unlocks_publishing_until_it_lapses() {
    let (router, clock) = app();
    let token = register_and_login(&router, "kyiv.driver@example.com", "Kyiv").await;

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/vehicles",
        Some(&token),
        Some(refrigerated_truck()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Active subscription required to manage vehicles");

    let (status, checkout) = call(
        &router,
        Method::POST,
        "/api/payments/create",
        Some(&token),
        Some(json!({ "package_id": "basic" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let order_id = checkout["order_id"].as_str().expect("order id").to_string();

    let mut tampered = signed_callback(&order_id, "declined");
    tampered["response"]["order_status"] = json!("approved");
    let (status, _) = call(
        &router,
        Method::POST,
        "/api/payments/webhook",
        None,
        Some(tampered),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, receipt) = call(
        &router,
        Method::POST,
        "/api/payments/webhook",
        None,
        Some(signed_callback(&order_id, "approved")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["applied"], true);

    let (status, created) = call(
        &router,
        Method::POST,
        "/api/vehicles",
        Some(&token),
        Some(refrigerated_truck()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["driver_city"], "Kyiv");

    let (_, found) = call(
        &router,
        Method::GET,
        "/api/vehicles?vehicle_type=cargo&min_capacity=15&max_price=20&city=KYIV",
        None,
        None,
    )
    .await;
    assert_eq!(found.as_array().map(Vec::len), Some(1));

    clock.advance(Duration::days(31));
    let uri = format!("/api/vehicles/{}", created["id"].as_str().expect("id"));
    let (status, _) = call(
        &router,
        Method::PUT,
        &uri,
        Some(&token),
        Some(json!({ "available": false })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, mine) = call(&router, Method::GET, "/api/vehicles/my", Some(&token), None).await;
    assert_eq!(mine[0]["available"], true);
}

#[tokio::test]
async fn replayed_approval_does_not_extend_twice() {
    let (router, _clock) = app();
    let token = register_and_login(&router, "replay@example.com", "Lviv").await;

    let (_, checkout) = call(
        &router,
        Method::POST,
        "/api/payments/create",
        Some(&token),
        Some(json!({ "package_id": "enterprise" })),
    )
    .await;
    let order_id = checkout["order_id"].as_str().expect("order id").to_string();

    let mut expiries = Vec::new();
    for _ in 0..3 {
        let (status, _) = call(
            &router,
            Method::POST,
            "/api/payments/webhook",
            None,
            Some(signed_callback(&order_id, "approved")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, me) = call(&router, Method::GET, "/api/auth/me", Some(&token), None).await;
        expiries.push(me["subscription_expires"].clone());
    }

    assert!(expiries.iter().all(|expiry| expiry == &expiries[0]));
    assert_ne!(expiries[0], Value::Null);
}

#[tokio::test]
async fn unknown_package_leaves_no_order_behind() {
    let (router, _clock) = app();
    let token = register_and_login(&router, "nopackage@example.com", "Odesa").await;

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/payments/create",
        Some(&token),
        Some(json!({ "package_id": "lifetime" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Package not found");

    let (status, _) = call(
        &router,
        Method::POST,
        "/api/payments/webhook",
        None,
        Some(signed_callback("order_ffffffffffff", "approved")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
