use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;
use serde_json::Value;

use crate::config::{AuthConfig, SubscriptionConfig};
use crate::marketplace::domain::{OrderId, Role, Subscription, User, UserId};
use crate::marketplace::identity::{Principal, TokenService};
use crate::marketplace::memory::{
    InMemoryPaymentSessions, InMemoryUserDirectory, InMemoryVehicleRepository,
};
use crate::marketplace::payments::{
    CallbackEvent, Checkout, CheckoutRequest, GatewayError, PaymentGateway, PaymentOutcome,
};
use crate::marketplace::repository::UserDirectory;
use crate::marketplace::vehicle::VehicleInput;
use crate::marketplace::{Marketplace, SharedClock, Stores};

pub(crate) const TRUSTED_SIGNATURE: &str = "trusted";

/// Settable clock shared between a test and the services under test.
#[derive(Clone)]
pub(crate) struct MutableClock(Arc<Mutex<DateTime<Utc>>>);

impl MutableClock {
    pub(crate) fn at(now: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(now)))
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock mutex poisoned")
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut guard = self.0.lock().expect("clock mutex poisoned");
        *guard += by;
    }
}

impl Default for MutableClock {
    fn default() -> Self {
        Self::at(start_time())
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.now().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.now()
    }
}

pub(crate) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GatewayMode {
    Approve,
    Reject(String),
    Unreachable,
}

/// Fake gateway that records checkout requests. Callbacks are trusted when
/// they carry [`TRUSTED_SIGNATURE`].
pub(crate) struct RecordingGateway {
    mode: Mutex<GatewayMode>,
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self {
            mode: Mutex::new(GatewayMode::Approve),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingGateway {
    pub(crate) fn set_mode(&self, mode: GatewayMode) {
        *self.mode.lock().expect("mode mutex poisoned") = mode;
    }

    pub(crate) fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().expect("requests mutex poisoned").clone()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<Checkout, GatewayError> {
        let order_id = request.order_id.clone();
        self.requests
            .lock()
            .expect("requests mutex poisoned")
            .push(request);
        let mode = self.mode.lock().expect("mode mutex poisoned").clone();
        match mode {
            GatewayMode::Approve => Ok(Checkout {
                checkout_url: format!("https://pay.test/checkout/{order_id}"),
            }),
            GatewayMode::Reject(message) => Err(GatewayError::Rejected(message)),
            GatewayMode::Unreachable => Err(GatewayError::Transport("connection refused".into())),
        }
    }

    fn parse_callback(&self, payload: &Value) -> Result<CallbackEvent, GatewayError> {
        let body = payload.get("response").unwrap_or(payload);
        let order_id = body
            .get("order_id")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::MalformedCallback("missing order_id".into()))?;
        if body.get("signature").and_then(Value::as_str) != Some(TRUSTED_SIGNATURE) {
            return Err(GatewayError::InvalidSignature);
        }
        let status = body
            .get("order_status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let outcome = match status.as_str() {
            "approved" => Some(PaymentOutcome::Confirmed),
            "declined" | "expired" | "reversed" => Some(PaymentOutcome::Failed),
            _ => None,
        };
        Ok(CallbackEvent {
            order_id: OrderId::from(order_id),
            provider_status: status,
            outcome,
        })
    }
}

pub(crate) fn callback(order_id: &OrderId, status: &str) -> Value {
    serde_json::json!({
        "response": {
            "order_id": order_id.as_str(),
            "order_status": status,
            "signature": TRUSTED_SIGNATURE,
        }
    })
}

pub(crate) fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-secret".to_string(),
        token_ttl_hours: 24,
    }
}

/// Handles a test keeps on the stores and fakes behind a [`Marketplace`].
pub(crate) struct Fixture {
    pub(crate) clock: MutableClock,
    pub(crate) gateway: Arc<RecordingGateway>,
    pub(crate) users: Arc<InMemoryUserDirectory>,
    pub(crate) vehicles: Arc<InMemoryVehicleRepository>,
    pub(crate) sessions: Arc<InMemoryPaymentSessions>,
    tokens: TokenService,
}

impl Fixture {
    pub(crate) fn seed_user(
        &self,
        email: &str,
        role: Role,
        expires_at: Option<DateTime<Utc>>,
    ) -> User {
        let user = User {
            id: UserId::generate(),
            email: email.to_string(),
            name: format!("{} owner", email.split('@').next().unwrap_or(email)),
            phone: "+380441234567".to_string(),
            city: "Kyiv".to_string(),
            role,
            password_hash: String::new(),
            created_at: self.clock.now(),
            subscription: Subscription {
                expires_at,
                ..Subscription::default()
            },
        };
        self.users.insert(user).expect("seed user")
    }

    /// Driver whose subscription runs for another 30 days.
    pub(crate) fn subscribed_driver(&self, email: &str) -> User {
        self.seed_user(email, Role::Driver, Some(self.clock.now() + Duration::days(30)))
    }

    pub(crate) fn bearer(&self, user: &User) -> String {
        format!("Bearer {}", self.tokens.issue(user).expect("token issues"))
    }

    pub(crate) fn user(&self, id: &UserId) -> User {
        self.users
            .fetch(id)
            .expect("directory available")
            .expect("user exists")
    }
}

pub(crate) fn principal(user: &User) -> Principal {
    Principal {
        user_id: user.id.clone(),
        email: user.email.clone(),
        role: user.role,
    }
}

pub(crate) fn marketplace() -> (Marketplace, Fixture) {
    marketplace_with(SubscriptionConfig::default())
}

pub(crate) fn marketplace_with(rules: SubscriptionConfig) -> (Marketplace, Fixture) {
    let clock = MutableClock::default();
    let shared: SharedClock = Arc::new(clock.clone());
    let gateway = Arc::new(RecordingGateway::default());
    let users = Arc::new(InMemoryUserDirectory::default());
    let vehicles = Arc::new(InMemoryVehicleRepository::default());
    let sessions = Arc::new(InMemoryPaymentSessions::default());

    let stores = Stores {
        users: users.clone(),
        vehicles: vehicles.clone(),
        sessions: sessions.clone(),
    };
    let marketplace = Marketplace::new(
        &auth_config(),
        rules,
        stores,
        gateway.clone(),
        shared.clone(),
    );
    let fixture = Fixture {
        clock,
        gateway,
        users,
        vehicles,
        sessions,
        tokens: TokenService::new(&auth_config(), shared),
    };
    (marketplace, fixture)
}

pub(crate) fn cargo_input(capacity_tons: f64, price_per_km: f64) -> VehicleInput {
    VehicleInput {
        vehicle_type: "cargo".to_string(),
        brand: "MAN".to_string(),
        model: "TGX".to_string(),
        year: 2019,
        capacity_tons: Some(capacity_tons),
        dimensions_length: Some(13.6),
        dimensions_width: Some(2.45),
        dimensions_height: Some(2.7),
        passenger_seats: None,
        description: "Curtain-side semi trailer".to_string(),
        price_per_km,
        available: true,
        images: vec!["https://cdn.test/man.jpg".to_string()],
    }
}

pub(crate) fn passenger_input(seats: i64, price_per_km: f64) -> VehicleInput {
    VehicleInput {
        vehicle_type: "passenger".to_string(),
        brand: "Mercedes-Benz".to_string(),
        model: "Sprinter".to_string(),
        year: 2021,
        capacity_tons: None,
        dimensions_length: None,
        dimensions_width: None,
        dimensions_height: None,
        passenger_seats: Some(seats),
        description: "Minibus with luggage space".to_string(),
        price_per_km,
        available: true,
        images: Vec::new(),
    }
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
