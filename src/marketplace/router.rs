use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::domain::{OrderId, PackageId, VehicleId};
use super::error::MarketplaceError;
use super::identity::{Credentials, Principal, Registration};
use super::search::SearchParams;
use super::vehicle::{ValidationError, VehicleInput, VehiclePatch};
use super::Marketplace;

/// Marketplace endpoints mounted under `/api`.
pub fn marketplace_router(state: Marketplace) -> Router {
    Router::new()
        .route("/api/", get(root_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/me", get(me_handler))
        .route("/api/vehicles", get(search_handler).post(create_vehicle_handler))
        .route("/api/vehicles/my", get(my_vehicles_handler))
        .route(
            "/api/vehicles/:vehicle_id",
            get(get_vehicle_handler)
                .put(update_vehicle_handler)
                .delete(delete_vehicle_handler),
        )
        .route("/api/packages", get(packages_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/demo/activate-subscription", post(demo_handler))
        .route("/api/payments/create", post(create_payment_handler))
        .route("/api/payments/webhook", post(webhook_handler))
        .route("/api/payments/:order_id", get(payment_status_handler))
        .with_state(state)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, MarketplaceError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ValidationError::new("body", rejection.body_text()).into())
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, MarketplaceError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| ValidationError::new("query", rejection.body_text()).into())
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentRequest {
    package_id: PackageId,
}

pub(crate) async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "TransportPro API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub(crate) async fn register_handler(
    State(state): State<Marketplace>,
    payload: Result<Json<Registration>, JsonRejection>,
) -> Result<impl IntoResponse, MarketplaceError> {
    let view = state.accounts.register(body(payload)?)?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub(crate) async fn login_handler(
    State(state): State<Marketplace>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, MarketplaceError> {
    let response = state.accounts.login(body(payload)?)?;
    Ok(Json(response))
}

pub(crate) async fn me_handler(
    State(state): State<Marketplace>,
    principal: Principal,
) -> Result<impl IntoResponse, MarketplaceError> {
    Ok(Json(state.accounts.current(&principal)?))
}

pub(crate) async fn search_handler(
    State(state): State<Marketplace>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<impl IntoResponse, MarketplaceError> {
    let (criteria, page) = query(params)?.into_query()?;
    Ok(Json(state.listings.search(&criteria, page)?))
}

pub(crate) async fn create_vehicle_handler(
    State(state): State<Marketplace>,
    principal: Principal,
    payload: Result<Json<VehicleInput>, JsonRejection>,
) -> Result<impl IntoResponse, MarketplaceError> {
    // The gate runs before the body is looked at, so an inactive
    // subscription wins over a malformed payload.
    let input = match payload {
        Ok(Json(input)) => input,
        Err(rejection) => {
            state.listings.ensure_can_publish(&principal)?;
            return Err(ValidationError::new("body", rejection.body_text()).into());
        }
    };
    let view = state.listings.create(&principal, input)?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub(crate) async fn my_vehicles_handler(
    State(state): State<Marketplace>,
    principal: Principal,
) -> Result<impl IntoResponse, MarketplaceError> {
    Ok(Json(state.listings.list_by_owner(&principal)?))
}

pub(crate) async fn get_vehicle_handler(
    State(state): State<Marketplace>,
    Path(vehicle_id): Path<String>,
) -> Result<impl IntoResponse, MarketplaceError> {
    Ok(Json(state.listings.get(&VehicleId(vehicle_id))?))
}

pub(crate) async fn update_vehicle_handler(
    State(state): State<Marketplace>,
    principal: Principal,
    Path(vehicle_id): Path<String>,
    payload: Result<Json<VehiclePatch>, JsonRejection>,
) -> Result<impl IntoResponse, MarketplaceError> {
    let vehicle_id = VehicleId(vehicle_id);
    let patch = match payload {
        Ok(Json(patch)) => patch,
        Err(rejection) => {
            state.listings.ensure_can_modify(&principal, &vehicle_id)?;
            return Err(ValidationError::new("body", rejection.body_text()).into());
        }
    };
    let view = state.listings.update(&principal, &vehicle_id, patch)?;
    Ok(Json(view))
}

pub(crate) async fn delete_vehicle_handler(
    State(state): State<Marketplace>,
    principal: Principal,
    Path(vehicle_id): Path<String>,
) -> Result<impl IntoResponse, MarketplaceError> {
    state.listings.delete(&principal, &VehicleId(vehicle_id))?;
    Ok(Json(json!({ "message": "Vehicle deleted" })))
}

pub(crate) async fn packages_handler(State(state): State<Marketplace>) -> impl IntoResponse {
    Json(state.catalog.packages().to_vec())
}

pub(crate) async fn stats_handler(
    State(state): State<Marketplace>,
) -> Result<impl IntoResponse, MarketplaceError> {
    Ok(Json(state.stats.compute()?))
}

pub(crate) async fn demo_handler(
    State(state): State<Marketplace>,
    principal: Principal,
) -> Result<impl IntoResponse, MarketplaceError> {
    Ok(Json(state.subscriptions.activate_demo(&principal.user_id)?))
}

pub(crate) async fn create_payment_handler(
    State(state): State<Marketplace>,
    principal: Principal,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MarketplaceError> {
    let request = body(payload)?;
    let initiation = state
        .subscriptions
        .create_payment(&principal.user_id, &request.package_id)
        .await?;
    Ok(Json(initiation))
}

pub(crate) async fn webhook_handler(
    State(state): State<Marketplace>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, MarketplaceError> {
    let payload = body(payload)?;
    let receipt = state.subscriptions.handle_callback(&payload)?;
    Ok(Json(json!({
        "status": "success",
        "order_id": receipt.order_id,
        "payment_status": receipt.status,
        "applied": receipt.applied,
    })))
}

pub(crate) async fn payment_status_handler(
    State(state): State<Marketplace>,
    principal: Principal,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, MarketplaceError> {
    let session = state
        .subscriptions
        .session_for(&principal.user_id, &OrderId(order_id))?;
    Ok(Json(session))
}
