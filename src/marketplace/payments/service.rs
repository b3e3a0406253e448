use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::gateway::{CheckoutRequest, PaymentGateway};
use super::session::{PaymentSession, PaymentStatus, Transition};
use crate::config::SubscriptionConfig;
use crate::marketplace::catalog::PackageCatalog;
use crate::marketplace::domain::{OrderId, PackageId, SubscriptionView, User, UserId};
use crate::marketplace::error::MarketplaceError;
use crate::marketplace::gate::WriteLocks;
use crate::marketplace::repository::{PaymentSessionStore, UserDirectory};
use crate::marketplace::SharedClock;

/// Returned to the client that started a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentInitiation {
    pub checkout_url: String,
    pub order_id: OrderId,
}

/// Acknowledgement for a processed gateway callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackReceipt {
    pub order_id: OrderId,
    pub status: PaymentStatus,
    /// False when the callback repeated or contradicted a settled session.
    pub applied: bool,
}

/// Demo grant response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemoActivation {
    pub message: String,
    pub expires: DateTime<Utc>,
    pub subscription: SubscriptionView,
}

/// Moves accounts between subscription states: demo grants, checkout
/// initiation and gateway confirmation.
pub struct SubscriptionService {
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn PaymentSessionStore>,
    gateway: Arc<dyn PaymentGateway>,
    catalog: Arc<PackageCatalog>,
    locks: Arc<WriteLocks>,
    clock: SharedClock,
    config: SubscriptionConfig,
}

impl SubscriptionService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn PaymentSessionStore>,
        gateway: Arc<dyn PaymentGateway>,
        catalog: Arc<PackageCatalog>,
        locks: Arc<WriteLocks>,
        clock: SharedClock,
        config: SubscriptionConfig,
    ) -> Self {
        Self {
            users,
            sessions,
            gateway,
            catalog,
            locks,
            clock,
            config,
        }
    }

    fn load_user(&self, user_id: &UserId) -> Result<User, MarketplaceError> {
        self.users
            .fetch(user_id)?
            .ok_or_else(|| MarketplaceError::unauthorized("User not found"))
    }

    /// Grants a free period once per account.
    pub fn activate_demo(&self, user_id: &UserId) -> Result<DemoActivation, MarketplaceError> {
        if !self.config.demo_activation {
            return Err(MarketplaceError::forbidden("Demo activation is disabled"));
        }

        self.locks.with_user(user_id, || {
            let mut user = self.load_user(user_id)?;
            if user.subscription.demo_granted_at.is_some() {
                return Err(MarketplaceError::forbidden(
                    "Demo subscription has already been used",
                ));
            }

            let now = self.clock.utc();
            let demo_expiry = now + Duration::days(self.config.demo_period_days);
            let expires = match user.subscription.expires_at {
                Some(current) if current > demo_expiry => current,
                _ => {
                    user.subscription.package_id = None;
                    demo_expiry
                }
            };
            user.subscription.expires_at = Some(expires);
            user.subscription.demo_granted_at = Some(now);
            let subscription = user.subscription.view(now);
            self.users.update(user)?;

            info!(user_id = %user_id, %expires, "demo subscription granted");
            Ok(DemoActivation {
                message: "Demo subscription activated".to_string(),
                expires,
                subscription,
            })
        })
    }

    /// Opens a pending session and asks the gateway for a hosted checkout page.
    pub async fn create_payment(
        &self,
        user_id: &UserId,
        package_id: &PackageId,
    ) -> Result<PaymentInitiation, MarketplaceError> {
        let package = self
            .catalog
            .find(package_id)
            .cloned()
            .ok_or_else(|| MarketplaceError::not_found("Package not found"))?;
        let user = self.load_user(user_id)?;

        let now = self.clock.utc();
        let mut session = PaymentSession::pending(OrderId::generate(), user.id, &package, now);
        self.sessions.insert(session.clone())?;
        info!(
            order_id = %session.id,
            user_id = %session.user_id,
            package_id = %package.id,
            amount = session.amount,
            "payment session opened"
        );

        let request = CheckoutRequest {
            order_id: session.id.clone(),
            amount: session.amount,
            description: format!("TransportPro - {} subscription", package.name),
        };
        match self.gateway.create_checkout(request).await {
            Ok(checkout) => {
                session.checkout_url = Some(checkout.checkout_url.clone());
                session.updated_at = self.clock.utc();
                let order_id = session.id.clone();
                self.sessions.update(session)?;
                Ok(PaymentInitiation {
                    checkout_url: checkout.checkout_url,
                    order_id,
                })
            }
            Err(err) => {
                warn!(order_id = %session.id, error = %err, "checkout initiation failed");
                session.abandon(err.to_string(), self.clock.utc());
                self.sessions.update(session)?;
                Err(err.into())
            }
        }
    }

    /// Applies a gateway callback. Repeated or conflicting callbacks for a
    /// settled session change nothing.
    pub fn handle_callback(&self, payload: &Value) -> Result<CallbackReceipt, MarketplaceError> {
        let event = self.gateway.parse_callback(payload)?;
        let session = self
            .sessions
            .fetch(&event.order_id)?
            .ok_or_else(|| MarketplaceError::not_found("Order not found"))?;

        let Some(outcome) = event.outcome else {
            debug!(
                order_id = %event.order_id,
                provider_status = %event.provider_status,
                "non-final payment status"
            );
            return Ok(CallbackReceipt {
                order_id: session.id,
                status: session.status,
                applied: false,
            });
        };

        self.locks.with_user(&session.user_id, || {
            // Re-read under the lock; a concurrent callback may have settled it.
            let mut session = self
                .sessions
                .fetch(&event.order_id)?
                .ok_or_else(|| MarketplaceError::not_found("Order not found"))?;
            let now = self.clock.utc();

            match session.resolve(outcome, now) {
                Transition::AlreadySettled(status) => {
                    info!(
                        order_id = %session.id,
                        settled = status.label(),
                        provider_status = %event.provider_status,
                        "callback for settled session ignored"
                    );
                    Ok(CallbackReceipt {
                        order_id: session.id,
                        status,
                        applied: false,
                    })
                }
                Transition::Applied(PaymentStatus::Confirmed) => {
                    let package = self.catalog.find(&session.package_id).ok_or_else(|| {
                        MarketplaceError::Internal(format!(
                            "session {} references unknown package {}",
                            session.id, session.package_id
                        ))
                    })?;
                    let mut user = self.load_user(&session.user_id)?;
                    let expires = user.subscription.extend(
                        now,
                        package.duration_days,
                        Some(package.id.clone()),
                    );
                    let order_id = session.id.clone();
                    self.sessions.update(session)?;
                    self.users.update(user)?;
                    info!(%order_id, %expires, "subscription extended");
                    Ok(CallbackReceipt {
                        order_id,
                        status: PaymentStatus::Confirmed,
                        applied: true,
                    })
                }
                Transition::Applied(status) => {
                    let order_id = session.id.clone();
                    self.sessions.update(session)?;
                    info!(%order_id, provider_status = %event.provider_status, "payment failed");
                    Ok(CallbackReceipt {
                        order_id,
                        status,
                        applied: true,
                    })
                }
            }
        })
    }

    /// Session lookup scoped to the account that opened it.
    pub fn session_for(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
    ) -> Result<PaymentSession, MarketplaceError> {
        self.sessions
            .fetch(order_id)?
            .filter(|session| &session.user_id == user_id)
            .ok_or_else(|| MarketplaceError::not_found("Order not found"))
    }
}
