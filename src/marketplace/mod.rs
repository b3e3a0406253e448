//! Vehicle listing marketplace: listings, search, subscription-gated
//! publishing and the payment flow that activates subscriptions.

pub mod catalog;
pub mod domain;
pub mod error;
pub mod gate;
pub mod identity;
pub mod listings;
pub mod memory;
pub mod payments;
pub mod repository;
pub mod router;
pub mod search;
pub mod stats;
pub mod vehicle;

#[cfg(test)]
pub(crate) mod tests;

use std::sync::Arc;

use axum::extract::FromRef;
use mockable::Clock;

use crate::config::{AuthConfig, SubscriptionConfig};
use catalog::PackageCatalog;
use gate::WriteLocks;
use identity::{AccountService, TokenService};
use listings::ListingService;
use memory::{InMemoryPaymentSessions, InMemoryUserDirectory, InMemoryVehicleRepository};
use payments::{PaymentGateway, SubscriptionService};
use repository::{PaymentSessionStore, UserDirectory, VehicleRepository};
use stats::StatsService;

pub use error::MarketplaceError;
pub use router::marketplace_router;

/// Time source shared by every service; tests swap in a fixture clock.
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Storage backends the services are wired against.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserDirectory>,
    pub vehicles: Arc<dyn VehicleRepository>,
    pub sessions: Arc<dyn PaymentSessionStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserDirectory::default()),
            vehicles: Arc::new(InMemoryVehicleRepository::default()),
            sessions: Arc::new(InMemoryPaymentSessions::default()),
        }
    }
}

/// Router state: one handle per service.
#[derive(Clone)]
pub struct Marketplace {
    pub accounts: Arc<AccountService>,
    pub listings: Arc<ListingService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub stats: Arc<StatsService>,
    pub catalog: Arc<PackageCatalog>,
}

impl Marketplace {
    pub fn new(
        auth: &AuthConfig,
        subscription_rules: SubscriptionConfig,
        stores: Stores,
        gateway: Arc<dyn PaymentGateway>,
        clock: SharedClock,
    ) -> Self {
        let locks = Arc::new(WriteLocks::default());
        let catalog = Arc::new(PackageCatalog::standard());

        let tokens = TokenService::new(auth, clock.clone());
        let accounts = AccountService::new(stores.users.clone(), tokens, clock.clone());
        let listings = ListingService::new(
            stores.vehicles.clone(),
            stores.users.clone(),
            locks.clone(),
            clock.clone(),
        );
        let subscriptions = SubscriptionService::new(
            stores.users.clone(),
            stores.sessions.clone(),
            gateway,
            catalog.clone(),
            locks,
            clock,
            subscription_rules,
        );
        let stats = StatsService::new(stores.users, stores.vehicles);

        Self {
            accounts: Arc::new(accounts),
            listings: Arc::new(listings),
            subscriptions: Arc::new(subscriptions),
            stats: Arc::new(stats),
            catalog,
        }
    }
}

impl FromRef<Marketplace> for Arc<AccountService> {
    fn from_ref(state: &Marketplace) -> Self {
        state.accounts.clone()
    }
}
