use super::domain::{OrderId, User, UserId, VehicleId};
use super::payments::PaymentSession;
use super::vehicle::Vehicle;

/// Listing storage. Returned collections are ordered by creation time, then id.
pub trait VehicleRepository: Send + Sync {
    fn insert(&self, vehicle: Vehicle) -> Result<Vehicle, RepositoryError>;
    fn update(&self, vehicle: Vehicle) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &VehicleId) -> Result<Option<Vehicle>, RepositoryError>;
    fn remove(&self, id: &VehicleId) -> Result<(), RepositoryError>;
    fn by_owner(&self, owner_id: &UserId) -> Result<Vec<Vehicle>, RepositoryError>;
    fn all(&self) -> Result<Vec<Vehicle>, RepositoryError>;
}

/// Account storage backing authentication, owner joins, and subscription state.
pub trait UserDirectory: Send + Sync {
    fn insert(&self, user: User) -> Result<User, RepositoryError>;
    fn update(&self, user: User) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    fn all(&self) -> Result<Vec<User>, RepositoryError>;
}

/// Payment session storage.
pub trait PaymentSessionStore: Send + Sync {
    fn insert(&self, session: PaymentSession) -> Result<PaymentSession, RepositoryError>;
    fn update(&self, session: PaymentSession) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &OrderId) -> Result<Option<PaymentSession>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

pub(crate) fn creation_order(left: &Vehicle, right: &Vehicle) -> std::cmp::Ordering {
    left.created_at
        .cmp(&right.created_at)
        .then_with(|| left.id.cmp(&right.id))
}
