//! Process-local stores used by the HTTP service and the test suites.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{OrderId, User, UserId, VehicleId};
use super::payments::PaymentSession;
use super::repository::{
    creation_order, PaymentSessionStore, RepositoryError, UserDirectory, VehicleRepository,
};
use super::vehicle::Vehicle;

fn lock<'a, T>(mutex: &'a Mutex<T>, store: &str) -> Result<MutexGuard<'a, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable(format!("{store} mutex poisoned")))
}

#[derive(Default, Clone)]
pub struct InMemoryVehicleRepository {
    records: Arc<Mutex<HashMap<VehicleId, Vehicle>>>,
}

impl VehicleRepository for InMemoryVehicleRepository {
    fn insert(&self, vehicle: Vehicle) -> Result<Vehicle, RepositoryError> {
        let mut guard = lock(&self.records, "vehicle")?;
        if guard.contains_key(&vehicle.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(vehicle.id.clone(), vehicle.clone());
        Ok(vehicle)
    }

    fn update(&self, vehicle: Vehicle) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.records, "vehicle")?;
        match guard.get_mut(&vehicle.id) {
            Some(slot) => {
                *slot = vehicle;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &VehicleId) -> Result<Option<Vehicle>, RepositoryError> {
        let guard = lock(&self.records, "vehicle")?;
        Ok(guard.get(id).cloned())
    }

    fn remove(&self, id: &VehicleId) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.records, "vehicle")?;
        guard
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn by_owner(&self, owner_id: &UserId) -> Result<Vec<Vehicle>, RepositoryError> {
        let guard = lock(&self.records, "vehicle")?;
        let mut owned: Vec<Vehicle> = guard
            .values()
            .filter(|vehicle| &vehicle.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(creation_order);
        Ok(owned)
    }

    fn all(&self) -> Result<Vec<Vehicle>, RepositoryError> {
        let guard = lock(&self.records, "vehicle")?;
        let mut vehicles: Vec<Vehicle> = guard.values().cloned().collect();
        vehicles.sort_by(creation_order);
        Ok(vehicles)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<Mutex<HashMap<UserId, User>>>,
}

impl UserDirectory for InMemoryUserDirectory {
    fn insert(&self, user: User) -> Result<User, RepositoryError> {
        let mut guard = lock(&self.users, "user")?;
        let email_taken = guard
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email));
        if email_taken || guard.contains_key(&user.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn update(&self, user: User) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.users, "user")?;
        match guard.get_mut(&user.id) {
            Some(slot) => {
                *slot = user;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let guard = lock(&self.users, "user")?;
        Ok(guard.get(id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let guard = lock(&self.users, "user")?;
        Ok(guard
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn all(&self) -> Result<Vec<User>, RepositoryError> {
        let guard = lock(&self.users, "user")?;
        Ok(guard.values().cloned().collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryPaymentSessions {
    sessions: Arc<Mutex<HashMap<OrderId, PaymentSession>>>,
}

impl PaymentSessionStore for InMemoryPaymentSessions {
    fn insert(&self, session: PaymentSession) -> Result<PaymentSession, RepositoryError> {
        let mut guard = lock(&self.sessions, "payment session")?;
        if guard.contains_key(&session.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn update(&self, session: PaymentSession) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.sessions, "payment session")?;
        match guard.get_mut(&session.id) {
            Some(slot) => {
                *slot = session;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &OrderId) -> Result<Option<PaymentSession>, RepositoryError> {
        let guard = lock(&self.sessions, "payment session")?;
        Ok(guard.get(id).cloned())
    }
}

impl InMemoryPaymentSessions {
    pub fn len(&self) -> usize {
        self.sessions.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
