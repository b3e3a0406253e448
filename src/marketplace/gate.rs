use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::domain::{User, UserId};
use super::repository::RepositoryError;
use super::vehicle::Vehicle;

/// Reasons a write to the listing catalog is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("Only drivers can manage vehicle listings")]
    NotDriver,
    #[error("Active subscription required to manage vehicles")]
    SubscriptionInactive,
    #[error("You can only manage your own vehicles")]
    NotOwner,
}

/// Write eligibility. Recomputed from `expires_at` on every call.
pub fn authorize_write(user: &User, now: DateTime<Utc>) -> Result<(), AccessDenied> {
    if !user.role.can_publish() {
        return Err(AccessDenied::NotDriver);
    }
    if !user.subscription.is_active(now) {
        return Err(AccessDenied::SubscriptionInactive);
    }
    Ok(())
}

pub fn authorize_owner(user: &User, vehicle: &Vehicle) -> Result<(), AccessDenied> {
    if vehicle.owner_id == user.id {
        Ok(())
    } else {
        Err(AccessDenied::NotOwner)
    }
}

/// Serializes listing writes and subscription changes per account, so a gate
/// decision and the write it guards observe the same subscription state.
#[derive(Default)]
pub struct WriteLocks {
    slots: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl WriteLocks {
    fn slot(&self, user_id: &UserId) -> Result<Arc<Mutex<()>>, RepositoryError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| RepositoryError::Unavailable("write lock table poisoned".to_string()))?;
        Ok(slots.entry(user_id.clone()).or_default().clone())
    }

    pub fn with_user<T, E>(
        &self,
        user_id: &UserId,
        operation: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<RepositoryError>,
    {
        let slot = self.slot(user_id)?;
        let _guard = slot.lock().map_err(|_| {
            RepositoryError::Unavailable(format!("write lock for {user_id} poisoned"))
        })?;
        operation()
    }
}
