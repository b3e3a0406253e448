use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier issued by the identity provider for a marketplace account.
    UserId
);
string_id!(
    /// Identifier for a vehicle listing.
    VehicleId
);
string_id!(
    /// Catalog key of a subscription package (`basic`, `professional`, ...).
    PackageId
);
string_id!(
    /// Payment session identifier shared with the checkout gateway.
    OrderId
);

impl UserId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl VehicleId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl OrderId {
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        Self(format!("order_{}", &raw[..12]))
    }
}

/// Account role. Only drivers publish listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Driver,
    Customer,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Driver => "driver",
            Role::Customer => "customer",
        }
    }

    pub fn can_publish(self) -> bool {
        matches!(self, Role::Driver)
    }
}

/// Stored subscription window. Activity is never persisted; it is derived from
/// `expires_at` at the moment of every check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub expires_at: Option<DateTime<Utc>>,
    pub package_id: Option<PackageId>,
    pub demo_granted_at: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at > now)
    }

    /// Extends the window by `days`, stacking on top of any time still left.
    pub fn extend(
        &mut self,
        now: DateTime<Utc>,
        days: i64,
        package_id: Option<PackageId>,
    ) -> DateTime<Utc> {
        let start = match self.expires_at {
            Some(expires_at) if expires_at > now => expires_at,
            _ => now,
        };
        let expires_at = start + Duration::days(days);
        self.expires_at = Some(expires_at);
        if package_id.is_some() {
            self.package_id = package_id;
        }
        expires_at
    }

    pub fn view(&self, now: DateTime<Utc>) -> SubscriptionView {
        let active = self.is_active(now);
        SubscriptionView {
            active,
            package_id: if active { self.package_id.clone() } else { None },
            expires_at: self.expires_at,
        }
    }
}

/// Subscription state as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionView {
    pub active: bool,
    pub package_id: Option<PackageId>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Marketplace account as held by the user directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub city: String,
    pub role: Role,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub subscription: Subscription,
}

impl User {
    pub fn contact(&self) -> OwnerContact {
        OwnerContact {
            name: self.name.clone(),
            phone: self.phone.clone(),
            city: self.city.clone(),
        }
    }

    pub fn view(&self, now: DateTime<Utc>) -> UserView {
        let subscription = self.subscription.view(now);
        UserView {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            phone: self.phone.clone(),
            city: self.city.clone(),
            user_type: self.role,
            created_at: self.created_at,
            subscription_active: subscription.active,
            subscription_expires: subscription.expires_at,
            subscription_package: subscription.package_id,
        }
    }
}

/// Public account representation returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub city: String,
    pub user_type: Role,
    pub created_at: DateTime<Utc>,
    pub subscription_active: bool,
    pub subscription_expires: Option<DateTime<Utc>>,
    pub subscription_package: Option<PackageId>,
}

/// Owner fields joined onto listings at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerContact {
    pub name: String,
    pub phone: String,
    pub city: String,
}
