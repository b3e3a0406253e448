//! Accounts, password hashing and bearer tokens.

use std::collections::HashSet;
use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{Role, Subscription, User, UserId, UserView};
use super::error::MarketplaceError;
use super::repository::{RepositoryError, UserDirectory};
use super::vehicle::ValidationError;
use super::SharedClock;
use crate::config::AuthConfig;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Caller identity resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
}

/// HS256 token issuer. Expiry is judged against the injected clock rather than
/// the system time jsonwebtoken would consult.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    clock: SharedClock,
}

impl TokenService {
    pub fn new(config: &AuthConfig, clock: SharedClock) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            ttl: Duration::hours(config.token_ttl_hours),
            clock,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, MarketplaceError> {
        let now = self.clock.utc();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| MarketplaceError::Internal(format!("token encoding failed: {err}")))
    }

    pub fn verify(&self, token: &str) -> Result<Principal, MarketplaceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|err| {
                debug!(error = %err, "bearer token rejected");
                MarketplaceError::unauthorized("Invalid token")
            })?
            .claims;
        if claims.exp <= self.clock.utc().timestamp() {
            return Err(MarketplaceError::unauthorized("Token expired"));
        }
        Ok(Principal {
            user_id: UserId(claims.sub),
            email: claims.email,
            role: claims.role,
        })
    }
}

pub fn hash_password(password: &str) -> Result<String, MarketplaceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| MarketplaceError::Internal(format!("password hashing failed: {err}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: String,
    pub city: String,
    #[serde(default)]
    pub user_type: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserView,
}

fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.contains('@'))
        .unwrap_or(false);
    if valid {
        Ok(email)
    } else {
        Err(ValidationError::new("email", "A valid email address is required"))
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ValidationError::new(field, format!("{field} is required")))
    } else {
        Ok(value.to_string())
    }
}

pub struct AccountService {
    users: Arc<dyn UserDirectory>,
    tokens: TokenService,
    clock: SharedClock,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserDirectory>, tokens: TokenService, clock: SharedClock) -> Self {
        Self {
            users,
            tokens,
            clock,
        }
    }

    pub fn register(&self, registration: Registration) -> Result<UserView, MarketplaceError> {
        let email = normalize_email(&registration.email)?;
        if registration.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::new(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
            )
            .into());
        }
        let name = required("name", &registration.name)?;
        let phone = required("phone", &registration.phone)?;
        let city = required("city", &registration.city)?;

        let now = self.clock.utc();
        let user = User {
            id: UserId::generate(),
            email,
            name,
            phone,
            city,
            role: registration.user_type,
            password_hash: hash_password(&registration.password)?,
            created_at: now,
            subscription: Subscription::default(),
        };
        let stored = self.users.insert(user).map_err(|err| match err {
            RepositoryError::Conflict => {
                MarketplaceError::Conflict("Email already registered".into())
            }
            other => other.into(),
        })?;
        info!(user_id = %stored.id, role = stored.role.label(), "account registered");
        Ok(stored.view(now))
    }

    pub fn login(&self, credentials: Credentials) -> Result<LoginResponse, MarketplaceError> {
        let email = credentials.email.trim().to_lowercase();
        let user = self
            .users
            .find_by_email(&email)?
            .filter(|user| verify_password(&credentials.password, &user.password_hash))
            .ok_or_else(|| MarketplaceError::unauthorized("Invalid credentials"))?;
        let token = self.tokens.issue(&user)?;
        Ok(LoginResponse {
            token,
            user: user.view(self.clock.utc()),
        })
    }

    /// Resolves a bearer token to a principal whose account still exists.
    pub fn authenticate(&self, token: &str) -> Result<Principal, MarketplaceError> {
        let principal = self.tokens.verify(token)?;
        self.users
            .fetch(&principal.user_id)?
            .ok_or_else(|| MarketplaceError::unauthorized("User not found"))?;
        Ok(principal)
    }

    pub fn current(&self, principal: &Principal) -> Result<UserView, MarketplaceError> {
        let user = self
            .users
            .fetch(&principal.user_id)?
            .ok_or_else(|| MarketplaceError::unauthorized("User not found"))?;
        Ok(user.view(self.clock.utc()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    Arc<AccountService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = MarketplaceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| MarketplaceError::unauthorized("Not authenticated"))?;
        let accounts = Arc::<AccountService>::from_ref(state);
        accounts.authenticate(token)
    }
}
