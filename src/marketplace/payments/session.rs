use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::marketplace::catalog::Package;
use crate::marketplace::domain::{OrderId, PackageId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// Settled result reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Confirmed,
    Failed,
}

impl From<PaymentOutcome> for PaymentStatus {
    fn from(value: PaymentOutcome) -> Self {
        match value {
            PaymentOutcome::Confirmed => PaymentStatus::Confirmed,
            PaymentOutcome::Failed => PaymentStatus::Failed,
        }
    }
}

/// Result of feeding an outcome into a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied(PaymentStatus),
    AlreadySettled(PaymentStatus),
}

/// Checkout attempt for one package. `pending` moves to exactly one terminal
/// state and never back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSession {
    pub id: OrderId,
    pub user_id: UserId,
    pub package_id: PackageId,
    pub amount: u64,
    pub status: PaymentStatus,
    pub checkout_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentSession {
    pub fn pending(id: OrderId, user_id: UserId, package: &Package, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            package_id: package.id.clone(),
            amount: package.price,
            status: PaymentStatus::Pending,
            checkout_url: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn resolve(&mut self, outcome: PaymentOutcome, now: DateTime<Utc>) -> Transition {
        if self.status.is_terminal() {
            return Transition::AlreadySettled(self.status);
        }
        self.status = outcome.into();
        self.updated_at = now;
        Transition::Applied(self.status)
    }

    /// Marks a session that never reached the gateway's hosted page.
    pub fn abandon(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Transition {
        let transition = self.resolve(PaymentOutcome::Failed, now);
        if matches!(transition, Transition::Applied(_)) {
            self.failure_reason = Some(reason.into());
        }
        transition
    }
}
