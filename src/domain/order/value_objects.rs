use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::ValidationError;

// ============================================================================
// Order Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Available,
    Taken,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Available => "AVAILABLE",
            OrderStatus::Taken => "TAKEN",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dispatcher or a loader. Users can switch roles in the app, so the id
/// alone carries no role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub Uuid);

impl ActorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ActorId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a user-level request asks to do with an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Create,
    Claim,
    Complete,
    Cancel,
}

impl OrderAction {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderAction::Create => "create",
            OrderAction::Claim => "claim",
            OrderAction::Complete => "complete",
            OrderAction::Cancel => "cancel",
        }
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creation request as submitted by a dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub address: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date_time: DateTime<Utc>,
    pub cargo_description: String,
    pub price_per_hour: f64,
}

impl NewOrder {
    /// `grace` tolerates clock skew between the client and the service when
    /// an order is scheduled for "now".
    pub fn validate(&self, now: DateTime<Utc>, grace: Duration) -> Result<(), ValidationError> {
        if self.address.trim().is_empty() {
            return Err(ValidationError::EmptyAddress);
        }
        if self.cargo_description.trim().is_empty() {
            return Err(ValidationError::EmptyCargoDescription);
        }
        if !self.price_per_hour.is_finite() || self.price_per_hour <= 0.0 {
            return Err(ValidationError::NonPositivePrice(self.price_per_hour));
        }
        if self.date_time + grace < now {
            return Err(ValidationError::ScheduledInPast {
                scheduled: self.date_time,
                now,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
