// Enrollment lifecycle state machine.
//
//   ONGOING --(grace debt > 32 days)--> SUSPENDED
//   SUSPENDED --(resume)--> ONGOING (grace debt reset)
//   ONGOING | SUSPENDED --(cancel)--> CANCELLED (terminal)
//
// COMPLETED is only reached by the external settlement path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Result};

/// Grace debt above this many days suspends an ongoing enrollment
pub const GRACE_PERIOD_LIMIT_DAYS: u32 = 32;

/// Persisted enrollment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Ongoing,
    Suspended,
    Completed,
    Cancelled,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ongoing => "ONGOING",
            Self::Suspended => "SUSPENDED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for EnrollmentStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "ONGOING" => Ok(Self::Ongoing),
            "SUSPENDED" => Ok(Self::Suspended),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid enrollment status: {}", value)),
        }
    }
}

/// Outcome of applying a grace-debt total to an enrollment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraceDecision {
    Stay,
    Suspend,
}

/// Lifecycle state with the data each state carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentState {
    Ongoing { grace_days: u32 },
    Suspended { grace_days: u32 },
    Completed,
    Cancelled { at: DateTime<Utc>, by: String },
}

impl EnrollmentState {
    /// Initial state of every new enrollment
    pub fn new() -> Self {
        Self::Ongoing { grace_days: 0 }
    }

    /// Suspended state; refuses grace debt at or below the limit
    pub fn suspended(grace_days: u32) -> Result<Self> {
        if grace_days <= GRACE_PERIOD_LIMIT_DAYS {
            return Err(AppError::bad_request(format!(
                "Enrollment cannot be suspended with {} grace days used (limit {})",
                grace_days, GRACE_PERIOD_LIMIT_DAYS
            )));
        }
        Ok(Self::Suspended { grace_days })
    }

    pub fn status(&self) -> EnrollmentStatus {
        match self {
            Self::Ongoing { .. } => EnrollmentStatus::Ongoing,
            Self::Suspended { .. } => EnrollmentStatus::Suspended,
            Self::Completed => EnrollmentStatus::Completed,
            Self::Cancelled { .. } => EnrollmentStatus::Cancelled,
        }
    }

    pub fn grace_days(&self) -> u32 {
        match self {
            Self::Ongoing { grace_days } | Self::Suspended { grace_days } => *grace_days,
            Self::Completed | Self::Cancelled { .. } => 0,
        }
    }

    /// Record a freshly recomputed grace-debt total.
    ///
    /// An ongoing enrollment over the limit moves to SUSPENDED; a suspended
    /// one stays suspended with the new total.
    pub fn with_grace_days(&self, grace_days: u32) -> Result<(Self, GraceDecision)> {
        match self {
            Self::Ongoing { .. } if grace_days > GRACE_PERIOD_LIMIT_DAYS => {
                Ok((Self::suspended(grace_days)?, GraceDecision::Suspend))
            }
            Self::Ongoing { .. } => Ok((Self::Ongoing { grace_days }, GraceDecision::Stay)),
            Self::Suspended { .. } => Ok((Self::Suspended { grace_days }, GraceDecision::Stay)),
            Self::Completed | Self::Cancelled { .. } => Err(AppError::bad_request(format!(
                "Grace period is not tracked for {} enrollments",
                self.status()
            ))),
        }
    }

    /// SUSPENDED -> ONGOING with the grace debt cleared
    pub fn resume(&self) -> Result<Self> {
        match self {
            Self::Suspended { .. } => Ok(Self::Ongoing { grace_days: 0 }),
            _ => Err(AppError::bad_request(
                "Only suspended enrollments can be resumed",
            )),
        }
    }

    /// ONGOING | SUSPENDED -> CANCELLED
    pub fn cancel(&self, at: DateTime<Utc>, by: impl Into<String>) -> Result<Self> {
        match self {
            Self::Ongoing { .. } | Self::Suspended { .. } => Ok(Self::Cancelled {
                at,
                by: by.into(),
            }),
            Self::Cancelled { .. } => Err(AppError::bad_request("Enrollment is already cancelled")),
            Self::Completed => Err(AppError::bad_request(
                "Completed enrollments cannot be cancelled",
            )),
        }
    }
}

impl Default for EnrollmentState {
    fn default() -> Self {
        Self::new()
    }
}
