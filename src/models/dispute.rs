use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::errors::AppError;

/// Workflow state of a dispute letter. Ordered: a dispute never moves back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DisputeStatus {
    Pending,
    Sent,
    Resolved,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Pending => "pending",
            DisputeStatus::Sent => "sent",
            DisputeStatus::Resolved => "resolved",
        }
    }

    pub fn can_transition_to(&self, next: DisputeStatus) -> bool {
        next > *self
    }
}

impl FromStr for DisputeStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DisputeStatus::Pending),
            "sent" => Ok(DisputeStatus::Sent),
            "resolved" => Ok(DisputeStatus::Resolved),
            other => Err(AppError::ValidationError(format!("Unknown dispute status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Dispute {
    pub id: i64,
    pub user_id: i64,
    pub creditor: String,
    pub account_number: Option<String>,
    pub reason: String,
    pub status: DisputeStatus,
    pub letter_content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewDispute {
    pub user_id: i64,
    pub creditor: String,
    pub account_number: Option<String>,
    pub reason: String,
    pub letter_content: Option<String>,
}
