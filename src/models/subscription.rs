use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BillingFrequency {
    Monthly,
    Yearly,
}

impl BillingFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingFrequency::Monthly => "monthly",
            BillingFrequency::Yearly => "yearly",
        }
    }

    /// Cost of one billing period spread over a month.
    pub fn monthly_cost(&self, amount: Decimal) -> Decimal {
        match self {
            BillingFrequency::Monthly => amount,
            BillingFrequency::Yearly => amount / Decimal::from(12),
        }
    }
}

impl FromStr for BillingFrequency {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(BillingFrequency::Monthly),
            "yearly" => Ok(BillingFrequency::Yearly),
            other => Err(AppError::ValidationError(format!("Unknown billing frequency '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub amount: Decimal,
    pub frequency: BillingFrequency,
    pub next_billing: Option<DateTime<Utc>>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: i64,
    pub name: String,
    pub amount: Decimal,
    pub frequency: BillingFrequency,
    pub next_billing: Option<DateTime<Utc>>,
}

/// Sum of what the active subscriptions cost per month.
pub fn monthly_total(subscriptions: &[Subscription]) -> Result<Decimal, AppError> {
    subscriptions
        .iter()
        .filter(|s| s.active)
        .try_fold(Decimal::ZERO, |total, s| {
            total
                .checked_add(s.frequency.monthly_cost(s.amount))
                .ok_or_else(|| AppError::InternalError("Subscription amounts overflow the monthly total".to_string()))
        })
        .map(|total| total.round_dp(2))
}
