use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub id: i64,
    pub user_id: i64,
    pub institution_name: String,
    pub account_type: String,
    pub account_number: String,
    pub balance: Option<Decimal>,
    pub last_sync: Option<DateTime<Utc>>,
    pub plaid_account_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBankAccount {
    pub user_id: i64,
    pub institution_name: String,
    pub account_type: String,
    pub account_number: String,
    pub balance: Option<Decimal>,
    pub plaid_account_id: Option<String>,
}

/// A linked Plaid item. The access token stays on the server.
#[derive(Debug, Clone)]
pub struct PlaidItem {
    pub id: i64,
    pub user_id: i64,
    pub item_id: String,
    pub access_token: String,
    pub institution_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
