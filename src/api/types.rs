use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::bank_account::BankAccount;
use crate::models::credit_report::CreditScoreResponse;
use crate::models::subscription::Subscription;
use crate::models::transaction::Transaction;
use crate::models::user::UserSummary;
use crate::services::finance::TrendPoint;
use crate::services::onboarding::{OnboardingData, OnboardingStep};
use crate::services::uploads::StoredFile;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub token: String,
    pub expires_in: i64,
    pub user: UserSummary,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub ok: bool,
    pub message: String,
    pub token: String,
    pub expires_in: i64,
    pub user: UserSummary,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub files: Vec<StoredFile>,
    pub analysis: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadErrorResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditReportRequest {
    pub score: i64,
    pub bureau: String,
    pub factors: Option<String>,
    pub report_data: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreditUploadResponse {
    pub report: CreditScoreResponse,
    pub factors: Vec<String>,
    pub file: StoredFile,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDisputeRequest {
    #[serde(default)]
    pub creditor: String,
    pub account_number: Option<String>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateDisputeRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionSummaryResponse {
    pub balance: Decimal,
    pub income: Decimal,
    pub expenses: Decimal,
    pub transactions: Vec<Transaction>,
    pub trends: Vec<TrendPoint>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTransactionRequest {
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub amount: Decimal,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkTokenResponse {
    pub link_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeTokenRequest {
    #[serde(default)]
    pub public_token: String,
    pub institution_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeTokenResponse {
    pub item_id: String,
    pub accounts: Vec<BankAccount>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SyncResponse {
    pub synced: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountsResponse {
    pub accounts: Vec<BankAccount>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionsResponse {
    pub subscriptions: Vec<Subscription>,
    pub monthly_total: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    #[serde(default)]
    pub name: String,
    pub amount: Decimal,
    pub frequency: String,
    pub next_billing: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingRequest {
    #[serde(default)]
    pub message: String,
    pub current_step: Option<String>,
    pub onboarding_data: Option<OnboardingData>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingResponse {
    pub response: String,
    pub next_step: OnboardingStep,
    pub updated_data: OnboardingData,
}
