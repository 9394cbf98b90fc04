use crate::config::PlaidConfig;
use crate::errors::{AppError, Result};
use crate::models::bank_account::NewBankAccount;
use crate::models::transaction::{NewTransaction, TransactionType};
use async_trait::async_trait;
use chrono::{Months, NaiveDate, NaiveTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;

const CLIENT_NAME: &str = "Andy AI";
const TRANSACTIONS_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangedItem {
    pub access_token: String,
    pub item_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaidBalances {
    pub current: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaidAccount {
    pub account_id: String,
    pub name: String,
    pub mask: Option<String>,
    #[serde(rename = "type")]
    pub account_type: String,
    pub subtype: Option<String>,
    pub balances: PlaidBalances,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaidTransaction {
    pub transaction_id: String,
    pub account_id: String,
    /// Positive when money leaves the account.
    pub amount: Decimal,
    pub name: String,
    pub merchant_name: Option<String>,
    pub category: Option<Vec<String>>,
    pub date: NaiveDate,
    pub pending: bool,
}

/// The slice of the Plaid API the app relies on.
#[async_trait]
pub trait BankDataProvider: Send + Sync {
    async fn create_link_token(&self, user_id: i64) -> Result<String>;
    async fn exchange_public_token(&self, public_token: &str) -> Result<ExchangedItem>;
    async fn get_accounts(&self, access_token: &str) -> Result<Vec<PlaidAccount>>;
    async fn get_transactions(&self, access_token: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PlaidTransaction>>;
}

pub struct PlaidClient {
    client: Client,
    base_url: String,
    client_id: Option<String>,
    secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkTokenResponse {
    link_token: String,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    accounts: Vec<PlaidAccount>,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    transactions: Vec<PlaidTransaction>,
    total_transactions: usize,
}

impl PlaidClient {
    pub fn new(config: &PlaidConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.environment.base_url().to_string(),
            client_id: config.client_id.clone(),
            secret: config.secret.clone(),
        })
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, mut body: Value) -> Result<T> {
        let (client_id, secret) = match (&self.client_id, &self.secret) {
            (Some(id), Some(secret)) => (id.as_str(), secret.as_str()),
            _ => {
                return Err(AppError::ExternalServiceError(
                    "PLAID_CLIENT_ID and PLAID_SECRET are not configured".to_string(),
                ))
            }
        };
        if let Value::Object(map) = &mut body {
            map.insert("client_id".to_string(), Value::from(client_id));
            map.insert("secret".to_string(), Value::from(secret));
        }

        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("Plaid request to {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error: Value = response.json().await.unwrap_or(Value::Null);
            let code = error["error_code"].as_str().unwrap_or("UNKNOWN");
            let message = error["error_message"].as_str().unwrap_or("no message");
            return Err(AppError::ExternalServiceError(format!(
                "Plaid {} failed ({}): {} {}",
                path, status, code, message
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("Failed to parse Plaid {} response: {}", path, e)))
    }
}

#[async_trait]
impl BankDataProvider for PlaidClient {
    async fn create_link_token(&self, user_id: i64) -> Result<String> {
        let body = json!({
            "user": { "client_user_id": user_id.to_string() },
            "client_name": CLIENT_NAME,
            "products": ["transactions"],
            "country_codes": ["US"],
            "language": "es",
        });
        let response: LinkTokenResponse = self.post("/link/token/create", body).await?;
        Ok(response.link_token)
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<ExchangedItem> {
        self.post("/item/public_token/exchange", json!({ "public_token": public_token }))
            .await
    }

    async fn get_accounts(&self, access_token: &str) -> Result<Vec<PlaidAccount>> {
        let response: AccountsResponse = self
            .post("/accounts/get", json!({ "access_token": access_token }))
            .await?;
        Ok(response.accounts)
    }

    async fn get_transactions(&self, access_token: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PlaidTransaction>> {
        collect_pages(|offset| {
            let body = json!({
                "access_token": access_token,
                "start_date": start.format("%Y-%m-%d").to_string(),
                "end_date": end.format("%Y-%m-%d").to_string(),
                "options": { "count": TRANSACTIONS_PAGE_SIZE, "offset": offset },
            });
            async move { self.post::<TransactionsResponse>("/transactions/get", body).await }
        })
        .await
    }
}

/// Requests pages by offset until the reported total is reached or a page
/// comes back empty.
async fn collect_pages<F, Fut>(mut fetch_page: F) -> Result<Vec<PlaidTransaction>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<TransactionsResponse>>,
{
    let mut all = Vec::new();
    loop {
        let page = fetch_page(all.len()).await?;
        let received = page.transactions.len();
        all.extend(page.transactions);
        if received == 0 || all.len() >= page.total_transactions {
            break;
        }
    }
    Ok(all)
}

/// Date range used for a sync: the last three months up to today.
pub fn sync_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today.checked_sub_months(Months::new(3)).unwrap_or(today);
    (start, today)
}

/// Maps a Plaid transaction onto a stored one. Plaid reports outflows as
/// positive amounts, so those become expenses; inflows become income.
pub fn to_new_transaction(user_id: i64, tx: &PlaidTransaction) -> NewTransaction {
    let transaction_type = if tx.amount > Decimal::ZERO {
        TransactionType::Expense
    } else {
        TransactionType::Income
    };

    NewTransaction {
        user_id,
        transaction_type,
        amount: tx.amount.abs(),
        category: tx.category.as_ref().and_then(|c| c.first().cloned()),
        description: Some(tx.name.clone()),
        date: tx.date.and_time(NaiveTime::default()).and_utc(),
        plaid_id: Some(tx.transaction_id.clone()),
        merchant_name: tx.merchant_name.clone(),
        account_id: Some(tx.account_id.clone()),
        pending: tx.pending,
    }
}

pub fn to_new_bank_account(user_id: i64, institution_name: &str, account: &PlaidAccount) -> NewBankAccount {
    NewBankAccount {
        user_id,
        institution_name: institution_name.to_string(),
        account_type: account
            .subtype
            .clone()
            .unwrap_or_else(|| account.account_type.clone()),
        account_number: account
            .mask
            .as_ref()
            .map(|m| format!("****{}", m))
            .unwrap_or_else(|| account.name.clone()),
        balance: account.balances.current,
        plaid_account_id: Some(account.account_id.clone()),
    }
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
