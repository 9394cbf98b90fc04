#![allow(dead_code)]

use andy_ai::api;
use andy_ai::config::{Config, OpenAiConfig, PlaidConfig, PlaidEnvironment, UploadConfig};
use andy_ai::database::SqliteDatabase;
use andy_ai::errors::{AppError, Result};
use andy_ai::services::llm::{ChatMessage, ChatModel, CompletionOptions};
use andy_ai::services::plaid::{BankDataProvider, ExchangedItem, PlaidAccount, PlaidBalances, PlaidTransaction};
use andy_ai::state::AppState;
use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderName, HeaderValue};
use axum_test::TestServer;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Chat model that answers with a canned reply and remembers every prompt.
pub struct FakeChatModel {
    reply: Mutex<String>,
    fail: Mutex<bool>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeChatModel {
    fn new() -> Self {
        Self {
            reply: Mutex::new("Andy says hi".to_string()),
            fail: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_reply(&self, reply: &str) {
        *self.reply.lock().unwrap() = reply.to_string();
    }

    pub fn fail_next_calls(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for FakeChatModel {
    async fn complete(&self, messages: &[ChatMessage], _options: CompletionOptions) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if *self.fail.lock().unwrap() {
            return Err(AppError::ExternalServiceError("model unavailable".to_string()));
        }
        Ok(self.reply.lock().unwrap().clone())
    }
}

/// Bank-data provider with one checking account and a scripted transaction list.
pub struct FakeBank {
    transactions: Mutex<Vec<PlaidTransaction>>,
}

impl FakeBank {
    fn new() -> Self {
        Self {
            transactions: Mutex::new(Vec::new()),
        }
    }

    pub fn set_transactions(&self, transactions: Vec<PlaidTransaction>) {
        *self.transactions.lock().unwrap() = transactions;
    }
}

#[async_trait]
impl BankDataProvider for FakeBank {
    async fn create_link_token(&self, user_id: i64) -> Result<String> {
        Ok(format!("link-sandbox-{}", user_id))
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<ExchangedItem> {
        if public_token == "bad-token" {
            return Err(AppError::ExternalServiceError("INVALID_PUBLIC_TOKEN".to_string()));
        }
        // `public-sandbox-N` links item N.
        let suffix = public_token.strip_prefix("public-sandbox-").unwrap_or(public_token);
        Ok(ExchangedItem {
            access_token: format!("access-sandbox-{}", suffix),
            item_id: format!("item-{}", suffix),
        })
    }

    async fn get_accounts(&self, _access_token: &str) -> Result<Vec<PlaidAccount>> {
        Ok(vec![PlaidAccount {
            account_id: "acc-checking".to_string(),
            name: "Plaid Checking".to_string(),
            mask: Some("0000".to_string()),
            account_type: "depository".to_string(),
            subtype: Some("checking".to_string()),
            balances: PlaidBalances {
                current: Some(Decimal::from_str("110.25").unwrap()),
            },
        }])
    }

    async fn get_transactions(&self, _access_token: &str, _start: NaiveDate, _end: NaiveDate) -> Result<Vec<PlaidTransaction>> {
        Ok(self.transactions.lock().unwrap().clone())
    }
}

pub fn plaid_transaction(id: &str, amount: &str, date: &str) -> PlaidTransaction {
    PlaidTransaction {
        transaction_id: id.to_string(),
        account_id: "acc-checking".to_string(),
        amount: Decimal::from_str(amount).unwrap(),
        name: format!("Transaction {}", id),
        merchant_name: None,
        category: Some(vec!["Shops".to_string()]),
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        pending: false,
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub upload_dir: TempDir,
    pub llm: Arc<FakeChatModel>,
    pub bank: Arc<FakeBank>,
}

impl TestApp {
    pub fn uploaded_files(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn test_config(upload_dir: &TempDir) -> Config {
    Config {
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        database_max_connections: 1,
        jwt_secret: "integration-test-secret".to_string(),
        session_ttl_hours: 1,
        rate_limit_per_sec: 1000,
        seed_test_user: false,
        openai: OpenAiConfig {
            api_key: None,
            base_url: "http://127.0.0.1:9".to_string(),
            model: "gpt-4".to_string(),
            timeout_secs: 1,
        },
        plaid: PlaidConfig {
            client_id: None,
            secret: None,
            environment: PlaidEnvironment::Sandbox,
        },
        upload: UploadConfig {
            dir: upload_dir.path().to_path_buf(),
            max_files: 5,
            max_file_bytes: 1024 * 1024,
        },
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(adjust: impl FnOnce(&mut Config)) -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&upload_dir);
    adjust(&mut config);

    let db = SqliteDatabase::connect(&config.database_url, config.database_max_connections)
        .await
        .unwrap();
    let llm = Arc::new(FakeChatModel::new());
    let bank = Arc::new(FakeBank::new());
    let state = AppState::new(config, db, llm.clone(), bank.clone());
    let server = TestServer::new(api::router(state)).unwrap();

    TestApp {
        server,
        upload_dir,
        llm,
        bank,
    }
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token)).unwrap())
}

pub fn registration(username: &str) -> Value {
    json!({
        "username": username,
        "password": "password123",
        "email": format!("{}@example.com", username),
        "firstName": "Ana",
        "lastName": "Lopez",
    })
}

/// Registers `username` and returns its session token.
pub async fn register(app: &TestApp, username: &str) -> String {
    let response = app.server.post("/api/register").json(&registration(username)).await;
    assert_eq!(response.status_code(), 200, "register failed: {}", response.text());
    response.json::<Value>()["token"].as_str().unwrap().to_string()
}
