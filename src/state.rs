use crate::config::Config;
use crate::database::SqliteDatabase;
use crate::errors::Result;
use crate::services::auth::AuthService;
use crate::services::llm::{ChatModel, OpenAiClient};
use crate::services::plaid::{BankDataProvider, PlaidClient};
use crate::services::uploads::UploadStore;
use crate::services::user_service::UserService;
use crate::utils::middleware::RateLimiter;
use std::sync::Arc;

/// Everything the handlers share. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<SqliteDatabase>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub uploads: Arc<UploadStore>,
    pub llm: Arc<dyn ChatModel>,
    pub bank_data: Arc<dyn BankDataProvider>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Wires the services around an open database, with the given outbound clients.
    pub fn new(
        config: Config,
        db: SqliteDatabase,
        llm: Arc<dyn ChatModel>,
        bank_data: Arc<dyn BankDataProvider>,
    ) -> Self {
        let db = Arc::new(db);
        Self {
            auth: Arc::new(AuthService::new(db.clone(), &config.jwt_secret, config.session_ttl_hours)),
            users: Arc::new(UserService::new(db.clone())),
            uploads: Arc::new(UploadStore::new(&config.upload)),
            limiter: Arc::new(RateLimiter::per_second(config.rate_limit_per_sec)),
            config: Arc::new(config),
            db,
            llm,
            bank_data,
        }
    }

    /// State backed by the real OpenAI and Plaid clients.
    pub fn with_http_clients(config: Config, db: SqliteDatabase) -> Result<Self> {
        let llm = Arc::new(OpenAiClient::new(config.openai.clone())?);
        let bank_data = Arc::new(PlaidClient::new(&config.plaid)?);
        Ok(Self::new(config, db, llm, bank_data))
    }
}
