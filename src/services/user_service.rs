use crate::database::SqliteDatabase;
use crate::errors::{AppError, Result};
use crate::models::user::{NewUser, User};
use crate::utils::crypto::PasswordManager;
use crate::utils::validation::Validator;
use std::sync::Arc;

pub const TEST_USERNAME: &str = "test";
pub const TEST_PASSWORD: &str = "test1234";

#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
}

pub struct UserService {
    db: Arc<SqliteDatabase>,
}

impl UserService {
    pub fn new(db: Arc<SqliteDatabase>) -> Self {
        Self { db }
    }

    pub async fn register(&self, registration: Registration) -> Result<User> {
        let username = registration.username.trim().to_string();
        let email = registration.email.trim().to_lowercase();
        let first_name = registration.first_name.trim().to_string();
        let last_name = registration.last_name.trim().to_string();
        let phone_number = registration
            .phone_number
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        Validator::validate_username(&username)?;
        Validator::validate_password(&registration.password)?;
        Validator::validate_email(&email)?;
        Validator::require_non_empty("First name", &first_name)?;
        Validator::require_non_empty("Last name", &last_name)?;
        if let Some(phone) = &phone_number {
            Validator::validate_phone(phone)?;
        }

        if self.db.get_user_by_username(&username).await?.is_some() {
            tracing::info!(action = "register_username_conflict", user = %username);
            return Err(AppError::Conflict("Username already exists".to_string()));
        }
        if self.db.get_user_by_email(&email).await?.is_some() {
            tracing::info!(action = "register_email_conflict", user = %username);
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = PasswordManager::hash_password(&registration.password)?;
        let user = self
            .db
            .create_user(&NewUser {
                username,
                password_hash,
                first_name,
                last_name,
                email,
                phone_number,
            })
            .await?;

        tracing::info!(action = "register_success", user_id = user.id, user = %user.username);
        Ok(user)
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        self.db
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::AuthenticationError("Not authenticated".to_string()))
    }

    /// Creates the `test` account used for demos unless it already exists.
    pub async fn seed_test_user(&self) -> Result<()> {
        if self.db.get_user_by_username(TEST_USERNAME).await?.is_some() {
            return Ok(());
        }
        let user = self
            .register(Registration {
                username: TEST_USERNAME.to_string(),
                password: TEST_PASSWORD.to_string(),
                email: "test@andy.ai".to_string(),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                phone_number: None,
            })
            .await?;
        tracing::info!(action = "test_user_seeded", user_id = user.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(username: &str, email: &str) -> Registration {
        Registration {
            username: username.to_string(),
            password: "password1".to_string(),
            email: email.to_string(),
            first_name: "Ana".to_string(),
            last_name: "Lopez".to_string(),
            phone_number: None,
        }
    }

    async fn service() -> UserService {
        UserService::new(Arc::new(SqliteDatabase::connect("sqlite::memory:", 1).await.unwrap()))
    }

    #[tokio::test]
    async fn email_is_normalized_and_unique() {
        let service = service().await;
        let user = service.register(registration("ana", " Ana@Example.com ")).await.unwrap();
        assert_eq!(user.email, "ana@example.com");

        let err = service.register(registration("ana2", "ana@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let service = service().await;
        let mut reg = registration("ana", "ana@example.com");
        reg.first_name = "  ".to_string();
        assert!(matches!(service.register(reg).await, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let service = service().await;
        service.seed_test_user().await.unwrap();
        service.seed_test_user().await.unwrap();
        assert!(service.db.get_user_by_username(TEST_USERNAME).await.unwrap().is_some());
    }
}
