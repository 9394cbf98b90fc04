use crate::database::SqliteDatabase;
use crate::errors::{AppError, Result};
use crate::models::user::User;
use crate::services::jwt::{AuthenticatedUser, IssuedToken, JwtManager};
use crate::utils::crypto::{hash_token, PasswordManager};
use std::sync::Arc;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

pub struct AuthService {
    jwt_manager: JwtManager,
    database: Arc<SqliteDatabase>,
}

impl AuthService {
    pub fn new(database: Arc<SqliteDatabase>, jwt_secret: &str, session_ttl_hours: i64) -> Self {
        Self {
            jwt_manager: JwtManager::new(jwt_secret, session_ttl_hours),
            database,
        }
    }

    pub fn session_ttl_seconds(&self) -> i64 {
        self.jwt_manager.ttl_seconds()
    }

    /// Checks credentials. Unknown users and wrong passwords get the same error.
    pub async fn authenticate_user(&self, username: &str, password: &str) -> Result<User> {
        let user = self
            .database
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::AuthenticationError(INVALID_CREDENTIALS.to_string()))?;

        if !PasswordManager::verify_password(password, &user.password_hash)? {
            return Err(AppError::AuthenticationError(INVALID_CREDENTIALS.to_string()));
        }

        Ok(user)
    }

    /// Signs a session token for `user` and records it server-side.
    pub async fn start_session(&self, user: &User) -> Result<IssuedToken> {
        let issued = self.jwt_manager.generate_token(user.id, &user.username)?;
        self.database
            .store_user_token(user.id, &issued.token_id, &hash_token(&issued.token), issued.expires_at)
            .await?;

        if let Err(e) = self.database.cleanup_expired_tokens().await {
            tracing::warn!(action = "token_cleanup_failed", error = %e);
        }

        Ok(issued)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(User, IssuedToken)> {
        let user = self.authenticate_user(username, password).await?;
        let issued = self.start_session(&user).await?;
        Ok((user, issued))
    }

    /// A token is valid when its signature and expiry check out and its session
    /// has not been revoked.
    pub async fn validate_token(&self, token: &str) -> Result<AuthenticatedUser> {
        let token_data = self.jwt_manager.validate_token(token)?;

        if !self.database.is_token_valid(&token_data.claims.jti).await? {
            return Err(AppError::AuthenticationError("Session expired or logged out".to_string()));
        }

        AuthenticatedUser::try_from(token_data.claims)
    }

    pub async fn logout(&self, user: &AuthenticatedUser) -> Result<()> {
        self.database.revoke_token(&user.token_id).await?;
        tracing::info!(action = "logout", user_id = user.user_id);
        Ok(())
    }
}
