use crate::errors::{AppError, Result};
use crate::models::bank_account::{BankAccount, NewBankAccount, PlaidItem};
use crate::models::credit_report::{CreditReport, NewCreditReport};
use crate::models::dispute::{Dispute, DisputeStatus, NewDispute};
use crate::models::subscription::{NewSubscription, Subscription};
use crate::models::transaction::{NewTransaction, Transaction};
use crate::models::user::{NewUser, User};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Opens (creating if needed) the database at `database_url` and makes sure
    /// every table exists. `sqlite::memory:` needs `max_connections = 1`, since
    /// each connection would otherwise see its own empty database.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid DATABASE_URL: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect to database: {}", e)))?;

        let db = Self { pool };
        db.create_tables().await?;

        tracing::info!(action = "database_connected", url = %database_url);
        Ok(db)
    }

    async fn create_tables(&self) -> Result<()> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                phone_number TEXT,
                date_of_birth TEXT,
                address TEXT,
                city TEXT,
                state TEXT,
                zip_code TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT
            );

            CREATE TABLE IF NOT EXISTS user_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                token_id TEXT UNIQUE NOT NULL,
                token_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                transaction_type TEXT NOT NULL, -- 'income', 'expense'
                amount TEXT NOT NULL,
                category TEXT,
                description TEXT,
                date TEXT NOT NULL,
                plaid_id TEXT UNIQUE,
                merchant_name TEXT,
                account_id TEXT,
                pending BOOLEAN NOT NULL DEFAULT FALSE,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS credit_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                score INTEGER NOT NULL,
                report_date TEXT NOT NULL,
                bureau TEXT NOT NULL,
                factors TEXT,
                report_data TEXT,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS disputes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                creditor TEXT NOT NULL,
                account_number TEXT,
                reason TEXT NOT NULL,
                status TEXT NOT NULL, -- 'pending', 'sent', 'resolved'
                letter_content TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS bank_accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                institution_name TEXT NOT NULL,
                account_type TEXT NOT NULL,
                account_number TEXT NOT NULL,
                balance TEXT,
                last_sync TEXT,
                plaid_account_id TEXT UNIQUE,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS plaid_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                item_id TEXT UNIQUE NOT NULL,
                access_token TEXT NOT NULL,
                institution_name TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                amount TEXT NOT NULL,
                frequency TEXT NOT NULL, -- 'monthly', 'yearly'
                next_billing TEXT,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_tokens_user_id ON user_tokens(user_id);
            CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_credit_reports_user ON credit_reports(user_id, report_date);
            CREATE INDEX IF NOT EXISTS idx_disputes_user ON disputes(user_id);
            CREATE INDEX IF NOT EXISTS idx_bank_accounts_user ON bank_accounts(user_id);
            CREATE INDEX IF NOT EXISTS idx_plaid_items_user ON plaid_items(user_id);
            CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(user_id);
        "#;

        sqlx::query(query)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create tables: {}", e)))?;

        tracing::debug!(action = "tables_verified");
        Ok(())
    }

    // Users

    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        let now = Utc::now();
        let query = r#"
            INSERT INTO users (username, password_hash, first_name, last_name, email, phone_number, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#;

        let result = sqlx::query(query)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(&user.phone_number)
            .bind(timestamp(now))
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    if db_err.message().contains("users.email") {
                        AppError::Conflict("Email already registered".to_string())
                    } else {
                        AppError::Conflict("Username already exists".to_string())
                    }
                }
                _ => AppError::DatabaseError(format!("Failed to create user: {}", e)),
            })?;

        let id = result.last_insert_rowid();
        tracing::info!(action = "user_created", user_id = id, username = %user.username);
        self.get_user_by_id(id)
            .await?
            .ok_or_else(|| AppError::DatabaseError("Created user could not be read back".to_string()))
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch user by id: {}", e)))?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch user by username: {}", e)))?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?1 COLLATE NOCASE")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch user by email: {}", e)))?;
        row.as_ref().map(user_from_row).transpose()
    }

    // Session tokens

    pub async fn store_user_token(
        &self,
        user_id: i64,
        token_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let query = r#"
            INSERT INTO user_tokens (user_id, token_id, token_hash, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
        "#;

        sqlx::query(query)
            .bind(user_id)
            .bind(token_id)
            .bind(token_hash)
            .bind(timestamp(Utc::now()))
            .bind(timestamp(expires_at))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to store token: {}", e)))?;

        Ok(())
    }

    pub async fn is_token_valid(&self, token_id: &str) -> Result<bool> {
        let query = r#"
            SELECT COUNT(*) as count FROM user_tokens
            WHERE token_id = ?1 AND is_active = TRUE AND expires_at > ?2
        "#;

        let row = sqlx::query(query)
            .bind(token_id)
            .bind(timestamp(Utc::now()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to validate token: {}", e)))?;

        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    /// Returns whether an active token was actually revoked.
    pub async fn revoke_token(&self, token_id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE user_tokens SET is_active = FALSE WHERE token_id = ?1 AND is_active = TRUE")
            .bind(token_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to revoke token: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn cleanup_expired_tokens(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_tokens WHERE expires_at <= ?1 OR is_active = FALSE")
            .bind(timestamp(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to clean up tokens: {}", e)))?;

        Ok(result.rows_affected())
    }

    // Transactions

    pub async fn insert_transaction(&self, tx: &NewTransaction) -> Result<Transaction> {
        let query = r#"
            INSERT INTO transactions (user_id, transaction_type, amount, category, description, date, plaid_id, merchant_name, account_id, pending)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#;

        let result = sqlx::query(query)
            .bind(tx.user_id)
            .bind(tx.transaction_type.as_str())
            .bind(tx.amount.to_string())
            .bind(&tx.category)
            .bind(&tx.description)
            .bind(timestamp(tx.date))
            .bind(&tx.plaid_id)
            .bind(&tx.merchant_name)
            .bind(&tx.account_id)
            .bind(tx.pending)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to insert transaction: {}", e)))?;

        let row = sqlx::query("SELECT * FROM transactions WHERE id = ?1")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to read transaction: {}", e)))?;
        transaction_from_row(&row)
    }

    /// Inserts a bank-synced transaction, or refreshes the mutable fields of
    /// the row already holding its `plaid_id`. Returns false when the
    /// `plaid_id` belongs to another user and nothing was written.
    pub async fn upsert_plaid_transaction(&self, tx: &NewTransaction) -> Result<bool> {
        let query = r#"
            INSERT INTO transactions (user_id, transaction_type, amount, category, description, date, plaid_id, merchant_name, account_id, pending)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(plaid_id) DO UPDATE SET
                transaction_type = excluded.transaction_type,
                amount = excluded.amount,
                category = excluded.category,
                description = excluded.description,
                pending = excluded.pending
            WHERE transactions.user_id = excluded.user_id
        "#;

        let result = sqlx::query(query)
            .bind(tx.user_id)
            .bind(tx.transaction_type.as_str())
            .bind(tx.amount.to_string())
            .bind(&tx.category)
            .bind(&tx.description)
            .bind(timestamp(tx.date))
            .bind(&tx.plaid_id)
            .bind(&tx.merchant_name)
            .bind(&tx.account_id)
            .bind(tx.pending)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to upsert transaction: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// All transactions of a user, newest first.
    pub async fn get_user_transactions(&self, user_id: i64) -> Result<Vec<Transaction>> {
        let rows = sqlx::query("SELECT * FROM transactions WHERE user_id = ?1 ORDER BY date DESC, id DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch transactions: {}", e)))?;

        rows.iter().map(transaction_from_row).collect()
    }

    // Credit reports

    pub async fn insert_credit_report(&self, report: &NewCreditReport) -> Result<CreditReport> {
        let now = Utc::now();
        let query = r#"
            INSERT INTO credit_reports (user_id, score, report_date, bureau, factors, report_data)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#;

        let result = sqlx::query(query)
            .bind(report.user_id)
            .bind(report.score)
            .bind(timestamp(now))
            .bind(&report.bureau)
            .bind(&report.factors)
            .bind(&report.report_data)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to insert credit report: {}", e)))?;

        Ok(CreditReport {
            id: result.last_insert_rowid(),
            user_id: report.user_id,
            score: report.score,
            report_date: parse_timestamp(&timestamp(now))?,
            bureau: report.bureau.clone(),
            factors: report.factors.clone(),
            report_data: report.report_data.clone(),
        })
    }

    pub async fn get_latest_credit_report(&self, user_id: i64) -> Result<Option<CreditReport>> {
        let query = "SELECT * FROM credit_reports WHERE user_id = ?1 ORDER BY report_date DESC, id DESC LIMIT 1";
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch credit report: {}", e)))?;

        row.as_ref().map(credit_report_from_row).transpose()
    }

    // Disputes

    pub async fn create_dispute(&self, dispute: &NewDispute) -> Result<Dispute> {
        let query = r#"
            INSERT INTO disputes (user_id, creditor, account_number, reason, status, letter_content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#;

        let result = sqlx::query(query)
            .bind(dispute.user_id)
            .bind(&dispute.creditor)
            .bind(&dispute.account_number)
            .bind(&dispute.reason)
            .bind(DisputeStatus::Pending.as_str())
            .bind(&dispute.letter_content)
            .bind(timestamp(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create dispute: {}", e)))?;

        self.get_dispute(dispute.user_id, result.last_insert_rowid())
            .await?
            .ok_or_else(|| AppError::DatabaseError("Created dispute could not be read back".to_string()))
    }

    /// Looks a dispute up by id, scoped to its owner.
    pub async fn get_dispute(&self, user_id: i64, dispute_id: i64) -> Result<Option<Dispute>> {
        let row = sqlx::query("SELECT * FROM disputes WHERE id = ?1 AND user_id = ?2")
            .bind(dispute_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch dispute: {}", e)))?;

        row.as_ref().map(dispute_from_row).transpose()
    }

    pub async fn get_user_disputes(&self, user_id: i64) -> Result<Vec<Dispute>> {
        let rows = sqlx::query("SELECT * FROM disputes WHERE user_id = ?1 ORDER BY created_at DESC, id DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch disputes: {}", e)))?;

        rows.iter().map(dispute_from_row).collect()
    }

    /// Moves a dispute from `current` to `next`. Returns false when the stored
    /// status is no longer `current`, so concurrent updates cannot both win.
    pub async fn update_dispute_status(
        &self,
        user_id: i64,
        dispute_id: i64,
        current: DisputeStatus,
        next: DisputeStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE disputes SET status = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4 AND status = ?5",
        )
        .bind(next.as_str())
        .bind(timestamp(Utc::now()))
        .bind(dispute_id)
        .bind(user_id)
        .bind(current.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to update dispute: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    // Bank accounts and Plaid items

    pub async fn upsert_bank_account(&self, account: &NewBankAccount) -> Result<()> {
        let query = r#"
            INSERT INTO bank_accounts (user_id, institution_name, account_type, account_number, balance, last_sync, plaid_account_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(plaid_account_id) DO UPDATE SET
                institution_name = excluded.institution_name,
                account_type = excluded.account_type,
                account_number = excluded.account_number,
                balance = excluded.balance,
                last_sync = excluded.last_sync
            WHERE bank_accounts.user_id = excluded.user_id
        "#;

        sqlx::query(query)
            .bind(account.user_id)
            .bind(&account.institution_name)
            .bind(&account.account_type)
            .bind(&account.account_number)
            .bind(account.balance.map(|b| b.to_string()))
            .bind(timestamp(Utc::now()))
            .bind(&account.plaid_account_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to save bank account: {}", e)))?;

        Ok(())
    }

    pub async fn get_user_bank_accounts(&self, user_id: i64) -> Result<Vec<BankAccount>> {
        let rows = sqlx::query("SELECT * FROM bank_accounts WHERE user_id = ?1 ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch bank accounts: {}", e)))?;

        rows.iter().map(bank_account_from_row).collect()
    }

    pub async fn store_plaid_item(
        &self,
        user_id: i64,
        item_id: &str,
        access_token: &str,
        institution_name: Option<&str>,
    ) -> Result<()> {
        let query = r#"
            INSERT INTO plaid_items (user_id, item_id, access_token, institution_name, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(item_id) DO UPDATE SET
                access_token = excluded.access_token,
                institution_name = COALESCE(excluded.institution_name, plaid_items.institution_name)
            WHERE plaid_items.user_id = excluded.user_id
        "#;

        sqlx::query(query)
            .bind(user_id)
            .bind(item_id)
            .bind(access_token)
            .bind(institution_name)
            .bind(timestamp(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to store Plaid item: {}", e)))?;

        Ok(())
    }

    pub async fn get_user_plaid_items(&self, user_id: i64) -> Result<Vec<PlaidItem>> {
        let rows = sqlx::query("SELECT * FROM plaid_items WHERE user_id = ?1 ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch Plaid items: {}", e)))?;

        rows.iter()
            .map(|row| {
                Ok(PlaidItem {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    item_id: row.get("item_id"),
                    access_token: row.get("access_token"),
                    institution_name: row.get("institution_name"),
                    created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
                })
            })
            .collect()
    }

    // Subscriptions

    pub async fn create_subscription(&self, sub: &NewSubscription) -> Result<Subscription> {
        let query = r#"
            INSERT INTO subscriptions (user_id, name, amount, frequency, next_billing, active)
            VALUES (?1, ?2, ?3, ?4, ?5, TRUE)
        "#;

        let result = sqlx::query(query)
            .bind(sub.user_id)
            .bind(&sub.name)
            .bind(sub.amount.to_string())
            .bind(sub.frequency.as_str())
            .bind(sub.next_billing.map(timestamp))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create subscription: {}", e)))?;

        let row = sqlx::query("SELECT * FROM subscriptions WHERE id = ?1")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to read subscription: {}", e)))?;
        subscription_from_row(&row)
    }

    pub async fn get_user_subscriptions(&self, user_id: i64) -> Result<Vec<Subscription>> {
        let rows = sqlx::query("SELECT * FROM subscriptions WHERE user_id = ?1 ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch subscriptions: {}", e)))?;

        rows.iter().map(subscription_from_row).collect()
    }

    /// Returns false when no subscription with that id belongs to the user.
    pub async fn deactivate_subscription(&self, user_id: i64, subscription_id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE subscriptions SET active = FALSE WHERE id = ?1 AND user_id = ?2")
            .bind(subscription_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to deactivate subscription: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}

/// Timestamps are stored as fixed-width RFC 3339 text so they sort correctly.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::DatabaseError(format!("Invalid timestamp '{}': {}", raw, e)))
}

fn parse_optional_timestamp(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_timestamp).transpose()
}

fn parse_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| AppError::DatabaseError(format!("Invalid amount '{}': {}", raw, e)))
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        phone_number: row.get("phone_number"),
        date_of_birth: row.get("date_of_birth"),
        address: row.get("address"),
        city: row.get("city"),
        state: row.get("state"),
        zip_code: row.get("zip_code"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_optional_timestamp(row.get("updated_at"))?,
    })
}

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction> {
    Ok(Transaction {
        id: row.get("id"),
        user_id: row.get("user_id"),
        transaction_type: row.get::<String, _>("transaction_type").parse()?,
        amount: parse_decimal(&row.get::<String, _>("amount"))?,
        category: row.get("category"),
        description: row.get("description"),
        date: parse_timestamp(&row.get::<String, _>("date"))?,
        plaid_id: row.get("plaid_id"),
        merchant_name: row.get("merchant_name"),
        account_id: row.get("account_id"),
        pending: row.get("pending"),
    })
}

fn credit_report_from_row(row: &SqliteRow) -> Result<CreditReport> {
    Ok(CreditReport {
        id: row.get("id"),
        user_id: row.get("user_id"),
        score: row.get("score"),
        report_date: parse_timestamp(&row.get::<String, _>("report_date"))?,
        bureau: row.get("bureau"),
        factors: row.get("factors"),
        report_data: row.get("report_data"),
    })
}

fn dispute_from_row(row: &SqliteRow) -> Result<Dispute> {
    Ok(Dispute {
        id: row.get("id"),
        user_id: row.get("user_id"),
        creditor: row.get("creditor"),
        account_number: row.get("account_number"),
        reason: row.get("reason"),
        status: row.get::<String, _>("status").parse()?,
        letter_content: row.get("letter_content"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_optional_timestamp(row.get("updated_at"))?,
    })
}

fn bank_account_from_row(row: &SqliteRow) -> Result<BankAccount> {
    Ok(BankAccount {
        id: row.get("id"),
        user_id: row.get("user_id"),
        institution_name: row.get("institution_name"),
        account_type: row.get("account_type"),
        account_number: row.get("account_number"),
        balance: row
            .get::<Option<String>, _>("balance")
            .as_deref()
            .map(parse_decimal)
            .transpose()?,
        last_sync: parse_optional_timestamp(row.get("last_sync"))?,
        plaid_account_id: row.get("plaid_account_id"),
    })
}

fn subscription_from_row(row: &SqliteRow) -> Result<Subscription> {
    Ok(Subscription {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        amount: parse_decimal(&row.get::<String, _>("amount"))?,
        frequency: row.get::<String, _>("frequency").parse()?,
        next_billing: parse_optional_timestamp(row.get("next_billing"))?,
        active: row.get("active"),
    })
}
