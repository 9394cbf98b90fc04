use crate::errors::{AppError, Result};
use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

/// Largest amount accepted for a single transaction or subscription.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000_000;
/// Dates must fall inside these years so they store as plain RFC 3339.
pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 9999;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex"));
static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid username regex"));
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\+\d{8,15}|\d{8,15})$").expect("valid phone regex"));

pub struct Validator;

impl Validator {
    pub fn validate_email(email: &str) -> Result<()> {
        if email.len() > 254 {
            return Err(AppError::ValidationError("Email too long".to_string()));
        }
        if !EMAIL_RE.is_match(email) {
            return Err(AppError::ValidationError("Invalid email format".to_string()));
        }
        Ok(())
    }

    pub fn validate_username(username: &str) -> Result<()> {
        if username.len() < 3 {
            return Err(AppError::ValidationError("Username must be at least 3 characters long".to_string()));
        }
        if username.len() > 30 {
            return Err(AppError::ValidationError("Username must be at most 30 characters".to_string()));
        }
        if !USERNAME_RE.is_match(username) {
            return Err(AppError::ValidationError(
                "Username can only contain letters, numbers, underscores, and hyphens".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_password(password: &str) -> Result<()> {
        if password.len() < 8 {
            return Err(AppError::ValidationError("Password must be at least 8 characters long".to_string()));
        }
        if password.len() > 128 {
            return Err(AppError::ValidationError("Password must be at most 128 characters".to_string()));
        }
        if !password.chars().any(|c| c.is_alphabetic()) {
            return Err(AppError::ValidationError("Password must contain at least one letter".to_string()));
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AppError::ValidationError("Password must contain at least one digit".to_string()));
        }
        Ok(())
    }

    pub fn validate_phone(phone: &str) -> Result<()> {
        if !PHONE_RE.is_match(phone.trim()) {
            return Err(AppError::ValidationError(
                "Invalid phone number format. Use +countrycode and 8-15 digits.".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_amount(amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(AppError::ValidationError("Amount must be greater than zero".to_string()));
        }
        if amount > Decimal::from(MAX_AMOUNT) {
            return Err(AppError::ValidationError(format!("Amount must be at most {}", MAX_AMOUNT)));
        }
        Ok(())
    }

    /// Checks the year after conversion to UTC; `9999-12-31T23:59:59-05:00`
    /// is already in year 10000.
    pub fn validate_date(field: &str, date: &DateTime<Utc>) -> Result<()> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
            return Err(AppError::ValidationError(format!(
                "{} must be between the years {} and {}",
                field, MIN_YEAR, MAX_YEAR
            )));
        }
        Ok(())
    }

    pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(AppError::ValidationError(format!("{} is required", field)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(Validator::validate_email("andy@example.com").is_ok());
        assert!(Validator::validate_email("andy@example").is_err());
        assert!(Validator::validate_email("not an email").is_err());
    }

    #[test]
    fn usernames() {
        assert!(Validator::validate_username("andy_ai-1").is_ok());
        assert!(Validator::validate_username("ab").is_err());
        assert!(Validator::validate_username("with space").is_err());
        assert!(Validator::validate_username(&"x".repeat(31)).is_err());
    }

    #[test]
    fn passwords_need_letters_and_digits() {
        assert!(Validator::validate_password("test1234").is_ok());
        assert!(Validator::validate_password("short1").is_err());
        assert!(Validator::validate_password("onlyletters").is_err());
        assert!(Validator::validate_password("12345678").is_err());
    }

    #[test]
    fn amounts_are_positive_and_bounded() {
        assert!(Validator::validate_amount(Decimal::new(999, 2)).is_ok());
        assert!(Validator::validate_amount(Decimal::from(MAX_AMOUNT)).is_ok());
        assert!(Validator::validate_amount(Decimal::ZERO).is_err());
        assert!(Validator::validate_amount(Decimal::from(-5)).is_err());
        assert!(Validator::validate_amount(Decimal::from(MAX_AMOUNT) + Decimal::ONE).is_err());
    }

    #[test]
    fn dates_stay_within_four_digit_years() {
        let parse = |raw: &str| DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc);
        assert!(Validator::validate_date("Date", &parse("2024-03-01T09:00:00Z")).is_ok());
        assert!(Validator::validate_date("Date", &parse("9999-12-31T23:59:59Z")).is_ok());
        assert!(Validator::validate_date("Date", &parse("9999-12-31T23:59:59-05:00")).is_err());
        assert!(Validator::validate_date("Date", &parse("1899-12-31T00:00:00Z")).is_err());
    }

    #[test]
    fn phones() {
        assert!(Validator::validate_phone("+5215512345678").is_ok());
        assert!(Validator::validate_phone("12-34").is_err());
    }
}
