pub mod bank_account;
pub mod credit_report;
pub mod dispute;
pub mod subscription;
pub mod transaction;
pub mod user;
