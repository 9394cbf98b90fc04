pub mod auth;
pub mod credit;
pub mod documents;
pub mod finance;
pub mod jwt;
pub mod llm;
pub mod onboarding;
pub mod plaid;
pub mod prompts;
pub mod uploads;
pub mod user_service;
