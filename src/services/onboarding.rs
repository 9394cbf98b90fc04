use crate::models::credit_report::is_valid_score;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

static GOAL_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i),|;|\band\b").expect("valid regex"));
static AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid regex"));
static THREE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}\b").expect("valid regex"));
static NEGATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(no|none|nope|never|don'?t|do not|haven'?t)\b").expect("valid regex"));
static AFFIRMATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(yes|yeah|yep|sure|si|sí|have|i do)\b").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OnboardingStep {
    Goals,
    Income,
    Expenses,
    Credit,
    Summary,
}

impl OnboardingStep {
    /// Missing or unrecognised steps start the flow from the beginning.
    pub fn parse(step: Option<&str>) -> Self {
        match step.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("income") => OnboardingStep::Income,
            Some("expenses") => OnboardingStep::Expenses,
            Some("credit") => OnboardingStep::Credit,
            Some("summary") => OnboardingStep::Summary,
            _ => OnboardingStep::Goals,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingStep::Goals => "goals",
            OnboardingStep::Income => "income",
            OnboardingStep::Expenses => "expenses",
            OnboardingStep::Credit => "credit",
            OnboardingStep::Summary => "summary",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            OnboardingStep::Goals => OnboardingStep::Income,
            OnboardingStep::Income => OnboardingStep::Expenses,
            OnboardingStep::Expenses => OnboardingStep::Credit,
            OnboardingStep::Credit | OnboardingStep::Summary => OnboardingStep::Summary,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financial_goals: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_income: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_expenses: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_credits: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub next_step: OnboardingStep,
    pub data: OnboardingData,
}

/// Folds what the user said at `step` into `data`. The flow only moves on when
/// the answer for the current step could be understood.
pub fn advance(step: OnboardingStep, data: OnboardingData, message: &str) -> Progress {
    let mut data = data;
    let extracted = match step {
        OnboardingStep::Goals => extract_goals(message)
            .map(|goals| data.financial_goals = Some(goals))
            .is_some(),
        OnboardingStep::Income => extract_amount(message)
            .map(|amount| data.monthly_income = Some(amount))
            .is_some(),
        OnboardingStep::Expenses => extract_amount(message)
            .map(|amount| data.monthly_expenses = Some(amount))
            .is_some(),
        OnboardingStep::Credit => match extract_credit(message) {
            Some((has_credits, score)) => {
                data.has_credits = Some(has_credits);
                if score.is_some() {
                    data.credit_score = score;
                }
                true
            }
            None => false,
        },
        OnboardingStep::Summary => false,
    };

    Progress {
        next_step: if extracted { step.next() } else { step },
        data,
    }
}

/// Context handed to the model alongside the onboarding prompt.
pub fn state_message(step: OnboardingStep, first_name: Option<&str>, data: &OnboardingData) -> String {
    let collected = serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string());
    format!(
        "Current onboarding state:\n- Current step: {}\n- User's name: {}\n- Collected data: {}",
        step.as_str(),
        first_name.filter(|n| !n.is_empty()).unwrap_or("not available"),
        collected
    )
}

fn extract_goals(message: &str) -> Option<Vec<String>> {
    let goals: Vec<String> = GOAL_SEPARATOR
        .split(message)
        .map(|goal| goal.trim().trim_end_matches('.').trim().to_string())
        .filter(|goal| !goal.is_empty())
        .collect();
    (!goals.is_empty()).then_some(goals)
}

fn extract_amount(message: &str) -> Option<Decimal> {
    AMOUNT
        .find(message)
        .and_then(|m| Decimal::from_str(&m.as_str().replace(',', "")).ok())
}

fn extract_credit(message: &str) -> Option<(bool, Option<i64>)> {
    let score = THREE_DIGITS
        .find_iter(message)
        .filter_map(|m| m.as_str().parse::<i64>().ok())
        .find(|s| is_valid_score(*s));

    if NEGATIVE.is_match(message) && score.is_none() {
        Some((false, None))
    } else if AFFIRMATIVE.is_match(message) || score.is_some() {
        Some((true, score))
    } else {
        None
    }
}
