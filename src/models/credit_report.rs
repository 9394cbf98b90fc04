use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MIN_CREDIT_SCORE: i64 = 300;
pub const MAX_CREDIT_SCORE: i64 = 850;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CreditRating {
    Excellent,
    Good,
    NeedsImprovement,
}

impl CreditRating {
    pub fn for_score(score: i64) -> Self {
        if score >= 700 {
            CreditRating::Excellent
        } else if score >= 600 {
            CreditRating::Good
        } else {
            CreditRating::NeedsImprovement
        }
    }
}

pub fn is_valid_score(score: i64) -> bool {
    (MIN_CREDIT_SCORE..=MAX_CREDIT_SCORE).contains(&score)
}

#[derive(Debug, Clone)]
pub struct CreditReport {
    pub id: i64,
    pub user_id: i64,
    pub score: i64,
    pub report_date: DateTime<Utc>,
    pub bureau: String,
    pub factors: Option<String>,
    pub report_data: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCreditReport {
    pub user_id: i64,
    pub score: i64,
    pub bureau: String,
    pub factors: Option<String>,
    pub report_data: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditScoreResponse {
    pub id: i64,
    pub score: i64,
    pub bureau: String,
    pub report_date: DateTime<Utc>,
    pub factors: Option<String>,
    pub rating: CreditRating,
}

impl From<CreditReport> for CreditScoreResponse {
    fn from(report: CreditReport) -> Self {
        CreditScoreResponse {
            id: report.id,
            rating: CreditRating::for_score(report.score),
            score: report.score,
            bureau: report.bureau,
            report_date: report.report_date,
            factors: report.factors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bands() {
        assert_eq!(CreditRating::for_score(850), CreditRating::Excellent);
        assert_eq!(CreditRating::for_score(700), CreditRating::Excellent);
        assert_eq!(CreditRating::for_score(699), CreditRating::Good);
        assert_eq!(CreditRating::for_score(600), CreditRating::Good);
        assert_eq!(CreditRating::for_score(599), CreditRating::NeedsImprovement);
    }

    #[test]
    fn score_range_is_inclusive() {
        assert!(is_valid_score(300));
        assert!(is_valid_score(850));
        assert!(!is_valid_score(299));
        assert!(!is_valid_score(851));
    }
}
