use crate::errors::{AppError, Result};
use crate::models::transaction::{Transaction, TransactionType};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Totals {
    pub income: Decimal,
    pub expenses: Decimal,
    pub balance: Decimal,
}

fn overflow() -> AppError {
    AppError::InternalError("Transaction amounts overflow the balance".to_string())
}

fn add(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or_else(overflow)
}

pub fn totals(transactions: &[Transaction]) -> Result<Totals> {
    let mut income = Decimal::ZERO;
    let mut expenses = Decimal::ZERO;
    for tx in transactions {
        match tx.transaction_type {
            TransactionType::Income => income = add(income, tx.amount)?,
            TransactionType::Expense => expenses = add(expenses, tx.amount)?,
        }
    }

    Ok(Totals {
        income,
        expenses,
        balance: income.checked_sub(expenses).ok_or_else(overflow)?,
    })
}

/// Running balance at the end of each day that has activity, oldest first.
pub fn balance_trend(transactions: &[Transaction]) -> Result<Vec<TrendPoint>> {
    let mut per_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for tx in transactions {
        let signed = match tx.transaction_type {
            TransactionType::Income => tx.amount,
            TransactionType::Expense => -tx.amount,
        };
        let day = per_day.entry(tx.date.date_naive()).or_insert(Decimal::ZERO);
        *day = add(*day, signed)?;
    }

    let mut running = Decimal::ZERO;
    per_day
        .into_iter()
        .map(|(date, delta)| {
            running = add(running, delta)?;
            Ok(TrendPoint { date, balance: running })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    fn tx(kind: TransactionType, amount: &str, day: u32) -> Transaction {
        Transaction {
            id: day as i64,
            user_id: 1,
            transaction_type: kind,
            amount: Decimal::from_str(amount).unwrap(),
            category: None,
            description: None,
            date: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
            plaid_id: None,
            merchant_name: None,
            account_id: None,
            pending: false,
        }
    }

    #[test]
    fn balance_is_income_minus_expenses_exactly() {
        let txs = vec![
            tx(TransactionType::Income, "0.1", 1),
            tx(TransactionType::Income, "0.2", 2),
            tx(TransactionType::Expense, "0.3", 3),
        ];
        let totals = totals(&txs).unwrap();
        assert_eq!(totals.income, Decimal::from_str("0.3").unwrap());
        assert_eq!(totals.expenses, Decimal::from_str("0.3").unwrap());
        assert_eq!(totals.balance, Decimal::ZERO);
    }

    #[test]
    fn empty_history_sums_to_zero() {
        let totals = totals(&[]).unwrap();
        assert_eq!(totals.balance, Decimal::ZERO);
        assert!(balance_trend(&[]).unwrap().is_empty());
    }

    #[test]
    fn trend_accumulates_per_day_in_date_order() {
        // Newest first, the way the store returns them.
        let txs = vec![
            tx(TransactionType::Expense, "40", 5),
            tx(TransactionType::Expense, "10", 2),
            tx(TransactionType::Income, "100", 2),
            tx(TransactionType::Income, "50", 1),
        ];
        let trend = balance_trend(&txs).unwrap();
        let balances: Vec<String> = trend.iter().map(|p| p.balance.to_string()).collect();
        assert_eq!(balances, vec!["50", "140", "100"]);
        assert_eq!(trend[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn huge_amounts_fail_instead_of_panicking() {
        let huge = "70000000000000000000000000000";
        let txs = vec![tx(TransactionType::Income, huge, 1), tx(TransactionType::Income, huge, 2)];
        assert!(matches!(totals(&txs), Err(AppError::InternalError(_))));

        let same_day = vec![tx(TransactionType::Expense, huge, 3), tx(TransactionType::Expense, huge, 3)];
        assert!(balance_trend(&same_day).is_err());
        assert!(balance_trend(&txs).is_err());
    }
}
