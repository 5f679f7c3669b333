// File: src/model/reconciliation.rs
use crate::error::{ApiError, Result};
use crate::model::page::Identified;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rounds a currency amount to cents.
pub fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationStatus {
    Balanced,
    Overage,
    Shortage,
}

impl ReconciliationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReconciliationStatus::Balanced => "Balanced",
            ReconciliationStatus::Overage => "Overage",
            ReconciliationStatus::Shortage => "Shortage",
        }
    }
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Counted cash minus expected cash, with its classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variance {
    pub amount: Decimal,
    pub status: ReconciliationStatus,
}

impl Variance {
    /// Both operands are compared to the cent: `balanced` means exactly zero
    /// after rounding.
    pub fn compute(expected_cash: Decimal, actual_cash: Decimal) -> Self {
        let amount = to_cents(actual_cash) - to_cents(expected_cash);
        let status = if amount.is_zero() {
            ReconciliationStatus::Balanced
        } else if amount.is_sign_positive() {
            ReconciliationStatus::Overage
        } else {
            ReconciliationStatus::Shortage
        };
        Self { amount, status }
    }

    /// Signed amount, "+" for anything that is not a shortage.
    pub fn display(&self) -> String {
        let amount = to_cents(self.amount);
        if amount >= Decimal::ZERO {
            format!("+{:.2}", amount)
        } else {
            format!("{:.2}", amount)
        }
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Integer part: plain digits, or digits grouped in threes by commas
/// ("5200", "5,200", "1,234,567").
fn valid_whole(whole: &str) -> bool {
    if !whole.contains(',') {
        return all_digits(whole);
    }
    let mut groups = whole.split(',');
    let lead_ok = groups
        .next()
        .is_some_and(|g| all_digits(g) && g.len() <= 3);
    lead_ok && groups.all(|g| all_digits(g) && g.len() == 3)
}

/// Parses the cashier's counted amount: digits, an optional decimal part,
/// and optional thousands separators. Signs, exponents, underscores and
/// misplaced commas are rejected.
pub fn parse_actual_cash(input: &str) -> Result<Decimal> {
    let input = input.trim();
    let (whole, fraction) = match input.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (input, None),
    };
    if !valid_whole(whole) || fraction.is_some_and(|f| !all_digits(f)) {
        return Err(ApiError::InvalidCashAmount);
    }
    let cleaned: String = input.chars().filter(|c| *c != ',').collect();
    let amount = Decimal::from_str(&cleaned).map_err(|_| ApiError::InvalidCashAmount)?;
    Ok(to_cents(amount))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cashier {
    pub id: u64,
    pub name: String,
}

/// What the server reports before a count is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationPreview {
    pub date: NaiveDate,
    pub expected_cash: Decimal,
    #[serde(default)]
    pub transaction_count: u32,
}

impl ReconciliationPreview {
    /// Live variance for a counted amount, before submission.
    pub fn project(&self, actual_cash: Decimal) -> Variance {
        Variance::compute(self.expected_cash, actual_cash)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRequest {
    pub actual_cash: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ReconciliationRequest {
    pub fn from_input(actual_cash: &str, notes: Option<String>) -> Result<Self> {
        Ok(Self {
            actual_cash: parse_actual_cash(actual_cash)?,
            notes: notes.filter(|n| !n.trim().is_empty()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub id: u64,
    pub date: NaiveDate,
    pub expected_cash: Decimal,
    pub actual_cash: Decimal,
    pub variance: Decimal,
    pub status: ReconciliationStatus,
    #[serde(default)]
    pub transaction_count: u32,
    #[serde(default)]
    pub cashier: Option<Cashier>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Identified for Reconciliation {
    fn id(&self) -> u64 {
        self.id
    }
}

impl Reconciliation {
    pub fn computed_variance(&self) -> Variance {
        Variance::compute(self.expected_cash, self.actual_cash)
    }

    /// Validates a record received from the server. The arithmetic must hold
    /// exactly; a status mismatch is only logged because the server decides
    /// the tolerance.
    pub fn check(&self) -> Result<()> {
        let computed = self.computed_variance();
        if to_cents(self.variance) != computed.amount {
            return Err(ApiError::Contract(format!(
                "reconciliation {}: variance {} != actual {} - expected {}",
                self.id, self.variance, self.actual_cash, self.expected_cash
            )));
        }
        if computed.status != self.status {
            log::warn!(
                "reconciliation {}: server status {} differs from local classification {}",
                self.id,
                self.status,
                computed.status
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_balanced_when_equal() {
        let v = Variance::compute(d("5000.00"), d("5000.00"));
        assert_eq!(v.amount, Decimal::ZERO);
        assert_eq!(v.status, ReconciliationStatus::Balanced);
        assert_eq!(v.display(), "+0.00");
    }

    #[test]
    fn test_overage() {
        let v = Variance::compute(d("5000"), d("5200"));
        assert_eq!(v.amount, d("200"));
        assert_eq!(v.status, ReconciliationStatus::Overage);
        assert_eq!(v.display(), "+200.00");
    }

    #[test]
    fn test_shortage() {
        let v = Variance::compute(d("5000"), d("4800"));
        assert_eq!(v.amount, d("-200"));
        assert_eq!(v.status, ReconciliationStatus::Shortage);
        assert_eq!(v.display(), "-200.00");
    }

    #[test]
    fn test_sub_cent_drift_is_balanced() {
        let v = Variance::compute(d("1234.5600"), d("1234.564"));
        assert_eq!(v.status, ReconciliationStatus::Balanced);

        let v = Variance::compute(d("1234.56"), d("1234.57"));
        assert_eq!(v.status, ReconciliationStatus::Overage);
        assert_eq!(v.amount, d("0.01"));
    }

    #[test]
    fn test_sign_matches_status_over_a_grid() {
        let amounts = ["0", "0.01", "99.99", "100", "4800", "5000", "5200.50"];
        for e in amounts {
            for a in amounts {
                let v = Variance::compute(d(e), d(a));
                assert_eq!(v.amount, d(a) - d(e));
                let expected = match v.amount.cmp(&Decimal::ZERO) {
                    std::cmp::Ordering::Equal => ReconciliationStatus::Balanced,
                    std::cmp::Ordering::Greater => ReconciliationStatus::Overage,
                    std::cmp::Ordering::Less => ReconciliationStatus::Shortage,
                };
                assert_eq!(v.status, expected, "expected={} actual={}", e, a);
            }
        }
    }

    #[test]
    fn test_parse_actual_cash() {
        assert_eq!(parse_actual_cash(" 5000 ").unwrap(), d("5000"));
        assert_eq!(parse_actual_cash("5,200.50").unwrap(), d("5200.50"));
        assert_eq!(parse_actual_cash("0").unwrap(), Decimal::ZERO);
        assert_eq!(parse_actual_cash("10.005").unwrap(), d("10.01"));

        assert_eq!(parse_actual_cash("1,234,567.89").unwrap(), d("1234567.89"));
        assert_eq!(parse_actual_cash("999,000").unwrap(), d("999000"));

        for bad in [
            "", "   ", "abc", "12a", "-1", "-0.01", "+5", "1e3", "1E-2", "1_000", "1,2,3",
            "12,34", "1234,567", ",100", "100,", "1.2.3", "1.", ".5", "1.0,0",
        ] {
            assert!(
                matches!(parse_actual_cash(bad), Err(ApiError::InvalidCashAmount)),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_request_drops_blank_notes() {
        let req = ReconciliationRequest::from_input("100", Some("  ".to_string())).unwrap();
        assert_eq!(req.notes, None);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["actual_cash"], "100");
        assert!(json.get("notes").is_none());
    }

    #[test]
    fn test_record_decodes_numbers_and_strings() {
        let json = r#"{
            "id": 7,
            "date": "2026-10-19",
            "expected_cash": "5000.00",
            "actual_cash": 4800,
            "variance": "-200.00",
            "status": "shortage",
            "transaction_count": 12,
            "cashier": {"id": 3, "name": "Ana Cruz"}
        }"#;
        let rec: Reconciliation = serde_json::from_str(json).unwrap();
        assert_eq!(rec.status, ReconciliationStatus::Shortage);
        assert_eq!(rec.transaction_count, 12);
        assert!(rec.check().is_ok());
    }

    #[test]
    fn test_check_rejects_broken_arithmetic() {
        let rec = Reconciliation {
            id: 1,
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            expected_cash: d("5000"),
            actual_cash: d("5200"),
            variance: d("150"),
            status: ReconciliationStatus::Overage,
            transaction_count: 3,
            cashier: None,
            notes: None,
            created_at: None,
        };
        assert!(matches!(rec.check(), Err(ApiError::Contract(_))));
    }

    #[test]
    fn test_preview_projection() {
        let preview = ReconciliationPreview {
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            expected_cash: d("5000"),
            transaction_count: 8,
        };
        assert_eq!(
            preview.project(d("5200")).status,
            ReconciliationStatus::Overage
        );
    }
}
