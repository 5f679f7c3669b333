// File: src/model/report.rs
use crate::error::{Result, Validator};
use crate::model::records::{InventoryTransaction, LabQueueSummary, LabTest};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Financial,
    InventoryLog,
    AuditLog,
    LabReport,
}

impl ReportKind {
    pub fn path_segment(&self) -> &'static str {
        match self {
            ReportKind::Financial => "financial",
            ReportKind::InventoryLog => "inventory-log",
            ReportKind::AuditLog => "audit-log",
            ReportKind::LabReport => "lab-report",
        }
    }
}

impl std::str::FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "financial" => Ok(ReportKind::Financial),
            "inventory-log" => Ok(ReportKind::InventoryLog),
            "audit-log" => Ok(ReportKind::AuditLog),
            "lab-report" => Ok(ReportKind::LabReport),
            other => Err(format!("unknown report: {}", other)),
        }
    }
}

/// Inclusive date range sent as `from`/`to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl ReportRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        Validator::new()
            .check(
                from <= to,
                "to",
                "The to date must be a date after or equal to from.",
            )
            .finish()?;
        Ok(Self { from, to })
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self { from: day, to: day }
    }

    pub fn to_query(&self) -> String {
        format!(
            "from={}&to={}",
            self.from.format("%Y-%m-%d"),
            self.to.format("%Y-%m-%d")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialEntry {
    pub date: NaiveDate,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
    pub amount: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialReport {
    #[serde(default)]
    pub gross_sales: Decimal,
    #[serde(default)]
    pub total_discounts: Decimal,
    #[serde(default)]
    pub net_sales: Decimal,
    #[serde(default)]
    pub cash_total: Decimal,
    #[serde(default)]
    pub entries: Vec<FinancialEntry>,
}

impl FinancialReport {
    /// Sum of entry amounts; used to cross-check the server totals.
    pub fn entries_total(&self) -> Decimal {
        self.entries.iter().map(|e| e.amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLogReport {
    #[serde(default)]
    pub entries: Vec<InventoryTransaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    #[serde(default)]
    pub user_name: Option<String>,
    pub action: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogReport {
    #[serde(default)]
    pub entries: Vec<AuditEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabReport {
    #[serde(default)]
    pub summary: LabQueueSummary,
    #[serde(default)]
    pub entries: Vec<LabTest>,
}
