// File: src/model/records.rs
use crate::error::{Result, Validator};
use crate::model::page::Identified;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

macro_rules! identified {
    ($($ty:ty),* $(,)?) => {
        $(impl Identified for $ty {
            fn id(&self) -> u64 {
                self.id
            }
        })*
    };
}

// --- Users & Auth ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<()> {
        Validator::new()
            .require("username", &self.username, "username")
            .require("password", &self.password, "password")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserForm {
    pub name: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: String,
    /// Required on create, optional on update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UserForm {
    pub fn validate(&self, creating: bool) -> Result<()> {
        let mut v = Validator::new();
        v.require("name", &self.name, "name")
            .require("username", &self.username, "username")
            .require("role", &self.role, "role");
        if creating {
            v.require("password", self.password.as_deref().unwrap_or(""), "password");
        }
        if let Some(pw) = &self.password {
            v.check(
                pw.is_empty() || pw.chars().count() >= 8,
                "password",
                "The password must be at least 8 characters.",
            );
        }
        if let Some(email) = &self.email {
            v.check(
                email.contains('@'),
                "email",
                "The email must be a valid email address.",
            );
        }
        v.finish()
    }
}

// --- Dashboard ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    #[serde(default)]
    pub revenue_today: Decimal,
    #[serde(default)]
    pub transactions_today: u32,
    #[serde(default)]
    pub patients_today: u32,
    #[serde(default)]
    pub pending_tests: u32,
    #[serde(default)]
    pub low_stock_items: u32,
}

// --- Patients ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientAddress {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub region_code: Option<String>,
    #[serde(default)]
    pub province_code: Option<String>,
    #[serde(default)]
    pub city_code: Option<String>,
    #[serde(default)]
    pub barangay_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: u64,
    #[serde(default)]
    pub patient_no: Option<String>,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(flatten)]
    pub address: PatientAddress,
    #[serde(default)]
    pub philhealth_no: Option<String>,
}

impl Patient {
    /// "Last, First M."
    pub fn display_name(&self) -> String {
        match self.middle_name.as_deref().and_then(|m| m.chars().next()) {
            Some(initial) => format!("{}, {} {}.", self.last_name, self.first_name, initial),
            None => format!("{}, {}", self.last_name, self.first_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientForm {
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(flatten)]
    pub address: PatientAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub philhealth_no: Option<String>,
}

impl PatientForm {
    pub fn validate(&self) -> Result<()> {
        let today = Utc::now().date_naive();
        Validator::new()
            .require("first_name", &self.first_name, "first name")
            .require("last_name", &self.last_name, "last name")
            .check(
                self.birth_date.is_none_or(|d| d <= today),
                "birth_date",
                "The birth date must be a date before or equal to today.",
            )
            .finish()
    }
}

impl From<&Patient> for PatientForm {
    fn from(p: &Patient) -> Self {
        Self {
            first_name: p.first_name.clone(),
            middle_name: p.middle_name.clone(),
            last_name: p.last_name.clone(),
            birth_date: p.birth_date,
            gender: p.gender.clone(),
            contact_number: p.contact_number.clone(),
            address: p.address.clone(),
            philhealth_no: p.philhealth_no.clone(),
        }
    }
}

// --- Inventory ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub reorder_level: Decimal,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockMovement {
    In,
    Out,
    Adjustment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: u64,
    pub item_id: u64,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: StockMovement,
    pub quantity: Decimal,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// --- Lab Queue ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabTestStatus {
    Pending,
    Processing,
    Completed,
    Released,
}

impl LabTestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabTestStatus::Pending => "pending",
            LabTestStatus::Processing => "processing",
            LabTestStatus::Completed => "completed",
            LabTestStatus::Released => "released",
        }
    }
}

impl std::str::FromStr for LabTestStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(LabTestStatus::Pending),
            "processing" => Ok(LabTestStatus::Processing),
            "completed" => Ok(LabTestStatus::Completed),
            "released" => Ok(LabTestStatus::Released),
            other => Err(format!("unknown lab test status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabQueueSummary {
    #[serde(default)]
    pub pending: u32,
    #[serde(default)]
    pub processing: u32,
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub released: u32,
}

impl LabQueueSummary {
    pub fn total(&self) -> u32 {
        self.pending
            .saturating_add(self.processing)
            .saturating_add(self.completed)
            .saturating_add(self.released)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabTest {
    pub id: u64,
    pub patient_name: String,
    pub service_name: String,
    pub status: LabTestStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// --- Services, Discounts, PhilHealth ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceForm {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub price: Decimal,
}

impl ServiceForm {
    pub fn validate(&self) -> Result<()> {
        Validator::new()
            .require("name", &self.name, "name")
            .check(
                !self.price.is_sign_negative() || self.price.is_zero(),
                "price",
                "The price must be at least 0.",
            )
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DiscountKind,
    pub value: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Discount {
    /// Amount taken off a gross price, never more than the price itself.
    pub fn amount_off(&self, gross: Decimal) -> Decimal {
        let off = match self.kind {
            DiscountKind::Percentage => gross * self.value / Decimal::ONE_HUNDRED,
            DiscountKind::Fixed => self.value,
        };
        crate::model::reconciliation::to_cents(off.min(gross))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountForm {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DiscountKind,
    pub value: Decimal,
}

impl DiscountForm {
    pub fn validate(&self) -> Result<()> {
        let mut v = Validator::new();
        v.require("name", &self.name, "name").check(
            !self.value.is_sign_negative() || self.value.is_zero(),
            "value",
            "The value must be at least 0.",
        );
        if self.kind == DiscountKind::Percentage {
            v.check(
                self.value <= Decimal::ONE_HUNDRED,
                "value",
                "The value may not be greater than 100.",
            );
        }
        v.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhilhealthPlan {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    pub coverage_amount: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhilhealthPlanForm {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub coverage_amount: Decimal,
}

impl PhilhealthPlanForm {
    pub fn validate(&self) -> Result<()> {
        Validator::new()
            .require("name", &self.name, "name")
            .check(
                !self.coverage_amount.is_sign_negative() || self.coverage_amount.is_zero(),
                "coverage_amount",
                "The coverage amount must be at least 0.",
            )
            .finish()
    }
}

// --- Address ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub code: String,
    pub name: String,
}

identified!(
    User,
    Patient,
    InventoryItem,
    InventoryTransaction,
    LabTest,
    Service,
    Discount,
    PhilhealthPlan,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_patient_flattened_address() {
        let json = r#"{
            "id": 1, "first_name": "Juan", "middle_name": "Santos", "last_name": "Dela Cruz",
            "birth_date": "1990-05-01", "region_code": "13", "city_code": "137404",
            "street": "12 Rizal St"
        }"#;
        let p: Patient = serde_json::from_str(json).unwrap();
        assert_eq!(p.address.region_code.as_deref(), Some("13"));
        assert_eq!(p.address.street.as_deref(), Some("12 Rizal St"));
        assert_eq!(p.display_name(), "Dela Cruz, Juan S.");

        let form = PatientForm::from(&p);
        let body = serde_json::to_value(&form).unwrap();
        assert_eq!(body["city_code"], "137404");
        assert!(body.get("gender").is_none());
    }

    #[test]
    fn test_patient_form_requires_names() {
        let form = PatientForm {
            first_name: "".into(),
            middle_name: None,
            last_name: "Reyes".into(),
            birth_date: None,
            gender: None,
            contact_number: None,
            address: PatientAddress::default(),
            philhealth_no: None,
        };
        let err = form.validate().unwrap_err();
        assert!(err.field_message("first_name").is_some());
        assert!(err.field_message("last_name").is_none());
    }

    #[test]
    fn test_service_form_rejects_negative_price() {
        let form = ServiceForm {
            name: "CBC".into(),
            code: None,
            category: None,
            price: d("-1"),
        };
        assert!(matches!(form.validate(), Err(ApiError::Validation { .. })));
    }

    #[test]
    fn test_percentage_discount_capped() {
        let form = DiscountForm {
            name: "Senior".into(),
            kind: DiscountKind::Percentage,
            value: d("120"),
        };
        assert!(form.validate().unwrap_err().field_message("value").is_some());

        let fixed = DiscountForm {
            kind: DiscountKind::Fixed,
            ..form
        };
        assert!(fixed.validate().is_ok());
    }

    #[test]
    fn test_discount_amount_off() {
        let senior = Discount {
            id: 1,
            name: "Senior".into(),
            kind: DiscountKind::Percentage,
            value: d("20"),
            is_active: true,
        };
        assert_eq!(senior.amount_off(d("450")), d("90"));

        let voucher = Discount {
            kind: DiscountKind::Fixed,
            value: d("500"),
            ..senior
        };
        assert_eq!(voucher.amount_off(d("300")), d("300"));
    }

    #[test]
    fn test_user_form_password_rules() {
        let mut form = UserForm {
            name: "Ana".into(),
            username: "ana".into(),
            email: None,
            role: "cashier".into(),
            password: None,
        };
        assert!(form.validate(false).is_ok());
        assert!(form.validate(true).is_err());
        form.password = Some("short".into());
        assert!(form.validate(true).unwrap_err().field_message("password").is_some());
        form.password = Some("long-enough".into());
        assert!(form.validate(true).is_ok());
    }

    #[test]
    fn test_inventory_transaction_type_field() {
        let json = r#"{"id": 9, "item_id": 2, "type": "out", "quantity": "3"}"#;
        let tx: InventoryTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.kind, StockMovement::Out);
        assert_eq!(tx.quantity, d("3"));
    }

    #[test]
    fn test_lab_status_parse_and_total() {
        assert_eq!(
            LabTestStatus::from_str("Released").unwrap(),
            LabTestStatus::Released
        );
        assert!(LabTestStatus::from_str("lost").is_err());
        let summary: LabQueueSummary =
            serde_json::from_str(r#"{"pending": 4, "processing": 2, "completed": 1}"#).unwrap();
        assert_eq!(summary.total(), 7);
    }

    #[test]
    fn test_queue_total_does_not_overflow() {
        let summary = LabQueueSummary {
            pending: u32::MAX,
            processing: 3,
            ..LabQueueSummary::default()
        };
        assert_eq!(summary.total(), u32::MAX);
    }

    #[test]
    fn test_low_stock() {
        let item = InventoryItem {
            id: 1,
            name: "EDTA tube".into(),
            category: None,
            unit: Some("pc".into()),
            quantity: d("10"),
            reorder_level: d("10"),
            expiry_date: None,
        };
        assert!(item.is_low_stock());
    }
}
