// File: src/model.rs
pub mod page;
pub mod reconciliation;
pub mod records;
pub mod report;

pub use page::{Identified, Page};
pub use reconciliation::{
    Cashier, Reconciliation, ReconciliationPreview, ReconciliationRequest, ReconciliationStatus,
    Variance, parse_actual_cash,
};
pub use records::{
    AddressEntry, Dashboard, Discount, DiscountForm, DiscountKind, InventoryItem,
    InventoryTransaction, LabQueueSummary, LabTest, LabTestStatus, LoginRequest, LoginResponse,
    Patient, PatientAddress, PatientForm, PhilhealthPlan, PhilhealthPlanForm, Service,
    ServiceForm, StockMovement, User, UserForm,
};
pub use report::{
    AuditEntry, AuditLogReport, FinancialEntry, FinancialReport, InventoryLogReport, LabReport,
    ReportKind, ReportRange,
};
