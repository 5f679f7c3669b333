// File: src/client/endpoints.rs
use crate::client::core::ApiClient;
use crate::error::{ApiError, Result};
use crate::model::{
    AuditLogReport, Dashboard, Discount, DiscountForm, FinancialReport, InventoryItem,
    InventoryLogReport, InventoryTransaction, LabQueueSummary, LabReport, LabTest, LoginRequest,
    LoginResponse, Page, Patient, PatientForm, PhilhealthPlan, PhilhealthPlanForm,
    Reconciliation, ReconciliationPreview, ReconciliationRequest, ReportKind, ReportRange,
    Service, ServiceForm, User, UserForm,
};
use crate::store::ListQuery;
use http::Method;

fn listing(resource: &str, query: &ListQuery, page: u32) -> String {
    format!("{}?{}", resource, query.to_query_string(page))
}

impl ApiClient {
    // --- AUTH ---

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        request.validate()?;
        let response: LoginResponse = self.post("/login", request).await?;
        if response.token.is_empty() {
            return Err(ApiError::Decode("/login: empty token".to_string()));
        }
        Ok(response)
    }

    pub async fn logout(&self) -> Result<()> {
        self.send_discarding(Method::POST, "/logout", None).await
    }

    pub async fn me(&self) -> Result<User> {
        self.get("/user").await
    }

    pub async fn dashboard(&self) -> Result<Dashboard> {
        self.get("/dashboard").await
    }

    // --- PATIENTS ---

    pub async fn patients(&self, query: &ListQuery, page: u32) -> Result<Page<Patient>> {
        self.get(&listing("/patients", query, page)).await
    }

    pub async fn patient(&self, id: u64) -> Result<Patient> {
        self.get(&format!("/patients/{}", id)).await
    }

    pub async fn update_patient(&self, id: u64, form: &PatientForm) -> Result<Patient> {
        form.validate()?;
        self.put(&format!("/patients/{}", id), form).await
    }

    // --- INVENTORY ---

    pub async fn inventory(&self, query: &ListQuery, page: u32) -> Result<Page<InventoryItem>> {
        self.get(&listing("/inventory", query, page)).await
    }

    pub async fn inventory_transactions(
        &self,
        query: &ListQuery,
        page: u32,
    ) -> Result<Page<InventoryTransaction>> {
        self.get(&listing("/inventory/transactions", query, page))
            .await
    }

    // --- LAB QUEUE ---

    pub async fn lab_queue_summary(&self) -> Result<LabQueueSummary> {
        self.get("/lab-queue/summary").await
    }

    /// Filter by status with `ListQuery::filter("status", "pending")`.
    pub async fn lab_tests(&self, query: &ListQuery, page: u32) -> Result<Page<LabTest>> {
        self.get(&listing("/lab-queue/tests", query, page)).await
    }

    // --- SERVICES ---

    pub async fn services(&self, query: &ListQuery, page: u32) -> Result<Page<Service>> {
        self.get(&listing("/services", query, page)).await
    }

    pub async fn create_service(&self, form: &ServiceForm) -> Result<Service> {
        form.validate()?;
        self.post("/services", form).await
    }

    pub async fn update_service(&self, id: u64, form: &ServiceForm) -> Result<Service> {
        form.validate()?;
        self.put(&format!("/services/{}", id), form).await
    }

    pub async fn toggle_service(&self, id: u64) -> Result<Service> {
        self.post_empty(&format!("/services/{}/toggle", id)).await
    }

    // --- DISCOUNTS ---

    pub async fn discounts(&self, query: &ListQuery, page: u32) -> Result<Page<Discount>> {
        self.get(&listing("/discounts", query, page)).await
    }

    pub async fn create_discount(&self, form: &DiscountForm) -> Result<Discount> {
        form.validate()?;
        self.post("/discounts", form).await
    }

    pub async fn update_discount(&self, id: u64, form: &DiscountForm) -> Result<Discount> {
        form.validate()?;
        self.put(&format!("/discounts/{}", id), form).await
    }

    pub async fn toggle_discount(&self, id: u64) -> Result<Discount> {
        self.post_empty(&format!("/discounts/{}/toggle", id)).await
    }

    // --- PHILHEALTH PLANS ---

    pub async fn philhealth_plans(
        &self,
        query: &ListQuery,
        page: u32,
    ) -> Result<Page<PhilhealthPlan>> {
        self.get(&listing("/philhealth-plans", query, page)).await
    }

    pub async fn create_philhealth_plan(&self, form: &PhilhealthPlanForm) -> Result<PhilhealthPlan> {
        form.validate()?;
        self.post("/philhealth-plans", form).await
    }

    pub async fn update_philhealth_plan(
        &self,
        id: u64,
        form: &PhilhealthPlanForm,
    ) -> Result<PhilhealthPlan> {
        form.validate()?;
        self.put(&format!("/philhealth-plans/{}", id), form).await
    }

    // --- USERS ---

    pub async fn users(&self, query: &ListQuery, page: u32) -> Result<Page<User>> {
        self.get(&listing("/users", query, page)).await
    }

    pub async fn create_user(&self, form: &UserForm) -> Result<User> {
        form.validate(true)?;
        self.post("/users", form).await
    }

    pub async fn update_user(&self, id: u64, form: &UserForm) -> Result<User> {
        form.validate(false)?;
        self.put(&format!("/users/{}", id), form).await
    }

    pub async fn toggle_user(&self, id: u64) -> Result<User> {
        self.post_empty(&format!("/users/{}/toggle", id)).await
    }

    // --- RECONCILIATION ---

    pub async fn reconciliations(
        &self,
        query: &ListQuery,
        page: u32,
    ) -> Result<Page<Reconciliation>> {
        let page: Page<Reconciliation> = self.get(&listing("/reconciliations", query, page)).await?;
        for rec in &page.data {
            rec.check()?;
        }
        Ok(page)
    }

    /// Expected cash and transaction count for today, before counting.
    pub async fn reconciliation_preview(&self) -> Result<ReconciliationPreview> {
        self.get("/reconciliations/create").await
    }

    /// Creates one record per call. Callers guard against double submission.
    pub async fn create_reconciliation(
        &self,
        request: &ReconciliationRequest,
    ) -> Result<Reconciliation> {
        if request.actual_cash.is_sign_negative() && !request.actual_cash.is_zero() {
            return Err(ApiError::InvalidCashAmount);
        }
        let rec: Reconciliation = self.post("/reconciliations", request).await?;
        rec.check()?;
        log::info!(
            "reconciliation {} submitted: {} ({})",
            rec.id,
            rec.status,
            rec.variance
        );
        Ok(rec)
    }

    pub async fn reconciliation(&self, id: u64) -> Result<Reconciliation> {
        let rec: Reconciliation = self.get(&format!("/reconciliations/{}", id)).await?;
        rec.check()?;
        Ok(rec)
    }

    // --- REPORTS ---

    fn report_path(kind: ReportKind, range: &ReportRange) -> String {
        format!("/reports/{}?{}", kind.path_segment(), range.to_query())
    }

    pub async fn financial_report(&self, range: &ReportRange) -> Result<FinancialReport> {
        let report: FinancialReport = self
            .get(&Self::report_path(ReportKind::Financial, range))
            .await?;
        if report.entries_total() != report.net_sales && !report.entries.is_empty() {
            log::warn!(
                "financial report entries sum to {} but net sales is {}",
                report.entries_total(),
                report.net_sales
            );
        }
        Ok(report)
    }

    pub async fn inventory_log_report(&self, range: &ReportRange) -> Result<InventoryLogReport> {
        self.get(&Self::report_path(ReportKind::InventoryLog, range))
            .await
    }

    pub async fn audit_log_report(&self, range: &ReportRange) -> Result<AuditLogReport> {
        self.get(&Self::report_path(ReportKind::AuditLog, range))
            .await
    }

    pub async fn lab_report(&self, range: &ReportRange) -> Result<LabReport> {
        self.get(&Self::report_path(ReportKind::LabReport, range))
            .await
    }
}
