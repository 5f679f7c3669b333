// File: ./src/mobile.rs
use crate::app::{LabDesk, ListFeed};
use crate::auth::AuthState;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::{
    LabQueueSummary, Patient, Reconciliation, ReconciliationPreview, User, Variance,
    parse_actual_cash,
};
use crate::paths::AppPaths;
use crate::storage::FileTokenStore;
use crate::store::ListQuery;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

#[cfg(target_os = "android")]
use android_logger::Config as LogConfig;
#[cfg(target_os = "android")]
use log::LevelFilter;

#[derive(Debug, uniffi::Error)]
#[uniffi(flat_error)]
pub enum MobileError {
    /// Form errors; the message is the first field message.
    Validation(String),
    /// The session expired. The app should show the login screen.
    Unauthorized(String),
    Busy(String),
    Generic(String),
}
impl From<ApiError> for MobileError {
    fn from(e: ApiError) -> Self {
        let msg = e.to_string();
        match e {
            ApiError::Validation { .. } | ApiError::InvalidCashAmount => Self::Validation(msg),
            ApiError::Unauthorized => Self::Unauthorized(msg),
            ApiError::Busy => Self::Busy(msg),
            _ => Self::Generic(msg),
        }
    }
}
impl From<&str> for MobileError {
    fn from(e: &str) -> Self {
        Self::Generic(e.to_string())
    }
}
impl From<anyhow::Error> for MobileError {
    fn from(e: anyhow::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
impl std::fmt::Display for MobileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                MobileError::Validation(s)
                | MobileError::Unauthorized(s)
                | MobileError::Busy(s)
                | MobileError::Generic(s) => s,
            }
        )
    }
}
impl std::error::Error for MobileError {}

// --- DTOs ---
// Currency crosses the FFI boundary as strings with two decimals.

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

#[derive(uniffi::Record)]
pub struct MobileConfig {
    pub url: String,
    pub username: String,
    pub allow_insecure: bool,
    pub per_page: Option<u32>,
    pub cache_addresses: bool,
}

impl From<&Config> for MobileConfig {
    fn from(c: &Config) -> Self {
        MobileConfig {
            url: c.url.clone(),
            username: c.username.clone(),
            allow_insecure: c.allow_insecure_certs,
            per_page: c.per_page,
            cache_addresses: c.cache_addresses,
        }
    }
}

impl MobileConfig {
    /// Copies the editable settings onto `c`, leaving the rest as saved.
    fn apply_to(self, c: &mut Config) {
        c.url = self.url;
        c.username = self.username;
        c.allow_insecure_certs = self.allow_insecure;
        c.per_page = self.per_page;
        c.cache_addresses = self.cache_addresses;
    }
}

#[derive(uniffi::Record)]
pub struct MobileUser {
    pub id: u64,
    pub name: String,
    pub username: String,
    pub role: String,
}

#[derive(uniffi::Enum)]
pub enum MobileAuthState {
    Uninitialized,
    Hydrating,
    Authenticated { user: MobileUser },
    Unauthenticated,
}

#[derive(uniffi::Record)]
pub struct MobilePatient {
    pub id: u64,
    pub patient_no: Option<String>,
    pub display_name: String,
    pub contact_number: Option<String>,
    pub birth_date_iso: Option<String>,
}

#[derive(uniffi::Record)]
pub struct MobilePatientList {
    pub patients: Vec<MobilePatient>,
    pub has_more: bool,
    pub is_empty_result: bool,
}

#[derive(uniffi::Record)]
pub struct MobileLabQueue {
    pub pending: u32,
    pub processing: u32,
    pub completed: u32,
    pub released: u32,
    pub total: u32,
}

#[derive(uniffi::Record)]
pub struct MobilePreview {
    pub date_iso: String,
    pub expected_cash: String,
    pub transaction_count: u32,
}

#[derive(uniffi::Record)]
pub struct MobileVariance {
    pub amount: String,
    pub display: String,
    pub status: String,
}

#[derive(uniffi::Record)]
pub struct MobileReconciliation {
    pub id: u64,
    pub date_iso: String,
    pub expected_cash: String,
    pub actual_cash: String,
    pub variance: MobileVariance,
    pub transaction_count: u32,
    pub cashier_name: Option<String>,
    pub notes: Option<String>,
}

#[derive(uniffi::Record)]
pub struct MobileReconciliationList {
    pub reconciliations: Vec<MobileReconciliation>,
    pub has_more: bool,
    pub is_empty_result: bool,
}

fn user_to_mobile(u: &User) -> MobileUser {
    MobileUser {
        id: u.id,
        name: u.name.clone(),
        username: u.username.clone(),
        role: u.role.clone(),
    }
}

fn state_to_mobile(state: &AuthState) -> MobileAuthState {
    match state {
        AuthState::Uninitialized => MobileAuthState::Uninitialized,
        AuthState::Hydrating => MobileAuthState::Hydrating,
        AuthState::Authenticated(user) => MobileAuthState::Authenticated {
            user: user_to_mobile(user),
        },
        AuthState::Unauthenticated => MobileAuthState::Unauthenticated,
    }
}

fn patient_to_mobile(p: &Patient) -> MobilePatient {
    MobilePatient {
        id: p.id,
        patient_no: p.patient_no.clone(),
        display_name: p.display_name(),
        contact_number: p.contact_number.clone(),
        birth_date_iso: p.birth_date.map(|d| d.to_string()),
    }
}

fn variance_to_mobile(v: &Variance) -> MobileVariance {
    MobileVariance {
        amount: money(v.amount),
        display: v.display(),
        status: v.status.label().to_string(),
    }
}

fn preview_to_mobile(p: &ReconciliationPreview) -> MobilePreview {
    MobilePreview {
        date_iso: p.date.to_string(),
        expected_cash: money(p.expected_cash),
        transaction_count: p.transaction_count,
    }
}

fn reconciliation_to_mobile(r: &Reconciliation) -> MobileReconciliation {
    // The stored variance and status are shown as the server recorded them.
    let variance = Variance {
        amount: r.variance,
        status: r.status,
    };
    MobileReconciliation {
        id: r.id,
        date_iso: r.date.to_string(),
        expected_cash: money(r.expected_cash),
        actual_cash: money(r.actual_cash),
        variance: variance_to_mobile(&variance),
        transaction_count: r.transaction_count,
        cashier_name: r.cashier.as_ref().map(|c| c.name.clone()),
        notes: r.notes.clone(),
    }
}

fn lab_queue_to_mobile(s: &LabQueueSummary) -> MobileLabQueue {
    MobileLabQueue {
        pending: s.pending,
        processing: s.processing,
        completed: s.completed,
        released: s.released,
        total: s.total(),
    }
}

/// Expected cash comes back from the shell as the preview string; anything
/// that is not a non-negative amount is refused.
fn project(expected_cash: &str, actual_cash: &str) -> Result<Variance, MobileError> {
    let expected = Decimal::from_str(expected_cash.trim())
        .ok()
        .filter(|d| !d.is_sign_negative() || d.is_zero())
        .ok_or(MobileError::from("Invalid expected cash"))?;
    let actual = parse_actual_cash(actual_cash)?;
    Ok(Variance::compute(expected, actual))
}

// --- MAIN OBJECT ---

struct Connected {
    desk: LabDesk,
    patients: ListFeed<Patient>,
    reconciliations: ListFeed<Reconciliation>,
}

impl Connected {
    async fn patient_list(&self) -> MobilePatientList {
        MobilePatientList {
            patients: self
                .patients
                .items()
                .await
                .iter()
                .map(patient_to_mobile)
                .collect(),
            has_more: self.patients.has_more().await,
            is_empty_result: self.patients.is_empty_result().await,
        }
    }

    async fn reconciliation_list(&self) -> MobileReconciliationList {
        MobileReconciliationList {
            reconciliations: self
                .reconciliations
                .items()
                .await
                .iter()
                .map(reconciliation_to_mobile)
                .collect(),
            has_more: self.reconciliations.has_more().await,
            is_empty_result: self.reconciliations.is_empty_result().await,
        }
    }
}

#[derive(uniffi::Object)]
pub struct LabDeskMobile {
    inner: Arc<Mutex<Option<Arc<Connected>>>>,
}

#[uniffi::export(async_runtime = "tokio")]
impl LabDeskMobile {
    #[uniffi::constructor]
    pub fn new(files_dir: String) -> Self {
        #[cfg(target_os = "android")]
        android_logger::init_once(
            LogConfig::default()
                .with_max_level(LevelFilter::Debug)
                .with_tag("LabDeskRust"),
        );
        AppPaths::init_mobile_path(files_dir);
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    pub fn get_config(&self) -> MobileConfig {
        MobileConfig::from(&Config::load().unwrap_or_default())
    }

    /// Saving a new server drops the current connection; the next `hydrate`
    /// reconnects with the new settings.
    pub async fn save_config(
        &self,
        url: String,
        username: String,
        insecure: bool,
        per_page: Option<u32>,
        cache_addresses: bool,
    ) -> Result<(), MobileError> {
        let mut c = Config::load().unwrap_or_default();
        MobileConfig {
            url,
            username,
            allow_insecure: insecure,
            per_page,
            cache_addresses,
        }
        .apply_to(&mut c);
        c.save().map_err(MobileError::from)?;
        *self.inner.lock().await = None;
        Ok(())
    }

    /// App start-up: connects with the saved config and validates any stored
    /// token.
    pub async fn hydrate(&self) -> Result<MobileAuthState, MobileError> {
        let connected = self.connect().await?;
        let state = connected.desk.hydrate().await;
        Ok(state_to_mobile(&state))
    }

    pub async fn get_auth_state(&self) -> MobileAuthState {
        match self.inner.lock().await.clone() {
            Some(connected) => state_to_mobile(&connected.desk.state()),
            None => MobileAuthState::Uninitialized,
        }
    }

    pub async fn login(&self, username: String, password: String) -> Result<MobileUser, MobileError> {
        let connected = self.connect().await?;
        let user = connected.desk.login(&username, &password).await?;

        let mut c = Config::load().unwrap_or_default();
        if c.username != user.username {
            c.username = user.username.clone();
            if let Err(e) = c.save() {
                log::warn!("could not remember username: {}", e);
            }
        }
        Ok(user_to_mobile(&user))
    }

    pub async fn logout(&self) -> Result<(), MobileError> {
        let connected = self.connected().await?;
        connected.desk.logout().await;
        Ok(())
    }

    // --- PATIENTS ---

    /// Pull-to-refresh, or a new search when `search` differs from the
    /// current one.
    pub async fn refresh_patients(
        &self,
        search: Option<String>,
    ) -> Result<MobilePatientList, MobileError> {
        let connected = self.connected().await?;
        let query = ListQuery::new().search(search.as_deref().unwrap_or(""));
        if query.search != connected.patients.query().await.search {
            connected.patients.set_query(query).await?;
        } else {
            connected.patients.refresh().await?;
        }
        Ok(connected.patient_list().await)
    }

    pub async fn on_patients_scrolled(
        &self,
        last_visible_index: u32,
    ) -> Result<MobilePatientList, MobileError> {
        let connected = self.connected().await?;
        connected
            .patients
            .on_scroll(last_visible_index as usize)
            .await?;
        Ok(connected.patient_list().await)
    }

    pub async fn get_patients(&self) -> Result<MobilePatientList, MobileError> {
        let connected = self.connected().await?;
        Ok(connected.patient_list().await)
    }

    // --- LAB QUEUE ---

    pub async fn lab_queue(&self) -> Result<MobileLabQueue, MobileError> {
        let connected = self.connected().await?;
        let summary = connected.desk.client().lab_queue_summary().await?;
        Ok(lab_queue_to_mobile(&summary))
    }

    // --- RECONCILIATION ---

    pub async fn reconciliation_preview(&self) -> Result<MobilePreview, MobileError> {
        let connected = self.connected().await?;
        let preview = connected.desk.reconciliation_preview().await?;
        Ok(preview_to_mobile(&preview))
    }

    /// Live variance while the cashier types. `expected_cash` is the value
    /// from the preview.
    pub fn project_variance(
        &self,
        expected_cash: String,
        actual_cash: String,
    ) -> Result<MobileVariance, MobileError> {
        Ok(variance_to_mobile(&project(&expected_cash, &actual_cash)?))
    }

    pub async fn submit_reconciliation(
        &self,
        actual_cash: String,
        notes: Option<String>,
    ) -> Result<MobileReconciliation, MobileError> {
        let connected = self.connected().await?;
        let created = connected
            .desk
            .submit_reconciliation(&actual_cash, notes)
            .await?;
        Ok(reconciliation_to_mobile(&created))
    }

    pub async fn refresh_reconciliations(&self) -> Result<MobileReconciliationList, MobileError> {
        let connected = self.connected().await?;
        connected.reconciliations.refresh().await?;
        Ok(connected.reconciliation_list().await)
    }

    pub async fn on_reconciliations_scrolled(
        &self,
        last_visible_index: u32,
    ) -> Result<MobileReconciliationList, MobileError> {
        let connected = self.connected().await?;
        connected
            .reconciliations
            .on_scroll(last_visible_index as usize)
            .await?;
        Ok(connected.reconciliation_list().await)
    }
}

impl LabDeskMobile {
    async fn connected(&self) -> Result<Arc<Connected>, MobileError> {
        self.inner
            .lock()
            .await
            .clone()
            .ok_or(MobileError::from("Not connected"))
    }

    /// Reuses the current connection or builds one from the saved config.
    async fn connect(&self) -> Result<Arc<Connected>, MobileError> {
        let mut guard = self.inner.lock().await;
        if let Some(connected) = guard.as_ref() {
            return Ok(connected.clone());
        }
        let config = Config::load().map_err(MobileError::from)?;
        let store = FileTokenStore::default_location().map_err(MobileError::from)?;
        let desk = LabDesk::new(config, Box::new(store))?;
        let connected = Arc::new(Connected {
            patients: desk.patients(),
            reconciliations: desk.reconciliations(),
            desk,
        });
        *guard = Some(connected.clone());
        Ok(connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReconciliationStatus;

    #[test]
    fn test_project_from_preview_strings() {
        let v = project("5000.00", "4,800").unwrap();
        assert_eq!(v.status, ReconciliationStatus::Shortage);
        assert_eq!(variance_to_mobile(&v).display, "-200.00");
    }

    #[test]
    fn test_project_rejects_bad_expected_cash() {
        for bad in ["-1", "-0.01", "abc", ""] {
            assert!(matches!(
                project(bad, "100"),
                Err(MobileError::Generic(_))
            ));
        }
        assert!(matches!(
            project("100", "1e3"),
            Err(MobileError::Validation(_))
        ));
    }

    #[test]
    fn test_settings_carry_address_cache_flag() {
        let mut saved = Config {
            url: "https://old.example/api".into(),
            request_timeout_secs: 12,
            ..Config::default()
        };
        assert!(MobileConfig::from(&saved).cache_addresses);

        MobileConfig {
            url: "https://lab.example/api".into(),
            username: "clerk".into(),
            allow_insecure: true,
            per_page: Some(50),
            cache_addresses: false,
        }
        .apply_to(&mut saved);

        assert!(!saved.cache_addresses);
        assert_eq!(saved.url, "https://lab.example/api");
        assert_eq!(saved.per_page, Some(50));
        assert_eq!(saved.request_timeout_secs, 12);
        assert!(!MobileConfig::from(&saved).cache_addresses);
    }

    #[test]
    fn test_lab_queue_total_saturates() {
        let summary = LabQueueSummary {
            pending: u32::MAX,
            processing: 5,
            completed: 0,
            released: 0,
        };
        assert_eq!(lab_queue_to_mobile(&summary).total, u32::MAX);
    }
}
