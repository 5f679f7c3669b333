// File: src/app.rs
use crate::auth::{Auth, AuthState};
use crate::cache::Cache;
use crate::client::{AddressBook, ApiClient};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::model::{
    Discount, Identified, InventoryItem, InventoryTransaction, LabTest, Page, Patient,
    PhilhealthPlan, Reconciliation, ReconciliationPreview, ReconciliationRequest, Service, User,
    Variance,
};
use crate::session::{Session, TokenStore};
use crate::store::{Applied, ListQuery, PagedList, Ticket};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

pub type PageFetcher<T> = Arc<dyn Fn(ListQuery, u32) -> BoxFuture<'static, Result<Page<T>>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The response was applied; `added` new rows.
    Loaded { added: usize },
    /// Nothing was requested: a load is running or the last page is shown.
    Skipped,
    /// A newer refresh or filter change made this response obsolete.
    Stale,
}

/// Drives a `PagedList` against the API. The state lock is never held while
/// a request is in flight.
pub struct ListFeed<T> {
    state: Mutex<PagedList<T>>,
    fetch: PageFetcher<T>,
}

impl<T> ListFeed<T>
where
    T: Identified + Clone + Send + 'static,
{
    pub fn new(fetch: PageFetcher<T>) -> Self {
        Self::with_query(fetch, ListQuery::default())
    }

    pub fn with_query(fetch: PageFetcher<T>, query: ListQuery) -> Self {
        Self {
            state: Mutex::new(PagedList::with_query(query)),
            fetch,
        }
    }

    pub async fn items(&self) -> Vec<T> {
        self.state.lock().await.items().to_vec()
    }

    pub async fn is_empty_result(&self) -> bool {
        self.state.lock().await.is_empty_result()
    }

    pub async fn has_more(&self) -> bool {
        self.state.lock().await.has_more()
    }

    pub async fn query(&self) -> ListQuery {
        self.state.lock().await.query().clone()
    }

    /// Pull-to-refresh.
    pub async fn refresh(&self) -> Result<LoadOutcome> {
        let ticket = self.state.lock().await.begin_refresh();
        self.run(ticket).await
    }

    /// New search/filter; replaces the rows once the first page arrives.
    pub async fn set_query(&self, query: ListQuery) -> Result<LoadOutcome> {
        let ticket = self.state.lock().await.begin_query(query);
        self.run(ticket).await
    }

    pub async fn load_more(&self) -> Result<LoadOutcome> {
        let ticket = self.state.lock().await.begin_next_page();
        match ticket {
            Some(ticket) => self.run(ticket).await,
            None => Ok(LoadOutcome::Skipped),
        }
    }

    /// Infinite scroll: fetch the next page once the reader is close to the end.
    pub async fn on_scroll(&self, last_visible_index: usize) -> Result<LoadOutcome> {
        let near_end = self.state.lock().await.near_end(last_visible_index);
        if !near_end {
            return Ok(LoadOutcome::Skipped);
        }
        self.load_more().await
    }

    async fn run(&self, ticket: Ticket) -> Result<LoadOutcome> {
        let result = (self.fetch)(ticket.query.clone(), ticket.page).await;
        let mut state = self.state.lock().await;
        match result {
            Ok(page) => Ok(match state.complete(&ticket, page) {
                Applied::Rows { added } => LoadOutcome::Loaded { added },
                Applied::Stale => LoadOutcome::Stale,
            }),
            Err(e) => {
                if state.fail(&ticket, &e.to_string()) == Applied::Stale {
                    return Ok(LoadOutcome::Stale);
                }
                log::warn!("page {} failed: {}", ticket.page, e);
                Err(e)
            }
        }
    }
}

/// The client-side application core: one session, one API client, and the
/// flows the screens call.
pub struct LabDesk {
    config: Config,
    client: ApiClient,
    auth: Auth,
    addresses: AddressBook,
    submitting: AtomicBool,
}

/// Clears the in-flight flag when a submission ends, however it ends.
struct SubmitGuard<'a>(&'a AtomicBool);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl LabDesk {
    pub fn new(config: Config, store: Box<dyn TokenStore>) -> Result<Self> {
        let cache = if config.cache_addresses {
            match Cache::default_location() {
                Ok(cache) => Some(cache),
                Err(e) => {
                    log::warn!("address cache disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };
        Self::with_cache(config, store, cache)
    }

    pub fn with_cache(
        config: Config,
        store: Box<dyn TokenStore>,
        cache: Option<Cache>,
    ) -> Result<Self> {
        let session = Arc::new(Session::new(store));
        let client = ApiClient::new(&config, session)?;
        Ok(Self {
            auth: Auth::new(client.clone()),
            addresses: AddressBook::new(client.clone(), cache),
            client,
            config,
            submitting: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn addresses(&self) -> &AddressBook {
        &self.addresses
    }

    // --- SESSION ---

    pub async fn hydrate(&self) -> AuthState {
        self.auth.hydrate().await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        self.auth.login(username, password).await
    }

    pub async fn logout(&self) {
        self.auth.logout().await
    }

    /// Never waits on a request in flight.
    pub fn state(&self) -> AuthState {
        self.auth.state()
    }

    pub fn current_user(&self) -> Option<User> {
        self.auth.current_user()
    }

    // --- LISTS ---

    fn feed<T, F, Fut>(&self, fetch: F) -> ListFeed<T>
    where
        T: Identified + Clone + Send + 'static,
        F: Fn(ApiClient, ListQuery, u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Page<T>>> + Send + 'static,
    {
        let client = self.client.clone();
        let fetcher: PageFetcher<T> = Arc::new(move |query: ListQuery, page: u32| {
            fetch(client.clone(), query, page).boxed()
        });
        ListFeed::with_query(fetcher, ListQuery::new().per_page(self.config.per_page))
    }

    pub fn patients(&self) -> ListFeed<Patient> {
        self.feed(|c, q, p| async move { c.patients(&q, p).await })
    }

    pub fn inventory(&self) -> ListFeed<InventoryItem> {
        self.feed(|c, q, p| async move { c.inventory(&q, p).await })
    }

    pub fn inventory_transactions(&self) -> ListFeed<InventoryTransaction> {
        self.feed(|c, q, p| async move { c.inventory_transactions(&q, p).await })
    }

    pub fn lab_tests(&self) -> ListFeed<LabTest> {
        self.feed(|c, q, p| async move { c.lab_tests(&q, p).await })
    }

    pub fn services(&self) -> ListFeed<Service> {
        self.feed(|c, q, p| async move { c.services(&q, p).await })
    }

    pub fn discounts(&self) -> ListFeed<Discount> {
        self.feed(|c, q, p| async move { c.discounts(&q, p).await })
    }

    pub fn philhealth_plans(&self) -> ListFeed<PhilhealthPlan> {
        self.feed(|c, q, p| async move { c.philhealth_plans(&q, p).await })
    }

    pub fn users(&self) -> ListFeed<User> {
        self.feed(|c, q, p| async move { c.users(&q, p).await })
    }

    pub fn reconciliations(&self) -> ListFeed<Reconciliation> {
        self.feed(|c, q, p| async move { c.reconciliations(&q, p).await })
    }

    // --- RECONCILIATION ---

    pub async fn reconciliation_preview(&self) -> Result<ReconciliationPreview> {
        self.client.reconciliation_preview().await
    }

    /// Live variance for what the cashier has typed so far.
    pub fn project_variance(preview: &ReconciliationPreview, input: &str) -> Result<Variance> {
        let request = ReconciliationRequest::from_input(input, None)?;
        Ok(preview.project(request.actual_cash))
    }

    /// Validates the counted amount locally, then submits it. Only one
    /// submission may be in flight at a time.
    pub async fn submit_reconciliation(
        &self,
        actual_cash: &str,
        notes: Option<String>,
    ) -> Result<Reconciliation> {
        let request = ReconciliationRequest::from_input(actual_cash, notes)?;

        if self
            .submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ApiError::Busy);
        }
        let _guard = SubmitGuard(&self.submitting);
        self.client.create_reconciliation(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::oneshot;

    #[derive(Debug, Clone, PartialEq)]
    struct Row(u64);

    impl Identified for Row {
        fn id(&self) -> u64 {
            self.0
        }
    }

    fn rows(ids: std::ops::Range<u64>, current: u32, last: u32) -> Page<Row> {
        Page {
            current_page: current,
            data: ids.map(Row).collect(),
            last_page: last,
            per_page: None,
            total: None,
            from: None,
            to: None,
        }
    }

    fn fetcher<F>(f: F) -> PageFetcher<Row>
    where
        F: Fn(ListQuery, u32) -> BoxFuture<'static, Result<Page<Row>>> + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    fn static_feed() -> ListFeed<Row> {
        ListFeed::new(fetcher(|_q: ListQuery, page: u32| {
            async move {
                match page {
                    1 => Ok(rows(1..4, 1, 2)),
                    2 => Ok(rows(4..6, 2, 2)),
                    _ => Err(ApiError::Network("no such page".to_string())),
                }
            }
            .boxed()
        }))
    }

    #[tokio::test]
    async fn test_feed_pages_forward() {
        let feed = static_feed();
        assert_eq!(feed.refresh().await.unwrap(), LoadOutcome::Loaded { added: 3 });
        assert_eq!(feed.load_more().await.unwrap(), LoadOutcome::Loaded { added: 2 });
        assert_eq!(feed.load_more().await.unwrap(), LoadOutcome::Skipped);
        let ids: Vec<u64> = feed.items().await.iter().map(|r| r.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_scroll_near_end_loads_next_page() {
        let feed = static_feed();
        feed.refresh().await.unwrap();
        // 3 rows loaded, threshold 5: any index is near the end
        assert_eq!(feed.on_scroll(0).await.unwrap(), LoadOutcome::Loaded { added: 2 });
    }

    #[tokio::test]
    async fn test_failed_page_keeps_rows() {
        let calls = Arc::new(StdMutex::new(0u32));
        let counter = calls.clone();
        let feed = ListFeed::new(fetcher(move |_q: ListQuery, page: u32| {
            *counter.lock().unwrap() += 1;
            async move {
                if page == 1 {
                    Ok(rows(1..4, 1, 3))
                } else {
                    Err(ApiError::Network("offline".to_string()))
                }
            }
            .boxed()
        }));
        feed.refresh().await.unwrap();
        assert!(matches!(feed.load_more().await, Err(ApiError::Network(_))));
        assert_eq!(feed.items().await.len(), 3);
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_slow_search_cannot_overwrite_newer_one() {
        // Each search term waits on its own gate so the test controls order.
        let gates: Arc<StdMutex<HashMap<String, oneshot::Receiver<Page<Row>>>>> =
            Arc::new(StdMutex::new(HashMap::new()));
        let (slow_tx, slow_rx) = oneshot::channel();
        let (fast_tx, fast_rx) = oneshot::channel();
        gates.lock().unwrap().insert("a".into(), slow_rx);
        gates.lock().unwrap().insert("ab".into(), fast_rx);

        let g = gates.clone();
        let feed = Arc::new(ListFeed::new(fetcher(move |q: ListQuery, _page: u32| {
            let rx = g
                .lock()
                .unwrap()
                .remove(q.search.as_deref().unwrap_or(""))
                .unwrap();
            async move { rx.await.map_err(|e| ApiError::Network(e.to_string())) }.boxed()
        })));

        let f1 = feed.clone();
        let slow = tokio::spawn(async move { f1.set_query(ListQuery::new().search("a")).await });
        tokio::task::yield_now().await;
        while gates.lock().unwrap().contains_key("a") {
            tokio::task::yield_now().await;
        }
        let f2 = feed.clone();
        let fast = tokio::spawn(async move { f2.set_query(ListQuery::new().search("ab")).await });
        while gates.lock().unwrap().contains_key("ab") {
            tokio::task::yield_now().await;
        }

        fast_tx.send(rows(20..22, 1, 1)).unwrap();
        assert_eq!(fast.await.unwrap().unwrap(), LoadOutcome::Loaded { added: 2 });
        slow_tx.send(rows(1..9, 1, 1)).unwrap();
        assert_eq!(slow.await.unwrap().unwrap(), LoadOutcome::Stale);

        let ids: Vec<u64> = feed.items().await.iter().map(|r| r.0).collect();
        assert_eq!(ids, vec![20, 21]);
    }

    // Nothing listens on port 9; anything that reaches the network fails
    // with a connection error.
    fn offline_desk() -> LabDesk {
        let config = Config {
            url: "http://127.0.0.1:9/api".to_string(),
            request_timeout_secs: 2,
            ..Config::default()
        };
        LabDesk::with_cache(
            config,
            Box::new(crate::storage::MemoryTokenStore::new()),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_bad_cash_rejected_before_network() {
        let desk = offline_desk();
        for bad in ["abc", "-5", ""] {
            assert!(matches!(
                desk.submit_reconciliation(bad, None).await,
                Err(ApiError::InvalidCashAmount)
            ));
        }
    }

    #[tokio::test]
    async fn test_submit_while_in_flight_is_busy() {
        let desk = offline_desk();
        desk.submitting.store(true, Ordering::SeqCst);
        assert!(matches!(
            desk.submit_reconciliation("100", None).await,
            Err(ApiError::Busy)
        ));

        desk.submitting.store(false, Ordering::SeqCst);
        assert!(matches!(
            desk.submit_reconciliation("100", None).await,
            Err(ApiError::Network(_))
        ));
        // The failed attempt released the flag.
        assert!(!desk.submitting.load(Ordering::SeqCst));
    }
}
