// File: src/store.rs
use crate::model::{Identified, Page};
use std::collections::{BTreeMap, HashSet};

/// Rows from the end of the list at which the next page is requested.
pub const LOAD_MORE_THRESHOLD: usize = 5;

/// Search and filter parameters shared by every page of one listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub filters: BTreeMap<String, String>,
    pub per_page: Option<u32>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, term: &str) -> Self {
        let term = term.trim();
        self.search = if term.is_empty() {
            None
        } else {
            Some(term.to_string())
        };
        self
    }

    pub fn filter(mut self, key: &str, value: &str) -> Self {
        self.filters.insert(key.to_string(), value.to_string());
        self
    }

    pub fn per_page(mut self, per_page: Option<u32>) -> Self {
        self.per_page = per_page;
        self
    }

    /// `page=N&per_page=..&search=..&key=value`, URL-encoded.
    pub fn to_query_string(&self, page: u32) -> String {
        let mut parts = vec![format!("page={}", page)];
        if let Some(per_page) = self.per_page {
            parts.push(format!("per_page={}", per_page));
        }
        if let Some(term) = &self.search {
            parts.push(format!("search={}", urlencoding::encode(term)));
        }
        for (k, v) in &self.filters {
            parts.push(format!(
                "{}={}",
                urlencoding::encode(k),
                urlencoding::encode(v)
            ));
        }
        parts.join("&")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Replace,
    Append,
}

/// Issued when a load starts; the response is only applied if the ticket
/// still belongs to the current generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    pub page: u32,
    pub query: ListQuery,
    pub mode: LoadMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Rows were replaced or appended; `added` counts new rows.
    Rows { added: usize },
    /// A newer refresh or filter change superseded this load.
    Stale,
}

#[derive(Debug, Clone)]
pub struct PagedList<T> {
    items: Vec<T>,
    seen: HashSet<u64>,
    query: ListQuery,
    current_page: u32,
    last_page: u32,
    total: Option<u64>,
    generation: u64,
    loading: bool,
    loaded: bool,
    last_error: Option<String>,
}

impl<T> Default for PagedList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
            query: ListQuery::default(),
            current_page: 0,
            last_page: 0,
            total: None,
            generation: 0,
            loading: false,
            loaded: false,
            last_error: None,
        }
    }
}

impl<T: Identified + Clone> PagedList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(query: ListQuery) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Loaded at least once and the server returned nothing.
    pub fn is_empty_result(&self) -> bool {
        self.loaded && self.items.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.loaded && self.current_page < self.last_page
    }

    /// True when the last visible row is within the threshold of the end.
    pub fn near_end(&self, last_visible_index: usize) -> bool {
        !self.items.is_empty() && last_visible_index + LOAD_MORE_THRESHOLD >= self.items.len()
    }

    fn issue(&mut self, page: u32, mode: LoadMode) -> Ticket {
        self.loading = true;
        Ticket {
            generation: self.generation,
            page,
            query: self.query.clone(),
            mode,
        }
    }

    /// Pull-to-refresh: reload page 1 with the current query. Supersedes any
    /// load in flight.
    pub fn begin_refresh(&mut self) -> Ticket {
        self.generation += 1;
        self.issue(1, LoadMode::Replace)
    }

    /// New search or filters: reload page 1 with `query`. The page size
    /// carries over unless the new query sets one.
    pub fn begin_query(&mut self, mut query: ListQuery) -> Ticket {
        if query.per_page.is_none() {
            query.per_page = self.query.per_page;
        }
        self.query = query;
        self.begin_refresh()
    }

    /// Next page, unless a load is running or there is nothing left.
    pub fn begin_next_page(&mut self) -> Option<Ticket> {
        if self.loading || !self.has_more() {
            return None;
        }
        let next = self.current_page + 1;
        Some(self.issue(next, LoadMode::Append))
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.generation == self.generation
    }

    pub fn complete(&mut self, ticket: &Ticket, page: Page<T>) -> Applied {
        if !self.is_current(ticket) {
            return Applied::Stale;
        }
        self.loading = false;
        self.loaded = true;
        self.last_error = None;
        self.current_page = page.current_page.max(ticket.page);
        self.last_page = page.last_page;
        self.total = page.total;

        if ticket.mode == LoadMode::Replace {
            self.items.clear();
            self.seen.clear();
        }
        let before = self.items.len();
        for row in page.data {
            if self.seen.insert(row.id()) {
                self.items.push(row);
            }
        }
        Applied::Rows {
            added: self.items.len() - before,
        }
    }

    /// Records a failed load. Rows already shown stay in place.
    pub fn fail(&mut self, ticket: &Ticket, error: &str) -> Applied {
        if !self.is_current(ticket) {
            return Applied::Stale;
        }
        self.loading = false;
        self.last_error = Some(error.to_string());
        Applied::Rows { added: 0 }
    }
}
