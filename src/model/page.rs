// File: src/model/page.rs
use serde::{Deserialize, Serialize};

fn default_page() -> u32 {
    1
}

/// One page of a Laravel length-aware paginator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "default_page")]
    pub current_page: u32,
    pub data: Vec<T>,
    #[serde(default = "default_page")]
    pub last_page: u32,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub from: Option<u64>,
    #[serde(default)]
    pub to: Option<u64>,
}

impl<T> Page<T> {
    /// A single page holding everything, for endpoints that do not paginate.
    pub fn single(data: Vec<T>) -> Self {
        let total = data.len() as u64;
        Self {
            current_page: 1,
            data,
            last_page: 1,
            per_page: None,
            total: Some(total),
            from: None,
            to: None,
        }
    }

    pub fn has_more(&self) -> bool {
        self.current_page < self.last_page
    }
}

/// Rows that can be told apart across pages.
pub trait Identified {
    fn id(&self) -> u64;
}

/// Single-resource bodies come either bare or wrapped in `{"data": ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(t) => t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        id: u64,
    }

    #[test]
    fn test_laravel_paginator_decodes() {
        let json = r#"{
            "current_page": 2,
            "data": [{"id": 16}, {"id": 17}],
            "first_page_url": "http://x/api/patients?page=1",
            "last_page": 3,
            "per_page": 15,
            "total": 40,
            "from": 16,
            "to": 30
        }"#;
        let page: Page<Row> = serde_json::from_str(json).unwrap();
        assert_eq!(page.current_page, 2);
        assert_eq!(page.data.len(), 2);
        assert!(page.has_more());
        assert_eq!(page.total, Some(40));
    }

    #[test]
    fn test_last_page_has_no_more() {
        let page: Page<Row> =
            serde_json::from_str(r#"{"current_page": 3, "last_page": 3, "data": []}"#).unwrap();
        assert!(!page.has_more());
    }

    #[test]
    fn test_envelope_accepts_both_shapes() {
        let wrapped: Envelope<Row> = serde_json::from_str(r#"{"data": {"id": 5}}"#).unwrap();
        assert_eq!(wrapped.into_inner(), Row { id: 5 });
        let bare: Envelope<Row> = serde_json::from_str(r#"{"id": 6}"#).unwrap();
        assert_eq!(bare.into_inner(), Row { id: 6 });
    }

    #[test]
    fn test_envelope_does_not_swallow_pages() {
        let json = r#"{"current_page": 1, "last_page": 1, "data": [{"id": 1}]}"#;
        let page: Page<Row> = serde_json::from_str::<Envelope<Page<Row>>>(json)
            .unwrap()
            .into_inner();
        assert_eq!(page.data, vec![Row { id: 1 }]);
    }
}
