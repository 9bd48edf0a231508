use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of a listing, in the envelope the gateway exposes to its
/// callers.
///
/// Invariants: `total_pages == ceil(total / page_size)` and
/// `items.len() <= page_size`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub items: Vec<Value>,
}

impl Page {
    pub fn new(total: u64, page: u32, page_size: u32, items: Vec<Value>) -> Self {
        Self {
            total,
            page,
            page_size,
            total_pages: total.div_ceil(page_size as u64) as u32,
            items,
        }
    }
}

/// A listing result: either a paged envelope or the full record set.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Listing {
    Paged(Page),
    All(Vec<Value>),
}

impl Listing {
    pub fn items(&self) -> &[Value] {
        match self {
            Self::Paged(page) => &page.items,
            Self::All(items) => items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn total_pages_is_ceiling_division() {
        assert_eq!(Page::new(25, 1, 10, vec![]).total_pages, 3);
        assert_eq!(Page::new(30, 1, 10, vec![]).total_pages, 3);
        assert_eq!(Page::new(31, 1, 10, vec![]).total_pages, 4);
        assert_eq!(Page::new(0, 1, 10, vec![]).total_pages, 0);
        assert_eq!(Page::new(1, 1, 200, vec![]).total_pages, 1);
    }

    #[test]
    fn page_serializes_camel_case() {
        let page = Page::new(25, 2, 10, vec![json!({"id": "a"})]);
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["total"], 25);
        assert_eq!(value["page"], 2);
        assert_eq!(value["pageSize"], 10);
        assert_eq!(value["totalPages"], 3);
        assert_eq!(value["items"][0]["id"], "a");
    }

    #[test]
    fn listing_serializes_paged_as_object_and_all_as_array() {
        let paged = serde_json::to_value(Listing::Paged(Page::new(1, 1, 10, vec![]))).unwrap();
        assert!(paged.is_object());
        let all = serde_json::to_value(Listing::All(vec![json!(1), json!(2)])).unwrap();
        assert_eq!(all, json!([1, 2]));
    }
}
