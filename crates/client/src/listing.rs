//! Listing response decoder
//!
//! The task service does not answer list endpoints with a single shape:
//! paginated endpoints return a DRF page, others a bare array, and some
//! deployments wrap items in `data` or `tasks`. [`ListingShape`] names every
//! recognized shape; they are tried in declaration order and anything else
//! decodes to an empty page.

use crate::gateway::ResponseBody;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

/// Page size assumed until the server has told us otherwise
pub const DEFAULT_PAGE_SIZE: usize = 3;

/// Pagination metadata of a decoded listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    /// Total number of items across all pages
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub current_page: u32,
    pub page_size: usize,
}

impl PageInfo {
    fn empty(current_page: u32) -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            current_page,
            page_size: 0,
        }
    }

    pub const fn has_next(&self) -> bool {
        self.next.is_some()
    }

    pub const fn has_previous(&self) -> bool {
        self.previous.is_some()
    }
}

/// One page of decoded records
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub info: PageInfo,
}

/// Recognized listing shapes, in matching order
#[derive(Debug, Clone, PartialEq)]
pub enum ListingShape {
    /// `[ ... ]`
    Array(Vec<Value>),
    /// `{ "count", "next", "previous", "results": [ ... ] }`
    Results(Map<String, Value>),
    /// `{ "total", "data": [ ... ] }`
    Data(Map<String, Value>),
    /// `{ "count", "tasks": [ ... ] }`
    Tasks(Map<String, Value>),
    /// A single record carrying an `id`
    Single(Map<String, Value>),
    Unrecognized,
}

fn has_array(object: &Map<String, Value>, key: &str) -> bool {
    object.get(key).is_some_and(Value::is_array)
}

fn has_id(object: &Map<String, Value>) -> bool {
    match object.get("id") {
        None | Some(Value::Null | Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(_) => true,
    }
}

impl ListingShape {
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Array(items),
            Value::Object(object) if has_array(&object, "results") => Self::Results(object),
            Value::Object(object) if has_array(&object, "data") => Self::Data(object),
            Value::Object(object) if has_array(&object, "tasks") => Self::Tasks(object),
            Value::Object(object) if has_id(&object) => Self::Single(object),
            _ => Self::Unrecognized,
        }
    }

    /// Split into raw items and pagination metadata
    ///
    /// `requested_page` is the page that was asked for; `previous_page_size`
    /// is reused when a DRF page comes back empty.
    pub fn into_parts(self, requested_page: u32, previous_page_size: usize) -> (Vec<Value>, PageInfo) {
        match self {
            Self::Array(items) => {
                let len = items.len();
                let info = PageInfo {
                    count: len as u64,
                    next: None,
                    previous: None,
                    current_page: 1,
                    page_size: len,
                };
                (items, info)
            }
            Self::Results(mut object) => {
                let items = take_array(&mut object, "results");
                let page_size = if items.is_empty() {
                    if previous_page_size == 0 {
                        DEFAULT_PAGE_SIZE
                    } else {
                        previous_page_size
                    }
                } else {
                    items.len()
                };
                let info = PageInfo {
                    count: count_field(&object, "count").unwrap_or(items.len() as u64),
                    next: link_field(&object, "next"),
                    previous: link_field(&object, "previous"),
                    current_page: requested_page,
                    page_size,
                };
                (items, info)
            }
            Self::Data(mut object) => wrapped(&mut object, "data", "total", requested_page),
            Self::Tasks(mut object) => wrapped(&mut object, "tasks", "count", requested_page),
            Self::Single(object) => {
                let info = PageInfo {
                    count: 1,
                    next: None,
                    previous: None,
                    current_page: requested_page,
                    page_size: 1,
                };
                (vec![Value::Object(object)], info)
            }
            Self::Unrecognized => (Vec::new(), PageInfo::empty(requested_page)),
        }
    }
}

fn take_array(object: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match object.remove(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn count_field(object: &Map<String, Value>, key: &str) -> Option<u64> {
    object.get(key).and_then(Value::as_u64).filter(|&n| n > 0)
}

fn link_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn wrapped(
    object: &mut Map<String, Value>,
    items_key: &str,
    count_key: &str,
    requested_page: u32,
) -> (Vec<Value>, PageInfo) {
    let items = take_array(object, items_key);
    let info = PageInfo {
        count: count_field(object, count_key).unwrap_or(items.len() as u64),
        next: link_field(object, "next"),
        previous: link_field(object, "previous"),
        current_page: requested_page,
        page_size: items.len(),
    };
    (items, info)
}

/// Decode a listing body into typed records
///
/// Records that do not decode as `T` are skipped with a warning rather than
/// failing the whole page.
pub fn decode_page<T: DeserializeOwned>(
    body: ResponseBody,
    requested_page: u32,
    previous_page_size: usize,
) -> Page<T> {
    let (raw, info) =
        ListingShape::classify(body.into_json()).into_parts(requested_page, previous_page_size);

    let items = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping undecodable listing entry: {e}");
                None
            }
        })
        .collect();

    Page { items, info }
}

/// Raw items of a listing body, for endpoints whose records vary in shape
pub fn decode_values(body: ResponseBody) -> Vec<Value> {
    ListingShape::classify(body.into_json()).into_parts(1, 0).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Task;
    use serde_json::json;

    fn task(id: i64) -> Value {
        json!({"id": id, "name": format!("task {id}"), "project": 1})
    }

    #[test]
    fn test_bare_array() {
        let page: Page<Task> = decode_page(ResponseBody::Json(json!([task(1), task(2)])), 4, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.info.count, 2);
        assert_eq!(page.info.current_page, 1);
        assert_eq!(page.info.page_size, 2);
    }

    #[test]
    fn test_drf_page() {
        let body = json!({
            "count": 7,
            "next": "http://api/task/?page=3",
            "previous": "http://api/task/?page=1",
            "results": [task(4), task(5), task(6)]
        });
        let page: Page<Task> = decode_page(ResponseBody::Json(body), 2, 3);
        assert_eq!(page.items.len(), 3);
        assert_eq!(
            page.info,
            PageInfo {
                count: 7,
                next: Some("http://api/task/?page=3".into()),
                previous: Some("http://api/task/?page=1".into()),
                current_page: 2,
                page_size: 3,
            }
        );
        assert!(page.info.has_next());
    }

    #[test]
    fn test_empty_drf_page_keeps_page_size() {
        let body = json!({"count": 0, "next": null, "previous": null, "results": []});
        let (_, info) = ListingShape::classify(body.clone()).into_parts(1, 5);
        assert_eq!(info.page_size, 5);
        let (_, info) = ListingShape::classify(body).into_parts(1, 0);
        assert_eq!(info.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_results_takes_precedence_over_data() {
        let body = json!({"results": [task(1)], "data": [task(2), task(3)]});
        assert!(matches!(ListingShape::classify(body), ListingShape::Results(_)));
    }

    #[test]
    fn test_data_and_tasks_wrappers() {
        let page: Page<Task> =
            decode_page(ResponseBody::Json(json!({"total": 10, "data": [task(1)]})), 2, 3);
        assert_eq!(page.info.count, 10);
        assert_eq!(page.info.page_size, 1);

        let page: Page<Task> =
            decode_page(ResponseBody::Json(json!({"tasks": [task(1), task(2)]})), 1, 3);
        assert_eq!(page.info.count, 2);
        assert_eq!(page.items[1].id, 2);
    }

    #[test]
    fn test_single_record() {
        let page: Page<Task> = decode_page(ResponseBody::Json(task(9)), 1, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, 9);
        assert_eq!(page.info.count, 1);
    }

    #[test]
    fn test_unrecognized_shapes_are_empty() {
        for body in [
            ResponseBody::Json(json!({"msg": "nothing here"})),
            ResponseBody::Json(json!({"id": 0})),
            ResponseBody::Json(json!(42)),
            ResponseBody::Json(Value::Null),
            ResponseBody::Text("<html>".into()),
            ResponseBody::Empty,
        ] {
            let page: Page<Task> = decode_page(body, 3, 3);
            assert!(page.items.is_empty());
            assert_eq!(page.info, PageInfo::empty(3));
        }
    }

    #[test]
    fn test_undecodable_entries_are_skipped() {
        let page: Page<Task> =
            decode_page(ResponseBody::Json(json!([task(1), {"unexpected": true}])), 1, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.info.count, 2);
    }
}
