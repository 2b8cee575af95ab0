//! Pure pagination predicates
//!
//! No I/O here: these decide whether the driver keeps paginating and when a
//! flush is due, and are tested without a runtime.

use super::types::Page;

/// Pure: Decide whether another page should be requested after `page`.
///
/// Pagination continues only when all of these hold:
/// - the page came back full (`records.len() == limit`); a short page means
///   the server ran out of history
/// - the server handed back an `end` cursor to continue from
/// - with a stop boundary, the page's last (oldest) record is still newer
///   than the boundary
///
/// Only the last record is compared against the boundary. A page that
/// straddles it is kept whole.
pub fn should_continue(page: &Page, limit: usize, stop_boundary: Option<i64>) -> bool {
    if page.records.len() < limit || page.end.is_none() {
        return false;
    }

    match stop_boundary {
        None => true,
        Some(boundary) => page
            .last_record()
            .and_then(|record| record.timestamp())
            .is_some_and(|ts| ts > boundary),
    }
}

/// Pure: Check if the page-count trigger for a flush is met
pub fn flush_due(pages_since_flush: usize, flush_interval: usize) -> bool {
    flush_interval > 0 && pages_since_flush > 0 && pages_since_flush % flush_interval == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::types::Record;
    use serde_json::json;

    fn page_with_timestamps(timestamps: &[i64], end: Option<&str>) -> Page {
        Page {
            records: timestamps
                .iter()
                .map(|ts| Record(json!({ "origin_server_ts": ts })))
                .collect(),
            start: "s".to_string(),
            end: end.map(str::to_string),
        }
    }

    #[test]
    fn test_full_page_continues() {
        let page = page_with_timestamps(&[30, 20, 10], Some("e"));
        assert!(should_continue(&page, 3, None));
    }

    #[test]
    fn test_short_page_stops() {
        let page = page_with_timestamps(&[30, 20], Some("e"));
        assert!(!should_continue(&page, 3, None));
    }

    #[test]
    fn test_empty_page_stops() {
        let page = page_with_timestamps(&[], Some("e"));
        assert!(!should_continue(&page, 3, None));
    }

    #[test]
    fn test_missing_end_cursor_stops() {
        let page = page_with_timestamps(&[30, 20, 10], None);
        assert!(!should_continue(&page, 3, None));
    }

    #[test]
    fn test_boundary_compares_last_record_only() {
        // first record is past the boundary, last is not: keep going
        let page = page_with_timestamps(&[5, 200, 150], Some("e"));
        assert!(should_continue(&page, 3, Some(100)));

        // last record at the boundary stops
        let page = page_with_timestamps(&[300, 200, 100], Some("e"));
        assert!(!should_continue(&page, 3, Some(100)));

        // last record before the boundary stops
        let page = page_with_timestamps(&[300, 200, 99], Some("e"));
        assert!(!should_continue(&page, 3, Some(100)));
    }

    #[test]
    fn test_boundary_with_untimestamped_last_record_stops() {
        let page = Page {
            records: vec![
                Record(json!({"origin_server_ts": 500})),
                Record(json!({"type": "m.room.message"})),
            ],
            start: "s".to_string(),
            end: Some("e".to_string()),
        };
        assert!(!should_continue(&page, 2, Some(100)));
        assert!(should_continue(&page, 2, None));
    }

    #[test]
    fn test_flush_due() {
        assert!(!flush_due(0, 3));
        assert!(!flush_due(1, 3));
        assert!(!flush_due(2, 3));
        assert!(flush_due(3, 3));
        assert!(flush_due(6, 3));
        assert!(flush_due(1, 1));
        assert!(!flush_due(3, 0));
    }
}
