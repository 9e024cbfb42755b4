//! Client-side state of the DSR table: current page, search term, ordering,
//! and a guard that drops responses to requests that have since been
//! superseded.
//!
//! The HTTP server never holds this state. It is library API for table
//! clients, which turn a `ListView` into a `ListRequest` per fetch.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::db::enums::{SortDirection, SortField, SortSpec};

/// Number of pages needed to show `total` rows, `ceil(total / page_size)`.
pub fn total_pages(total: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListView {
    pub page: u64,
    pub page_size: u64,
    pub search: String,
    pub sort: SortSpec,
}

impl ListView {
    pub fn new(page_size: u64) -> Self {
        Self {
            page: 1,
            page_size,
            search: String::new(),
            sort: SortSpec::default(),
        }
    }

    /// Clicking the active column flips its direction; clicking another
    /// column switches to it in ascending order.
    pub fn handle_sort(&mut self, field: SortField) {
        if field == self.sort.field {
            self.sort.direction = self.sort.direction.flipped();
        } else {
            self.sort = SortSpec {
                field,
                direction: SortDirection::Asc,
            };
        }
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    pub fn next_page(&mut self, total: u64) {
        let last = total_pages(total, self.page_size).max(1);
        self.page = (self.page + 1).min(last);
    }
}

/// A handle identifying one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTicket(u64);

/// Hands out increasing tickets and only lets the response to the most
/// recently issued one through.
///
/// Used by table clients that may have several listing fetches in flight.
/// Server handlers answer each request independently and do not issue
/// tickets.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> RequestTicket {
        RequestTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Returns `response` if `ticket` is still the newest request, otherwise
    /// discards it.
    pub fn settle<T>(&self, ticket: RequestTicket, response: T) -> Option<T> {
        self.is_current(ticket).then_some(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(25, 10), 3);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn test_handle_sort_twice_on_new_field() {
        let mut view = ListView::new(10);
        assert_eq!(view.sort.field, SortField::LastUpdatedAt);

        view.handle_sort(SortField::TrackingNumber);
        assert_eq!(view.sort.field, SortField::TrackingNumber);
        assert_eq!(view.sort.direction, SortDirection::Asc);

        view.handle_sort(SortField::TrackingNumber);
        assert_eq!(view.sort.field, SortField::TrackingNumber);
        assert_eq!(view.sort.direction, SortDirection::Desc);
    }

    #[test]
    fn test_handle_sort_on_active_field_flips() {
        let mut view = ListView::new(10);
        view.handle_sort(SortField::LastUpdatedAt);
        assert_eq!(view.sort.direction, SortDirection::Asc);
    }

    #[test]
    fn test_paging_is_clamped() {
        let mut view = ListView::new(10);
        view.prev_page();
        assert_eq!(view.page, 1);

        view.next_page(25);
        view.next_page(25);
        view.next_page(25);
        assert_eq!(view.page, 3);

        let mut empty = ListView::new(10);
        empty.next_page(0);
        assert_eq!(empty.page, 1);
    }

    #[test]
    fn test_only_the_newest_of_interleaved_fetches_settles() {
        let sequencer = RequestSequencer::new();
        let mut view = ListView::new(10);

        view.set_search("PO1");
        let typed_one = sequencer.begin();
        view.set_search("PO12");
        let typed_two = sequencer.begin();

        // responses arrive newest first
        assert_eq!(sequencer.settle(typed_two, view.search.clone()), Some("PO12".to_string()));
        assert_eq!(sequencer.settle(typed_one, "PO1".to_string()), None);
        assert!(sequencer.is_current(typed_two));
    }

    #[test]
    fn test_stale_responses_are_discarded() {
        let sequencer = RequestSequencer::new();
        let first = sequencer.begin();
        let second = sequencer.begin();

        assert!(first < second);
        assert_eq!(sequencer.settle(first, "page 1"), None);
        assert_eq!(sequencer.settle(second, "page 2"), Some("page 2"));
    }
}
