// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction-history paging and its navigable location.
//!
//! The current history page and account address are mirrored into the
//! location query (`address=<a>&page=<p>`) so that back/forward controls
//! and deep links stay consistent with the page state.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;
use url::form_urlencoded;
use utoipa::ToSchema;

/// Errors raised by the page-sync step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("Page numbers start at 1, got {0}")]
    InvalidPage(u32),

    #[error("Expected address=<address>&page=<page>, got {0:?}")]
    InvalidQuery(String),
}

/// History page cursor. The page is always >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PageCursor {
    page: u32,
    more_results: bool,
}

impl PageCursor {
    pub fn new(page: u32) -> Result<Self, HistoryError> {
        if page == 0 {
            return Err(HistoryError::InvalidPage(page));
        }
        Ok(Self {
            page,
            more_results: false,
        })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Whether the backend reported results beyond this page.
    pub fn more_results(&self) -> bool {
        self.more_results
    }

    pub fn with_more_results(self, more_results: bool) -> Self {
        Self {
            more_results,
            ..self
        }
    }

    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            more_results: false,
        }
    }

    pub fn previous(&self) -> Self {
        Self {
            page: self.page.saturating_sub(1).max(1),
            more_results: false,
        }
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            page: 1,
            more_results: false,
        }
    }
}

/// A navigable location (path + query without the leading `?`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Location {
    pub pathname: String,
    pub search: String,
}

impl Location {
    pub fn new(pathname: impl Into<String>) -> Self {
        Self {
            pathname: pathname.into(),
            search: String::new(),
        }
    }
}

/// Navigable location capability.
pub trait LocationHistory: Send + Sync {
    fn location(&self) -> Location;
    fn push(&self, location: Location);

    /// Step back, returning the new current location.
    fn back(&self) -> Option<Location>;

    /// Step forward, returning the new current location.
    fn forward(&self) -> Option<Location>;
}

/// Default number of entries an [`InMemoryHistory`] retains.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

struct HistoryStack {
    entries: VecDeque<Location>,
    index: usize,
}

/// In-process history stack with back/forward navigation.
///
/// Holds at most `capacity` entries; the oldest entry is dropped first.
/// Pushing the current location again is a no-op.
pub struct InMemoryHistory {
    stack: Mutex<HistoryStack>,
    capacity: usize,
}

impl InMemoryHistory {
    pub fn new(initial: Location) -> Self {
        Self::with_capacity(initial, DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(initial: Location, capacity: usize) -> Self {
        Self {
            stack: Mutex::new(HistoryStack {
                entries: VecDeque::from([initial]),
                index: 0,
            }),
            capacity: capacity.max(1),
        }
    }
}

impl LocationHistory for InMemoryHistory {
    fn location(&self) -> Location {
        self.stack
            .lock()
            .ok()
            .and_then(|stack| stack.entries.get(stack.index).cloned())
            .unwrap_or_else(|| Location::new("/"))
    }

    fn push(&self, location: Location) {
        let Ok(mut stack) = self.stack.lock() else {
            return;
        };
        if stack.entries.get(stack.index) == Some(&location) {
            return;
        }

        // Pushing drops any forward entries
        let keep = stack.index + 1;
        stack.entries.truncate(keep);
        stack.entries.push_back(location);
        while stack.entries.len() > self.capacity {
            stack.entries.pop_front();
        }
        stack.index = stack.entries.len() - 1;
    }

    fn back(&self) -> Option<Location> {
        let mut stack = self.stack.lock().ok()?;
        if stack.index == 0 {
            return None;
        }
        stack.index -= 1;
        stack.entries.get(stack.index).cloned()
    }

    fn forward(&self) -> Option<Location> {
        let mut stack = self.stack.lock().ok()?;
        if stack.index + 1 >= stack.entries.len() {
            return None;
        }
        stack.index += 1;
        stack.entries.get(stack.index).cloned()
    }
}

/// `address=<a>&page=<p>` query for a history page.
pub fn page_query(address: &str, page: u32) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("address", address)
        .append_pair("page", &page.to_string())
        .finish()
}

/// Parse a deep-link query back into `(address, page)`.
pub fn parse_page_query(search: &str) -> Option<(String, PageCursor)> {
    let search = search.strip_prefix('?').unwrap_or(search);
    let mut address = None;
    let mut page = None;

    for (key, value) in form_urlencoded::parse(search.as_bytes()) {
        match key.as_ref() {
            "address" => address = Some(value.into_owned()),
            "page" => page = value.parse::<u32>().ok(),
            _ => {}
        }
    }

    let cursor = PageCursor::new(page?).ok()?;
    Some((address?, cursor))
}

/// Reflect the address and page into the location, keeping the pathname.
pub fn sync_transactions_page(history: &dyn LocationHistory, address: &str, page: u32) -> Location {
    let location = Location {
        pathname: history.location().pathname,
        search: page_query(address, page),
    };
    history.push(location.clone());
    location
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(history: &InMemoryHistory) -> usize {
        history.stack.lock().unwrap().entries.len()
    }

    #[test]
    fn page_sync_keeps_pathname() {
        let history = InMemoryHistory::new(Location::new("/cosmos/transactions"));
        let location = sync_transactions_page(&history, "cosmos1abc", 3);

        assert_eq!(location.pathname, "/cosmos/transactions");
        assert_eq!(location.search, "address=cosmos1abc&page=3");
        assert_eq!(history.location(), location);
    }

    #[test]
    fn back_and_forward_walk_the_stack() {
        let history = InMemoryHistory::new(Location::new("/txs"));
        sync_transactions_page(&history, "cosmos1abc", 1);
        sync_transactions_page(&history, "cosmos1abc", 2);

        assert_eq!(history.back().unwrap().search, "address=cosmos1abc&page=1");
        assert_eq!(history.back().unwrap().search, "");
        assert!(history.back().is_none());
        assert_eq!(history.forward().unwrap().search, "address=cosmos1abc&page=1");

        // A push after going back drops the forward entry
        sync_transactions_page(&history, "cosmos1abc", 5);
        assert!(history.forward().is_none());
        assert_eq!(history.location().search, "address=cosmos1abc&page=5");
    }

    #[test]
    fn cursor_never_goes_below_one() {
        assert_eq!(PageCursor::new(0), Err(HistoryError::InvalidPage(0)));

        let first = PageCursor::default();
        assert_eq!(first.previous().page(), 1);
        assert_eq!(first.next().page(), 2);
        assert_eq!(first.next().previous().page(), 1);
        assert!(first.with_more_results(true).more_results());
        assert!(!first.with_more_results(true).next().more_results());
    }

    #[test]
    fn deep_link_round_trip() {
        let (address, cursor) = parse_page_query("?address=cosmos1abc&page=4").unwrap();
        assert_eq!(address, "cosmos1abc");
        assert_eq!(cursor.page(), 4);

        assert!(parse_page_query("address=cosmos1abc&page=0").is_none());
        assert!(parse_page_query("page=2").is_none());
    }

    #[test]
    fn repeated_syncs_stay_bounded() {
        let history = InMemoryHistory::new(Location::new("/cosmos/transactions"));
        for i in 0..100_000u32 {
            sync_transactions_page(&history, "cosmos1abc", i % 5 + 1);
        }

        assert_eq!(entries(&history), DEFAULT_HISTORY_CAPACITY);
        assert_eq!(history.location().search, "address=cosmos1abc&page=5");
        assert_eq!(history.back().unwrap().search, "address=cosmos1abc&page=4");
    }

    #[test]
    fn re_syncing_the_same_page_adds_no_entry() {
        let history = InMemoryHistory::new(Location::new("/txs"));
        for _ in 0..10 {
            sync_transactions_page(&history, "cosmos1abc", 2);
        }

        assert_eq!(entries(&history), 2);
        assert_eq!(history.back().unwrap().search, "");
        assert!(history.back().is_none());
    }

    #[test]
    fn capacity_drops_oldest_entries() {
        let history = InMemoryHistory::with_capacity(Location::new("/txs"), 3);
        for page in 1..=4 {
            sync_transactions_page(&history, "cosmos1abc", page);
        }

        assert_eq!(entries(&history), 3);
        assert_eq!(history.back().unwrap().search, "address=cosmos1abc&page=3");
        assert_eq!(history.back().unwrap().search, "address=cosmos1abc&page=2");
        assert!(history.back().is_none());
    }
}
