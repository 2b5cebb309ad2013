//! Exhaustive pagination
//!
//! Drains a skip/limit paged list endpoint into one ordered collection.
//! The cursor is advanced locally from the number of items actually
//! received, so progress never depends on server-side paging state.

use anyhow::Result;
use serde::Serialize;
use std::future::Future;
use thiserror::Error;

/// Default upper bound on page fetches for a single collection call
pub const DEFAULT_MAX_PAGES: usize = 10_000;

/// Client-requested pagination bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    /// Offset into the remote collection
    pub skip: Option<u64>,
    /// Maximum number of records to return
    pub limit: Option<u64>,
}

impl PageRequest {
    pub fn new(skip: Option<u64>, limit: Option<u64>) -> Self {
        Self { skip, limit }
    }

    /// Request the entire remote collection
    pub fn all() -> Self {
        Self::default()
    }
}

/// One page returned by a list call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total reported by the server as of this call
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: u64) -> Self {
        Self { items, total_count }
    }
}

/// Accumulated result of a collection call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collected<T> {
    /// Every fetched record, in fetch order
    pub items: Vec<T>,
    /// Last observed server total
    pub total_count: u64,
}

/// Pagination failures that are not caused by the page source itself
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    /// A page came back empty before any stop condition was met
    #[error("pagination stalled after {collected} items (server reports {total_count})")]
    Stalled { collected: u64, total_count: u64 },

    /// The page budget ran out before any stop condition was met
    #[error("pagination exceeded {max_pages} pages after {collected} items")]
    TooManyPages { max_pages: usize, collected: u64 },
}

/// A remote list operation that can be called page by page
pub trait PageSource<T> {
    fn fetch_page(&self, request: PageRequest) -> impl Future<Output = Result<Page<T>>>;
}

impl<T, F, Fut> PageSource<T> for F
where
    F: Fn(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    fn fetch_page(&self, request: PageRequest) -> impl Future<Output = Result<Page<T>>> {
        self(request)
    }
}

/// Why a collection call stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    LimitReached(u64),
    OffsetExhausted,
    CollectionExhausted,
}

/// First matching stop rule for the current accumulator length
fn termination(request: PageRequest, collected: u64, total_count: u64) -> Option<Termination> {
    if let Some(limit) = request.limit {
        if collected >= limit {
            return Some(Termination::LimitReached(limit));
        }
    }

    match request.skip {
        Some(skip) if collected >= total_count.saturating_sub(skip) => {
            Some(Termination::OffsetExhausted)
        }
        Some(_) => None,
        None if collected >= total_count => Some(Termination::CollectionExhausted),
        None => None,
    }
}

/// Collection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collector {
    /// Per-request limit used when the caller's remaining budget is larger
    /// (or unbounded)
    pub page_size: Option<u64>,
    pub max_pages: usize,
}

impl Default for Collector {
    fn default() -> Self {
        Self {
            page_size: None,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Page budget; at least one page is always fetched
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Request for the next page, given how many items are already collected
    fn next_request(&self, request: PageRequest, collected: u64) -> PageRequest {
        let skip = match request.skip {
            None if collected == 0 => None,
            skip => Some(skip.unwrap_or(0) + collected),
        };

        let remaining = request.limit.map(|limit| limit.saturating_sub(collected));
        let limit = match (remaining, self.page_size) {
            (Some(remaining), Some(page_size)) => Some(remaining.min(page_size)),
            (remaining, page_size) => remaining.or(page_size),
        };

        PageRequest { skip, limit }
    }

    /// Fetch pages until the request is satisfied or the remote collection
    /// is exhausted.
    ///
    /// Source errors are returned as-is and discard everything collected so
    /// far.
    pub async fn collect_all<T, S>(&self, source: &S, request: PageRequest) -> Result<Collected<T>>
    where
        S: PageSource<T> + ?Sized,
    {
        let mut items: Vec<T> = Vec::new();
        let mut total_count;
        let mut pages = 0;
        let max_pages = self.max_pages.max(1);

        loop {
            if pages >= max_pages {
                return Err(PaginationError::TooManyPages {
                    max_pages,
                    collected: items.len() as u64,
                }
                .into());
            }

            let page_request = self.next_request(request, items.len() as u64);
            tracing::debug!(
                "Fetching page {} (skip={:?}, limit={:?})",
                pages + 1,
                page_request.skip,
                page_request.limit
            );

            let page = source.fetch_page(page_request).await?;
            pages += 1;

            let received = page.items.len();
            total_count = page.total_count;
            items.extend(page.items);

            match termination(request, items.len() as u64, total_count) {
                Some(Termination::LimitReached(limit)) => {
                    // Server may over-deliver; the cap is exact
                    items.truncate(limit as usize);
                    break;
                }
                Some(reason) => {
                    tracing::trace!("Pagination finished: {:?}", reason);
                    break;
                }
                None if received == 0 => {
                    tracing::warn!(
                        "Empty page after {} items, server reports {}",
                        items.len(),
                        total_count
                    );
                    return Err(PaginationError::Stalled {
                        collected: items.len() as u64,
                        total_count,
                    }
                    .into());
                }
                None => {}
            }
        }

        tracing::debug!(
            "Collected {} items in {} pages (total_count={})",
            items.len(),
            pages,
            total_count
        );

        Ok(Collected { items, total_count })
    }
}

/// Collect with the default policy
pub async fn collect_all<T, S>(source: &S, request: PageRequest) -> Result<Collected<T>>
where
    S: PageSource<T> + ?Sized,
{
    Collector::default().collect_all(source, request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use tokio_test::block_on;

    /// In-memory source that honors skip/limit and caps pages at `page_cap`
    struct FakeSource {
        records: Vec<u32>,
        page_cap: usize,
        calls: Cell<usize>,
        requests: RefCell<Vec<PageRequest>>,
        fail_on_call: Option<usize>,
    }

    impl FakeSource {
        fn new(n: u32, page_cap: usize) -> Self {
            Self {
                records: (0..n).collect(),
                page_cap,
                calls: Cell::new(0),
                requests: RefCell::new(Vec::new()),
                fail_on_call: None,
            }
        }
    }

    impl PageSource<u32> for FakeSource {
        async fn fetch_page(&self, request: PageRequest) -> Result<Page<u32>> {
            self.calls.set(self.calls.get() + 1);
            self.requests.borrow_mut().push(request);

            if self.fail_on_call == Some(self.calls.get()) {
                anyhow::bail!("connection reset");
            }

            let start = (request.skip.unwrap_or(0) as usize).min(self.records.len());
            let want = request.limit.map(|l| l as usize).unwrap_or(usize::MAX);
            let end = start + want.min(self.page_cap).min(self.records.len() - start);

            Ok(Page::new(
                self.records[start..end].to_vec(),
                self.records.len() as u64,
            ))
        }
    }

    #[test]
    fn test_collects_everything_without_bounds() {
        let source = FakeSource::new(10, 3);
        let result = block_on(collect_all(&source, PageRequest::all())).unwrap();

        assert_eq!(result.items, (0..10).collect::<Vec<_>>());
        assert_eq!(result.total_count, 10);
        assert_eq!(source.calls.get(), 4);
    }

    #[test]
    fn test_limit_caps_result() {
        let source = FakeSource::new(10, 3);
        let result = block_on(collect_all(&source, PageRequest::new(None, Some(4)))).unwrap();

        assert_eq!(result.items, vec![0, 1, 2, 3]);
        assert_eq!(result.total_count, 10);
    }

    #[test]
    fn test_skip_returns_tail() {
        let source = FakeSource::new(10, 3);
        let result = block_on(collect_all(&source, PageRequest::new(Some(6), None))).unwrap();

        assert_eq!(result.items, vec![6, 7, 8, 9]);
        assert_eq!(result.total_count, 10);
    }

    #[test]
    fn test_error_on_second_page_discards_partial() {
        let mut source = FakeSource::new(10, 3);
        source.fail_on_call = Some(2);

        let err = block_on(collect_all(&source, PageRequest::all())).unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
        assert!(err.downcast_ref::<PaginationError>().is_none());
        assert_eq!(source.calls.get(), 2);
    }

    #[test]
    fn test_empty_collection_single_fetch() {
        let source = FakeSource::new(0, 3);
        let result = block_on(collect_all(&source, PageRequest::all())).unwrap();

        assert!(result.items.is_empty());
        assert_eq!(result.total_count, 0);
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_cursor_advances_by_received_items() {
        let source = FakeSource::new(7, 3);
        block_on(collect_all(&source, PageRequest::new(Some(1), Some(5)))).unwrap();

        let requests = source.requests.borrow();
        assert_eq!(
            *requests,
            vec![
                PageRequest::new(Some(1), Some(5)),
                PageRequest::new(Some(4), Some(2)),
            ]
        );
    }

    #[test]
    fn test_first_request_mirrors_caller_bounds() {
        let source = FakeSource::new(2, 10);
        block_on(collect_all(&source, PageRequest::all())).unwrap();

        assert_eq!(source.requests.borrow()[0], PageRequest::all());
    }

    #[test]
    fn test_page_size_bounds_each_request() {
        let source = FakeSource::new(5, 100);
        let collector = Collector::new().with_page_size(2);
        let result = block_on(collector.collect_all(&source, PageRequest::all())).unwrap();

        assert_eq!(result.items.len(), 5);
        assert_eq!(source.calls.get(), 3);
        assert!(source
            .requests
            .borrow()
            .iter()
            .all(|r| r.limit == Some(2)));
    }

    #[test]
    fn test_limit_larger_than_collection_stops() {
        let source = FakeSource::new(3, 2);
        let result = block_on(collect_all(&source, PageRequest::new(None, Some(50)))).unwrap();

        assert_eq!(result.items, vec![0, 1, 2]);
        assert_eq!(source.calls.get(), 2);
    }

    #[test]
    fn test_skip_past_end_returns_empty() {
        let source = FakeSource::new(4, 2);
        let result = block_on(collect_all(&source, PageRequest::new(Some(9), None))).unwrap();

        assert!(result.items.is_empty());
        assert_eq!(result.total_count, 4);
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_over_delivery_truncated_to_limit() {
        let source = |_: PageRequest| async { Ok::<_, anyhow::Error>(Page::new(vec!["a", "b", "c"], 3)) };
        let result = block_on(collect_all(&source, PageRequest::new(None, Some(2)))).unwrap();

        assert_eq!(result.items, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_page_before_total_is_stalled() {
        let calls = Cell::new(0);
        let source = |_: PageRequest| {
            calls.set(calls.get() + 1);
            let items = if calls.get() == 1 { vec![1, 2] } else { vec![] };
            async move { Ok::<_, anyhow::Error>(Page::new(items, 5)) }
        };

        let err = block_on(collect_all(&source, PageRequest::all())).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PaginationError>(),
            Some(&PaginationError::Stalled {
                collected: 2,
                total_count: 5
            })
        );
    }

    #[test]
    fn test_page_budget_exhausted() {
        // Total keeps growing so no stop rule ever matches
        let calls = Cell::new(0u64);
        let source = |_: PageRequest| {
            calls.set(calls.get() + 1);
            let total = calls.get() * 10;
            async move { Ok::<_, anyhow::Error>(Page::new(vec![0u8], total)) }
        };

        let collector = Collector::new().with_max_pages(3);
        let err = block_on(collector.collect_all(&source, PageRequest::all())).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PaginationError>(),
            Some(&PaginationError::TooManyPages {
                max_pages: 3,
                collected: 3
            })
        );
    }

    #[test]
    fn test_zero_page_budget_still_fetches_once() {
        let collector = Collector::new().with_max_pages(0);
        assert_eq!(collector.max_pages, 1);

        let source = FakeSource::new(0, 3);
        let result = block_on(collector.collect_all(&source, PageRequest::all())).unwrap();
        assert!(result.items.is_empty());
        assert_eq!(source.calls.get(), 1);

        let literal = Collector {
            page_size: None,
            max_pages: 0,
        };
        let source = FakeSource::new(2, 3);
        let result = block_on(literal.collect_all(&source, PageRequest::all())).unwrap();
        assert_eq!(result.items, vec![0, 1]);
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_termination_rules() {
        let limit_only = PageRequest::new(None, Some(4));
        assert_eq!(termination(limit_only, 4, 10), Some(Termination::LimitReached(4)));
        assert_eq!(termination(limit_only, 3, 10), None);

        let skip_only = PageRequest::new(Some(6), None);
        assert_eq!(termination(skip_only, 4, 10), Some(Termination::OffsetExhausted));
        assert_eq!(termination(skip_only, 3, 10), None);

        assert_eq!(
            termination(PageRequest::all(), 10, 10),
            Some(Termination::CollectionExhausted)
        );
        assert_eq!(termination(PageRequest::all(), 0, 0), Some(Termination::CollectionExhausted));
    }
}
