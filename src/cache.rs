use crate::client::ClientError;
use crate::error::LiveErrorKind;
use crate::model::{Job, Row};

use std::collections::BTreeMap;
use std::ops::Range;


static EMPTY: Cell = Cell::Empty;


/// One row slot of the cache.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Cell {
    /// Never requested, or released after a failed or empty fetch.
    #[default]
    Empty,
    /// A request covering this row is in flight.
    Loading,
    Value(Row),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn value(&self) -> Option<&Row> {
        match self {
            Self::Value(row) => Some(row),
            _ => None,
        }
    }
}


/// First visible row and number of visible rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub offset: usize,
    pub page_size: usize,
}

impl Viewport {
    pub fn new(offset: usize, page_size: usize) -> Self {
        Self { offset, page_size }
    }
}


/// Rows `[start, start + count)` of job `job_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub job_id: String,
    pub start: usize,
    pub count: usize,
}

impl FetchRequest {
    pub fn end(&self) -> usize {
        self.start + self.count
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}


#[derive(Debug, PartialEq)]
pub enum ResultApplication {
    /// `count` rows were stored from `start`; `backfill` asks for the rest
    /// of a short read.
    Applied { start: usize, count: usize, backfill: Option<FetchRequest> },
    /// The request belonged to a superseded job and was dropped.
    Stale,
}


/// Sparse row store for one job's results, filled page by page as the
/// viewport moves.
///
/// Only loading and loaded rows are stored; every other index below
/// [`len`](Self::len) is a [`Cell::Empty`] hole, so the size of a result
/// costs nothing until its rows are requested. Marking rows as loading
/// before handing out a request keeps in-flight requests from overlapping.
/// Responses for any job other than the current owner are discarded.
#[derive(Debug, Default)]
pub struct VirtualRowCache {
    cells: BTreeMap<usize, Cell>,
    len: usize,
    owner: Option<String>,
    viewport: Option<Viewport>,
}

impl VirtualRowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything and size the cache for `job`'s `row_count` rows.
    pub fn reset(&mut self, job: &Job, row_count: usize) {
        self.cells.clear();
        self.len = row_count;
        self.owner = Some(job.id.clone());
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Id of the job whose rows the cache holds.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        (index < self.len).then(|| self.cells.get(&index).unwrap_or(&EMPTY))
    }

    /// Cells in `range`, clipped to the row count.
    pub fn cells(&self, range: Range<usize>) -> impl Iterator<Item = &Cell> + '_ {
        let range = self.clip(range);
        range.map(move |index| self.cells.get(&index).unwrap_or(&EMPTY))
    }

    /// Loaded rows in `range`, skipping holes.
    pub fn rows(&self, range: Range<usize>) -> Vec<Row> {
        self.cells
            .range(self.clip(range))
            .filter_map(|(_, cell)| cell.value().cloned())
            .collect()
    }

    pub fn loading_count(&self) -> usize {
        self.cells.values().filter(|cell| cell.is_loading()).count()
    }

    pub fn loaded_count(&self) -> usize {
        self.cells.values().filter(|cell| cell.value().is_some()).count()
    }

    /// Plan the fetches needed to show `page_size` rows from `offset`.
    ///
    /// The previous and next pages are loaded too, so that scrolling isn't
    /// too slow and refreshes behave on a page boundary. Needed pages next
    /// to each other are merged into one request. Returned requests have
    /// already been marked as loading.
    pub fn set_viewport(&mut self, offset: usize, page_size: usize) -> Vec<FetchRequest> {
        self.viewport = Some(Viewport::new(offset, page_size));

        let Some(owner) = self.owner.clone() else {
            return vec![];
        };
        let len = self.len();
        let next_start = offset.saturating_add(page_size);
        let candidates = [
            offset.saturating_sub(page_size)..offset,
            offset..next_start,
            next_start..next_start.saturating_add(page_size),
        ];

        let mut spans: Vec<Range<usize>> = Vec::new();
        for candidate in candidates {
            let range = candidate.start.min(len)..candidate.end.min(len);
            if range.is_empty() || self.holes(range.clone()).is_empty() {
                continue;
            }
            match spans.last_mut() {
                Some(last) if last.end == range.start => last.end = range.end,
                _ => spans.push(range),
            }
        }

        let mut requests = Vec::new();
        for span in spans {
            // Only holes are requested; rows already loading belong to another request
            for hole in self.holes(span) {
                self.cells.extend(hole.clone().map(|index| (index, Cell::Loading)));
                requests.push(FetchRequest { job_id: owner.clone(), start: hole.start, count: hole.len() });
            }
        }
        requests
    }

    /// Re-plan the last viewport, e.g. after a [`reset`](Self::reset).
    pub fn refresh_viewport(&mut self) -> Vec<FetchRequest> {
        match self.viewport {
            Some(Viewport { offset, page_size }) => self.set_viewport(offset, page_size),
            None => vec![],
        }
    }

    /// Store the rows a fetch returned.
    ///
    /// A short but non-empty read asks for the remainder through
    /// `backfill`. An empty read while rows were expected is an anomaly: the
    /// remainder is released and not re-requested.
    pub fn on_result(&mut self, request: &FetchRequest, rows: Vec<Row>) -> ResultApplication {
        if !self.owns(request) {
            tracing::trace!("Discarding stale rows [{}, {}) of job {}", request.start, request.end(), request.job_id);
            return ResultApplication::Stale;
        }

        let len = self.len();
        let end = request.end().min(len);
        let start = request.start.min(end);
        let returned = rows.len();

        let mut stored = 0;
        for (index, row) in (start..end).zip(rows) {
            self.cells.insert(index, Cell::Value(row));
            stored += 1;
        }
        let resume = start + stored;

        let backfill = if returned < request.count
            && resume < len
            && returned > 0
            && self.cells.range(resume..end).filter(|(_, cell)| cell.value().is_some()).count() < end - resume
        {
            tracing::debug!(
                "Job {} didn't provide {} rows, requesting missing rows...",
                request.job_id, end - resume
            );
            Some(FetchRequest { job_id: request.job_id.clone(), start: resume, count: end - resume })
        } else {
            if returned == 0 {
                let anomaly = LiveErrorKind::PartialResult {
                    job_id: request.job_id.clone(),
                    start: request.start,
                    count: request.count,
                };
                tracing::warn!("{}", anomaly);
            }
            self.release(resume..end);
            None
        };

        ResultApplication::Applied { start, count: stored, backfill }
    }

    /// Give the rows of a failed fetch back, so a later viewport change can
    /// request them again. Returns `false` for stale requests.
    pub fn on_error(&mut self, request: &FetchRequest, error: &ClientError) -> bool {
        if !self.owns(request) {
            return false;
        }
        tracing::warn!("Failed to load rows [{}, {}): {}", request.start, request.end(), error.message());
        self.release(request.range());
        true
    }

    fn owns(&self, request: &FetchRequest) -> bool {
        self.owner.as_deref() == Some(request.job_id.as_str())
    }

    fn release(&mut self, range: Range<usize>) {
        let loading: Vec<usize> = self.cells
            .range(self.clip(range))
            .filter(|(_, cell)| cell.is_loading())
            .map(|(&index, _)| index)
            .collect();
        for index in loading {
            self.cells.remove(&index);
        }
    }

    fn clip(&self, range: Range<usize>) -> Range<usize> {
        let end = range.end.min(self.len);
        range.start.min(end)..end
    }

    /// Maximal runs of `Empty` cells inside `range`.
    fn holes(&self, range: Range<usize>) -> Vec<Range<usize>> {
        let range = self.clip(range);
        let mut holes = Vec::new();
        let mut next = range.start;
        for (&index, _) in self.cells.range(range.clone()) {
            if index > next {
                holes.push(next..index);
            }
            next = index + 1;
        }
        if next < range.end {
            holes.push(next..range.end);
        }
        holes
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::row;

    fn rows(job_id: &str, range: Range<usize>) -> Vec<Row> {
        range.map(|n| row(job_id, n)).collect()
    }

    fn request(job_id: &str, start: usize, count: usize) -> FetchRequest {
        FetchRequest { job_id: job_id.into(), start, count }
    }

    fn cache_for(job_id: &str, row_count: usize) -> VirtualRowCache {
        let mut cache = VirtualRowCache::new();
        cache.reset(&Job::new(job_id), row_count);
        cache
    }

    #[test]
    fn reset_allocates_empty_cells() {
        let mut cache = cache_for("A", 10);
        cache.set_viewport(0, 5);

        cache.reset(&Job::new("B"), 42);

        assert_eq!(cache.len(), 42);
        assert_eq!(cache.owner(), Some("B"));
        assert!(cache.cells(0..42).all(Cell::is_empty));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn huge_results_only_store_requested_rows() {
        let mut cache = cache_for("A", 1_000_000_000_000);

        let requests = cache.set_viewport(500_000_000_000, 20);

        assert_eq!(requests, vec![request("A", 499_999_999_980, 60)]);
        assert_eq!(cache.loading_count(), 60);
        assert!(cache.cell(0).unwrap().is_empty());
        assert!(cache.cell(999_999_999_999).unwrap().is_empty());
        assert_eq!(cache.cell(1_000_000_000_000), None);

        cache.on_result(&requests[0], rows("A", 499_999_999_980..500_000_000_040));
        assert_eq!(cache.loaded_count(), 60);
        assert_eq!(cache.rows(500_000_000_000..500_000_000_002).len(), 2);
    }

    #[test]
    fn first_page_merges_current_and_next() {
        let mut cache = cache_for("A", 57);

        let requests = cache.set_viewport(0, 20);

        assert_eq!(requests, vec![request("A", 0, 40)]);
        assert_eq!(cache.loading_count(), 40);
        assert!(cache.cell(40).unwrap().is_empty());
    }

    #[test]
    fn middle_page_merges_all_three() {
        let mut cache = cache_for("A", 100);

        let requests = cache.set_viewport(40, 10);

        assert_eq!(requests, vec![request("A", 30, 30)]);
    }

    #[test]
    fn pages_are_clipped_to_the_row_count() {
        let mut cache = cache_for("A", 57);

        assert_eq!(cache.set_viewport(50, 20), vec![request("A", 30, 27)]);

        let mut cache = cache_for("A", 57);
        assert_eq!(cache.set_viewport(5, 20), vec![request("A", 0, 45)]);

        let mut cache = cache_for("A", 57);
        assert_eq!(cache.set_viewport(100, 20), vec![]);
    }

    #[test]
    fn same_viewport_twice_issues_no_duplicate_fetches() {
        let mut cache = cache_for("A", 100);

        assert_eq!(cache.set_viewport(20, 10).len(), 1);
        assert_eq!(cache.set_viewport(20, 10), vec![]);

        let first = request("A", 10, 30);
        cache.on_result(&first, rows("A", 10..40));
        assert_eq!(cache.set_viewport(20, 10), vec![]);
    }

    #[test]
    fn scrolling_requests_only_what_is_missing() {
        let mut cache = cache_for("A", 100);
        let first = cache.set_viewport(0, 10).remove(0);
        assert_eq!(first, request("A", 0, 20));

        // Previous and current page are loading, only the next page is new
        assert_eq!(cache.set_viewport(10, 10), vec![request("A", 20, 10)]);
    }

    #[test]
    fn loading_rows_inside_a_needed_page_are_not_requested_again() {
        let mut cache = cache_for("A", 100);
        cache.set_viewport(30, 5);

        // The current page [22, 27) overlaps the in-flight [25, 40)
        let requests = cache.set_viewport(22, 5);

        assert_eq!(requests, vec![request("A", 17, 8)]);
    }

    #[test]
    fn full_response_fills_values_without_backfill() {
        let mut cache = cache_for("A", 57);
        let requests = cache.set_viewport(0, 20);

        let applied = cache.on_result(&requests[0], rows("A", 0..40));

        assert_eq!(applied, ResultApplication::Applied { start: 0, count: 40, backfill: None });
        assert_eq!(cache.loaded_count(), 40);
        assert_eq!(cache.cell(39).unwrap().value(), Some(&row("A", 39)));
        assert!(cache.cell(40).unwrap().is_empty());
        assert_eq!(cache.loading_count(), 0);
    }

    #[test]
    fn short_read_then_empty_read_terminates() {
        let mut cache = cache_for("A", 100);
        let first = request("A", 50, 10);
        cache.cells.extend((50..60).map(|index| (index, Cell::Loading)));

        let backfill = match cache.on_result(&first, rows("A", 50..54)) {
            ResultApplication::Applied { count: 4, backfill: Some(backfill), .. } => backfill,
            other => panic!("Expected a backfill, got {other:?}"),
        };
        assert_eq!(backfill, request("A", 54, 6));
        assert!(cache.cells(54..60).all(Cell::is_loading));

        let applied = cache.on_result(&backfill, vec![]);

        assert_eq!(applied, ResultApplication::Applied { start: 54, count: 0, backfill: None });
        assert!(cache.cells(54..60).all(Cell::is_empty));
        assert_eq!(cache.loaded_count(), 4);
    }

    #[test]
    fn response_reaching_the_last_row_needs_no_backfill() {
        let mut cache = cache_for("A", 57);
        let requests = cache.set_viewport(40, 20);
        assert_eq!(requests, vec![request("A", 20, 37)]);

        let applied = cache.on_result(&requests[0], rows("A", 20..57));

        assert_eq!(applied, ResultApplication::Applied { start: 20, count: 37, backfill: None });
    }

    #[test]
    fn stale_results_are_discarded() {
        let mut cache = cache_for("A", 100);
        let from_a = cache.set_viewport(0, 10).remove(0);

        cache.reset(&Job::new("B"), 80);
        let from_b = cache.set_viewport(0, 10).remove(0);

        assert_eq!(cache.on_result(&from_a, rows("A", 0..20)), ResultApplication::Stale);
        assert_eq!(cache.loaded_count(), 0);
        assert_eq!(cache.loading_count(), 20);

        cache.on_result(&from_b, rows("B", 0..20));
        assert_eq!(cache.cell(0).unwrap().value(), Some(&row("B", 0)));
    }

    #[test]
    fn failed_fetch_releases_its_rows() {
        let mut cache = cache_for("A", 100);
        let failed = cache.set_viewport(0, 10).remove(0);

        assert!(cache.on_error(&failed, &ClientError::remote(500, "boom")));

        assert_eq!(cache.loading_count(), 0);
        assert_eq!(cache.set_viewport(0, 10), vec![request("A", 0, 20)]);
    }

    #[test]
    fn loaded_rows_never_become_empty_again() {
        let mut cache = cache_for("A", 100);
        let requests = cache.set_viewport(0, 10);
        cache.on_result(&requests[0], rows("A", 0..20));

        let stray = request("A", 15, 10);
        cache.on_error(&stray, &ClientError::remote(500, "boom"));
        cache.on_result(&stray, vec![]);

        assert_eq!(cache.loaded_count(), 20);
    }

    #[test]
    fn nothing_is_planned_without_an_owner() {
        let mut cache = VirtualRowCache::new();

        assert_eq!(cache.set_viewport(0, 20), vec![]);
        assert_eq!(cache.viewport(), Some(Viewport::new(0, 20)));

        cache.reset(&Job::new("A"), 30);
        assert_eq!(cache.refresh_viewport(), vec![request("A", 0, 30)]);
    }
}
