//! Batch cursor engine
//!
//! A [`BatchCursor`] presents a result of unknown length as a navigable
//! sequence of 1-based rows, backed by batches fetched on demand from a
//! [`BatchSource`].
//!
//! - At most one fetch is outstanding. A demand for rows an in-flight fetch
//!   will deliver awaits that fetch instead of issuing another.
//! - After every move the cursor checks the distance from the current row to
//!   the edge of resident data in the direction of travel. Below half a fetch
//!   size it issues the next fetch in the background.
//! - A batch that carries a server exception raises it on every access to
//!   any row it covers, and the cursor does not move onto it.
//! - A fetch that times out stays outstanding. The position is unchanged and
//!   retrying the move awaits the same fetch.
//!
//! Forward-only cursors keep only the batch holding the current row and the
//! batches ahead of it. Moving back is allowed while the target row is still
//! resident; `first`, `last`, `before_first`, `after_last` and negative
//! `absolute` always fail.

mod batch;
mod source;

pub use source::{BatchSource, PendingBatch};

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::constants::{DEFAULT_CALL_TIMEOUT, DEFAULT_FETCH_SIZE, DEFAULT_SAVED_BATCHES, UNKNOWN_FINAL_ROW};
use crate::error::{Error, Result};
use crate::messages::{ColumnInfo, CursorType, ResultsMessage};
use crate::row::{Row, Value};

use batch::{Batch, BatchStore};
use source::InFlight;

/// Where a cursor stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Before the first row
    BeforeFirst,
    /// On a row (1-based)
    OnRow(i64),
    /// After the last row
    AfterLast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Cursor tuning
#[derive(Debug, Clone)]
pub struct CursorOptions {
    /// Navigation capability
    pub cursor_type: CursorType,
    /// Rows per fetch
    pub fetch_size: u32,
    /// Deadline for one fetch
    pub timeout: Duration,
    /// Issue fetches ahead of demand
    pub prefetch: bool,
    /// Batches a scrollable cursor keeps resident
    pub saved_batches: usize,
}

impl Default for CursorOptions {
    fn default() -> Self {
        Self {
            cursor_type: CursorType::ForwardOnly,
            fetch_size: DEFAULT_FETCH_SIZE,
            timeout: DEFAULT_CALL_TIMEOUT,
            prefetch: true,
            saved_batches: DEFAULT_SAVED_BATCHES,
        }
    }
}

impl CursorOptions {
    /// Options from a session configuration
    pub fn from_config(config: &Config, cursor_type: CursorType) -> Self {
        Self {
            cursor_type,
            fetch_size: config.fetch_size,
            timeout: config.call_timeout,
            prefetch: config.prefetch,
            saved_batches: config.saved_batches,
        }
    }

    /// Set the cursor type
    pub fn cursor_type(mut self, cursor_type: CursorType) -> Self {
        self.cursor_type = cursor_type;
        self
    }

    /// Set rows per fetch
    pub fn fetch_size(mut self, rows: u32) -> Self {
        self.fetch_size = rows;
        self
    }

    /// Set the fetch deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable prefetching
    pub fn prefetch(mut self, enabled: bool) -> Self {
        self.prefetch = enabled;
        self
    }

    /// Set the resident batch limit
    pub fn saved_batches(mut self, batches: usize) -> Self {
        self.saved_batches = batches;
        self
    }
}

/// Navigable view over a batched result
pub struct BatchCursor {
    source: Arc<dyn BatchSource>,
    options: CursorOptions,
    store: BatchStore,
    position: Position,
    direction: Direction,
    final_row: Option<i64>,
    in_flight: Option<InFlight>,
    columns: Vec<ColumnInfo>,
    warnings: Vec<String>,
    update_count: Option<i64>,
    fetches_issued: u64,
    closed: bool,
}

impl BatchCursor {
    /// Create a cursor seeded with the first results of an execution
    pub fn new(
        source: Arc<dyn BatchSource>,
        first: ResultsMessage,
        options: CursorOptions,
    ) -> Result<Self> {
        if options.fetch_size == 0 {
            return Err(Error::InvalidConfig("fetch size must be positive".to_string()));
        }
        let mut cursor = Self {
            source,
            options,
            store: BatchStore::default(),
            position: Position::BeforeFirst,
            direction: Direction::Forward,
            final_row: None,
            in_flight: None,
            columns: Vec::new(),
            warnings: Vec::new(),
            update_count: None,
            fetches_issued: 0,
            closed: false,
        };
        cursor.absorb(first)?;
        Ok(cursor)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Move to the next row
    pub async fn next(&mut self) -> Result<bool> {
        self.ensure_open()?;
        match self.position {
            Position::BeforeFirst => self.move_to(1, Direction::Forward).await,
            Position::OnRow(n) => self.move_to(n + 1, Direction::Forward).await,
            Position::AfterLast => Ok(false),
        }
    }

    /// Move to the previous row
    pub async fn previous(&mut self) -> Result<bool> {
        self.ensure_open()?;
        match self.position {
            Position::BeforeFirst => Ok(false),
            Position::OnRow(n) => self.move_to(n - 1, Direction::Backward).await,
            Position::AfterLast => {
                let last = match self.final_row {
                    Some(last) => last,
                    None => {
                        self.ensure_scrollable("previous() from after the last row")?;
                        self.ensure_final_known().await?
                    }
                };
                self.move_to(last, Direction::Backward).await
            }
        }
    }

    /// Move to row `row`; negative counts from the end (`-1` is the last row)
    ///
    /// Returns false and parks before the first or after the last row when
    /// `row` is outside the result.
    pub async fn absolute(&mut self, row: i64) -> Result<bool> {
        self.ensure_open()?;
        if row == 0 {
            return Err(Error::navigation("absolute(0) does not address a row"));
        }
        if row < 0 {
            self.ensure_scrollable("absolute() with a negative row")?;
            let last = self.ensure_final_known().await?;
            let target = last + 1 + row;
            if target < 1 {
                self.position = Position::BeforeFirst;
                return Ok(false);
            }
            let direction = self.direction_to(target);
            return self.move_to(target, direction).await;
        }
        let direction = self.direction_to(row);
        self.move_to(row, direction).await
    }

    /// Move `delta` rows from the current row
    pub async fn relative(&mut self, delta: i64) -> Result<bool> {
        self.ensure_open()?;
        let Position::OnRow(n) = self.position else {
            return Err(Error::navigation("relative() requires a current row"));
        };
        if delta == 0 {
            self.store.row_at(n)?;
            return Ok(true);
        }
        let direction = if delta > 0 {
            Direction::Forward
        } else {
            Direction::Backward
        };
        self.move_to(n.saturating_add(delta), direction).await
    }

    /// Move to the first row
    pub async fn first(&mut self) -> Result<bool> {
        self.ensure_open()?;
        self.ensure_scrollable("first()")?;
        self.absolute(1).await
    }

    /// Move to the last row
    pub async fn last(&mut self) -> Result<bool> {
        self.ensure_open()?;
        self.ensure_scrollable("last()")?;
        self.absolute(-1).await
    }

    /// Park before the first row
    pub fn before_first(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.ensure_scrollable("before_first()")?;
        self.position = Position::BeforeFirst;
        self.direction = Direction::Forward;
        Ok(())
    }

    /// Park after the last row
    pub fn after_last(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.ensure_scrollable("after_last()")?;
        self.position = Position::AfterLast;
        self.direction = Direction::Backward;
        Ok(())
    }

    // =========================================================================
    // Position queries
    // =========================================================================

    /// Current position
    pub fn position(&self) -> Position {
        self.position
    }

    /// 1-based row number, or 0 when not on a row
    pub fn get_row(&self) -> i64 {
        match self.position {
            Position::OnRow(n) => n,
            _ => 0,
        }
    }

    /// Check if the cursor is on the first row
    pub fn is_first(&self) -> bool {
        self.position == Position::OnRow(1)
    }

    /// Check if the cursor is on the last row; may fetch to find out
    pub async fn is_last(&mut self) -> Result<bool> {
        self.ensure_open()?;
        let Position::OnRow(n) = self.position else {
            return Ok(false);
        };
        Ok(!self.has_row(n + 1).await?)
    }

    /// Check if the cursor is before the first row of a non-empty result
    pub async fn is_before_first(&mut self) -> Result<bool> {
        self.ensure_open()?;
        if self.position != Position::BeforeFirst {
            return Ok(false);
        }
        self.has_row(1).await
    }

    /// Check if the cursor is after the last row of a non-empty result
    pub fn is_after_last(&self) -> bool {
        self.position == Position::AfterLast && self.final_row != Some(0)
    }

    // =========================================================================
    // Row access and metadata
    // =========================================================================

    /// Current row
    pub fn row(&self) -> Result<&Row> {
        self.ensure_open()?;
        match self.position {
            Position::OnRow(n) => self.store.row_at(n),
            _ => Err(Error::NoCurrentRow),
        }
    }

    /// Column `index` (0-based) of the current row
    pub fn get(&self, index: usize) -> Result<&Value> {
        self.row()?.get(index)
    }

    /// Column metadata
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Warnings reported with any batch so far
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Affected row count, for statements without a result set
    pub fn update_count(&self) -> Option<i64> {
        self.update_count
    }

    /// Total row count, once the server has reported it
    pub fn final_row(&self) -> Option<i64> {
        self.final_row
    }

    /// Navigation capability of this cursor
    pub fn cursor_type(&self) -> CursorType {
        self.options.cursor_type
    }

    /// Number of fetches issued to the source, prefetches included
    pub fn fetches_issued(&self) -> u64 {
        self.fetches_issued
    }

    /// Check if the cursor is closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the cursor and release the server-side result
    ///
    /// An in-flight fetch is abandoned; its reply is discarded on arrival.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(flight) = self.in_flight.take() {
            tracing::debug!(start_row = flight.start_row, "Abandoning in-flight fetch on close");
        }
        self.store.clear();
        self.source.close().await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::CursorClosed)
        } else {
            Ok(())
        }
    }

    fn is_forward_only(&self) -> bool {
        self.options.cursor_type == CursorType::ForwardOnly
    }

    fn ensure_scrollable(&self, operation: &str) -> Result<()> {
        if self.is_forward_only() {
            return Err(Error::navigation(format!(
                "{} is not allowed on a forward-only cursor",
                operation
            )));
        }
        Ok(())
    }

    fn direction_to(&self, target: i64) -> Direction {
        match self.position {
            Position::OnRow(n) if target < n => Direction::Backward,
            Position::AfterLast => Direction::Backward,
            _ => Direction::Forward,
        }
    }

    /// Forward-only cursors may only go back to rows still resident
    fn check_reachable(&self, target: i64) -> Result<()> {
        if !self.is_forward_only() || self.store.contains(target) {
            return Ok(());
        }
        let from = match self.position {
            Position::BeforeFirst => 0,
            Position::OnRow(n) => n,
            Position::AfterLast => i64::MAX,
        };
        if target < from {
            return Err(Error::navigation(format!(
                "row {} is no longer available on a forward-only cursor",
                target
            )));
        }
        Ok(())
    }

    async fn move_to(&mut self, target: i64, direction: Direction) -> Result<bool> {
        self.check_reachable(target)?;
        self.direction = direction;
        if target < 1 {
            self.position = Position::BeforeFirst;
            return Ok(false);
        }

        let mut stalled = false;
        loop {
            if self.store.contains(target) {
                self.store.row_at(target)?;
                self.position = Position::OnRow(target);
                self.after_move(target).await;
                return Ok(true);
            }
            if let Some(last) = self.final_row {
                if target > last {
                    self.position = Position::AfterLast;
                    return Ok(false);
                }
            }
            if self.in_flight.is_none() {
                if stalled {
                    return Err(Error::protocol(format!(
                        "server returned no rows for row {}",
                        target
                    )));
                }
                let (start, count) = self.fetch_span(target, direction);
                self.issue(start, count).await?;
            }
            stalled = !self.await_in_flight().await?;
        }
    }

    /// Fetch anchor and size for a demand fetch of `target`
    fn fetch_span(&self, target: i64, direction: Direction) -> (i64, u32) {
        let fetch = self.options.fetch_size as i64;
        let mut start = match direction {
            Direction::Forward => target,
            Direction::Backward => (target - fetch + 1).max(1),
        };
        if let Some(prev_end) = self.store.prev_end_before(target) {
            start = start.max(prev_end + 1);
        }
        let mut count = fetch;
        if let Some(next_start) = self.store.next_start_after(start) {
            count = count.min(next_start - start);
        }
        (start, count.max(1) as u32)
    }

    async fn issue(&mut self, start_row: i64, row_count: u32) -> Result<()> {
        let call = self.source.request_batch(start_row, row_count).await?;
        self.fetches_issued += 1;
        tracing::trace!(start_row, row_count, "Fetch issued");
        self.in_flight = Some(InFlight {
            start_row,
            row_count,
            call,
        });
        Ok(())
    }

    /// Await the outstanding fetch; true if it added rows or the final row
    async fn await_in_flight(&mut self) -> Result<bool> {
        let Some(flight) = self.in_flight.as_mut() else {
            return Ok(false);
        };
        let outcome = flight.call.wait(self.options.timeout).await;
        let results = match outcome {
            Ok(results) => results,
            Err(e) => {
                if !e.is_timeout() {
                    self.in_flight = None;
                }
                return Err(e);
            }
        };
        if let Some(flight) = self.in_flight.take() {
            tracing::trace!(
                start_row = flight.start_row,
                end_row = flight.end_row(),
                first_row = results.first_row,
                last_row = results.last_row,
                "Fetch completed"
            );
        }
        self.absorb(results)
    }

    fn absorb(&mut self, mut results: ResultsMessage) -> Result<bool> {
        results.validate()?;
        let mut progressed = false;
        if results.final_row != UNKNOWN_FINAL_ROW && self.final_row != Some(results.final_row) {
            self.final_row = Some(results.final_row);
            progressed = true;
        }
        if self.columns.is_empty() && !results.columns.is_empty() {
            self.columns = std::mem::take(&mut results.columns);
        }
        if results.update_count.is_some() {
            self.update_count = results.update_count;
        }
        for warning in results.warnings.drain(..) {
            tracing::debug!(warning = %warning, "Server warning");
            self.warnings.push(warning);
        }
        if let Some(batch) = Batch::from_results(&mut results) {
            self.store.insert(batch);
            progressed = true;
        }
        Ok(progressed)
    }

    /// Fetch forward until the server reports the final row
    async fn ensure_final_known(&mut self) -> Result<i64> {
        let mut stalled = false;
        loop {
            if let Some(last) = self.final_row {
                return Ok(last);
            }
            if self.in_flight.is_none() {
                if stalled {
                    return Err(Error::protocol("server never reported the final row"));
                }
                let start = self.store.highest_row().unwrap_or(0) + 1;
                self.issue(start, self.options.fetch_size).await?;
            }
            stalled = !self.await_in_flight().await?;
            if let Some(highest) = self.store.highest_row() {
                let current = match self.position {
                    Position::OnRow(n) => Some(n),
                    _ => None,
                };
                self.store
                    .evict_keeping(self.options.saved_batches, highest, current);
            }
        }
    }

    /// Whether row `row` exists; fetches when residency cannot tell
    async fn has_row(&mut self, row: i64) -> Result<bool> {
        let mut stalled = false;
        loop {
            if self.store.contains(row) {
                return Ok(true);
            }
            if let Some(last) = self.final_row {
                return Ok(row <= last);
            }
            if self.in_flight.is_none() {
                if stalled {
                    return Err(Error::protocol(format!(
                        "server returned no rows for row {}",
                        row
                    )));
                }
                let (start, count) = self.fetch_span(row, Direction::Forward);
                self.issue(start, count).await?;
            }
            stalled = !self.await_in_flight().await?;
        }
    }

    async fn after_move(&mut self, row: i64) {
        self.evict(row);
        if self.options.prefetch {
            self.maybe_prefetch(row).await;
        }
    }

    fn evict(&mut self, row: i64) {
        if self.is_forward_only() {
            self.store.evict_behind(row);
        } else {
            self.store.evict_to(self.options.saved_batches, row);
        }
    }

    async fn maybe_prefetch(&mut self, row: i64) {
        if self.in_flight.is_some() {
            return;
        }
        let fetch = self.options.fetch_size as i64;
        let threshold = (fetch / 2).max(1);
        let span = match self.direction {
            Direction::Forward => {
                let edge = self.store.contiguous_end(row);
                if self.final_row.is_some_and(|last| edge >= last) || edge - row >= threshold {
                    return;
                }
                let start = edge + 1;
                let count = self
                    .store
                    .next_start_after(edge)
                    .map_or(fetch, |next| fetch.min(next - start));
                (start, count)
            }
            Direction::Backward => {
                if self.is_forward_only() {
                    return;
                }
                let edge = self.store.contiguous_start(row);
                if edge <= 1 || row - edge >= threshold {
                    return;
                }
                let mut start = (edge - fetch).max(1);
                if let Some(prev_end) = self.store.prev_end_before(edge) {
                    start = start.max(prev_end + 1);
                }
                (start, edge - start)
            }
        };
        let (start, count) = span;
        if count <= 0 {
            return;
        }
        tracing::trace!(row, start, count, "Prefetching");
        if let Err(e) = self.issue(start, count as u32).await {
            tracing::debug!(error = %e, "Prefetch not issued");
        }
    }
}

impl std::fmt::Debug for BatchCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCursor")
            .field("cursor_type", &self.options.cursor_type)
            .field("position", &self.position)
            .field("final_row", &self.final_row)
            .field("resident_batches", &self.store.len())
            .field("in_flight", &self.in_flight.as_ref().map(|f| f.start_row))
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::RemoteException;
    use crate::transport::PendingCall;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Ready(Option<ResultsMessage>);

    #[async_trait]
    impl PendingCall<ResultsMessage> for Ready {
        async fn wait(&mut self, _timeout: Duration) -> Result<ResultsMessage> {
            self.0
                .take()
                .ok_or_else(|| Error::protocol("reply already consumed"))
        }
    }

    /// Serves rows `1..=total`, failing at `fail_at` if set
    struct Table {
        total: i64,
        fail_at: Option<i64>,
        requests: AtomicU64,
    }

    impl Table {
        fn new(total: i64) -> Arc<Self> {
            Arc::new(Self {
                total,
                fail_at: None,
                requests: AtomicU64::new(0),
            })
        }

        fn slice(&self, start: i64, count: u32) -> ResultsMessage {
            if self.fail_at == Some(start) {
                return ResultsMessage::failure(start, RemoteException::new("bad row"));
            }
            if start > self.total {
                return ResultsMessage::past_end(start, self.total);
            }
            let end = (start + count as i64 - 1).min(self.total);
            let rows = (start..=end).map(|n| Row::new(vec![Value::Long(n)])).collect();
            ResultsMessage::batch(start, rows, end >= self.total)
        }
    }

    #[async_trait]
    impl BatchSource for Table {
        async fn request_batch(&self, start_row: i64, row_count: u32) -> Result<PendingBatch> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Ready(Some(self.slice(start_row, row_count)))))
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn cursor(table: &Arc<Table>, options: CursorOptions) -> BatchCursor {
        let first = table.slice(1, options.fetch_size);
        BatchCursor::new(table.clone(), first, options).unwrap()
    }

    fn current(cursor: &BatchCursor) -> i64 {
        cursor.get(0).unwrap().as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_forward_scan() {
        let table = Table::new(25);
        let mut c = cursor(&table, CursorOptions::default().fetch_size(10));
        let mut seen = 0;
        while c.next().await.unwrap() {
            seen += 1;
            assert_eq!(current(&c), seen);
        }
        assert_eq!(seen, 25);
        assert_eq!(c.final_row(), Some(25));
        assert!(c.is_after_last());
        assert!(!c.next().await.unwrap());
    }

    #[tokio::test]
    async fn test_scrollable_navigation() {
        let table = Table::new(100);
        let options = CursorOptions::default()
            .fetch_size(10)
            .cursor_type(CursorType::Scrollable);
        let mut c = cursor(&table, options);

        assert!(c.last().await.unwrap());
        assert_eq!(c.get_row(), 100);
        assert!(c.is_last().await.unwrap());
        assert!(c.absolute(-10).await.unwrap());
        assert_eq!(current(&c), 91);
        assert!(c.first().await.unwrap());
        assert!(c.is_first());
        assert!(!c.absolute(500).await.unwrap());
        assert!(c.is_after_last());
        assert!(c.previous().await.unwrap());
        assert_eq!(c.get_row(), 100);
        assert!(c.relative(-5).await.unwrap());
        assert_eq!(current(&c), 95);
        c.before_first().unwrap();
        assert!(c.is_before_first().await.unwrap());
    }

    #[tokio::test]
    async fn test_forward_only_rejects_backward_moves() {
        let table = Table::new(100);
        let mut c = cursor(&table, CursorOptions::default().fetch_size(10));
        assert!(matches!(c.first().await, Err(Error::IllegalNavigation(_))));
        assert!(matches!(c.last().await, Err(Error::IllegalNavigation(_))));
        assert!(matches!(c.absolute(-1).await, Err(Error::IllegalNavigation(_))));
        assert!(c.before_first().is_err());
        assert!(c.after_last().is_err());

        assert!(c.absolute(35).await.unwrap());
        assert!(c.next().await.unwrap());
        assert!(c.previous().await.unwrap());
        assert_eq!(c.get_row(), 35);
        let requests = table.requests.load(Ordering::SeqCst);
        assert!(matches!(c.absolute(5).await, Err(Error::IllegalNavigation(_))));
        assert!(matches!(c.previous().await, Err(Error::IllegalNavigation(_))));
        assert_eq!(c.get_row(), 35);
        assert_eq!(table.requests.load(Ordering::SeqCst), requests);
    }

    #[tokio::test]
    async fn test_sticky_failure() {
        let table = Arc::new(Table {
            total: 10,
            fail_at: Some(2),
            requests: AtomicU64::new(0),
        });
        let mut c = cursor(&table, CursorOptions::default().fetch_size(1));
        assert!(c.next().await.unwrap());
        for _ in 0..2 {
            assert!(matches!(c.next().await, Err(Error::Remote(_))));
            assert_eq!(c.get_row(), 1);
        }
    }

    #[tokio::test]
    async fn test_relative_zero_and_closed() {
        let table = Table::new(5);
        let mut c = cursor(&table, CursorOptions::default().fetch_size(5));
        assert!(matches!(c.relative(1).await, Err(Error::IllegalNavigation(_))));
        assert!(c.next().await.unwrap());
        assert!(c.relative(0).await.unwrap());
        assert_eq!(c.get_row(), 1);

        c.close().await.unwrap();
        c.close().await.unwrap();
        assert!(c.is_closed());
        assert!(matches!(c.next().await, Err(Error::CursorClosed)));
        assert!(matches!(c.row(), Err(Error::CursorClosed)));
    }

    #[tokio::test]
    async fn test_empty_result() {
        let table = Table::new(0);
        let first = ResultsMessage::batch(1, Vec::new(), true);
        let mut c = BatchCursor::new(table.clone(), first, CursorOptions::default()).unwrap();
        assert!(!c.next().await.unwrap());
        assert!(!c.is_after_last());
        assert!(!c.is_before_first().await.unwrap());
        assert!(matches!(c.row(), Err(Error::NoCurrentRow)));
    }
}
