//! Resident batches

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::messages::{RemoteException, ResultsMessage};
use crate::row::Row;

/// Rows `first_row..=last_row` held by the client
///
/// A batch with a failure raises it for every row it covers. A failure
/// delivered without rows covers only `first_row`.
#[derive(Debug)]
pub(crate) struct Batch {
    pub(crate) first_row: i64,
    pub(crate) last_row: i64,
    rows: Vec<Row>,
    failure: Option<RemoteException>,
}

impl Batch {
    /// Take the rows out of a validated results message
    pub(crate) fn from_results(results: &mut ResultsMessage) -> Option<Self> {
        let failure = results.exception.take();
        let rows = std::mem::take(&mut results.rows);
        match (rows.is_empty(), failure) {
            (true, None) => None,
            (true, Some(failure)) => Some(Batch {
                first_row: results.first_row,
                last_row: results.first_row,
                rows,
                failure: Some(failure),
            }),
            (false, failure) => Some(Batch {
                first_row: results.first_row,
                last_row: results.last_row,
                rows,
                failure,
            }),
        }
    }

    pub(crate) fn contains(&self, row: i64) -> bool {
        row >= self.first_row && row <= self.last_row
    }

    /// Row `row`, or the batch failure
    pub(crate) fn row(&self, row: i64) -> Result<&Row> {
        if let Some(failure) = &self.failure {
            return Err(Error::Remote(failure.clone()));
        }
        self.rows
            .get((row - self.first_row) as usize)
            .filter(|_| self.contains(row))
            .ok_or(Error::NoCurrentRow)
    }

    fn distance(&self, row: i64) -> i64 {
        if row < self.first_row {
            self.first_row - row
        } else if row > self.last_row {
            row - self.last_row
        } else {
            0
        }
    }
}

/// Non-overlapping batches keyed by first row
#[derive(Debug, Default)]
pub(crate) struct BatchStore {
    batches: BTreeMap<i64, Batch>,
}

impl BatchStore {
    pub(crate) fn insert(&mut self, batch: Batch) {
        let overlapping: Vec<i64> = self
            .batches
            .values()
            .filter(|b| b.first_row <= batch.last_row && b.last_row >= batch.first_row)
            .map(|b| b.first_row)
            .collect();
        for first_row in overlapping {
            self.batches.remove(&first_row);
        }
        self.batches.insert(batch.first_row, batch);
    }

    pub(crate) fn find(&self, row: i64) -> Option<&Batch> {
        self.batches
            .range(..=row)
            .next_back()
            .map(|(_, b)| b)
            .filter(|b| b.contains(row))
    }

    pub(crate) fn contains(&self, row: i64) -> bool {
        self.find(row).is_some()
    }

    pub(crate) fn row_at(&self, row: i64) -> Result<&Row> {
        self.find(row).ok_or(Error::NoCurrentRow)?.row(row)
    }

    /// Last row of the resident run that contains `row`
    pub(crate) fn contiguous_end(&self, row: i64) -> i64 {
        let Some(batch) = self.find(row) else {
            return row - 1;
        };
        let mut end = batch.last_row;
        while let Some(next) = self.batches.get(&(end + 1)) {
            end = next.last_row;
        }
        end
    }

    /// First row of the resident run that contains `row`
    pub(crate) fn contiguous_start(&self, row: i64) -> i64 {
        let Some(batch) = self.find(row) else {
            return row + 1;
        };
        let mut start = batch.first_row;
        while let Some(prev) = self.find(start - 1) {
            start = prev.first_row;
        }
        start
    }

    /// First row of the nearest batch starting after `row`
    pub(crate) fn next_start_after(&self, row: i64) -> Option<i64> {
        self.batches.range(row + 1..).next().map(|(first, _)| *first)
    }

    /// Last row of the nearest batch ending before `row`
    pub(crate) fn prev_end_before(&self, row: i64) -> Option<i64> {
        self.batches
            .range(..row)
            .rev()
            .map(|(_, b)| b.last_row)
            .find(|last| *last < row)
    }

    pub(crate) fn highest_row(&self) -> Option<i64> {
        self.batches.values().next_back().map(|b| b.last_row)
    }

    /// Drop every batch entirely behind the batch holding `row`
    pub(crate) fn evict_behind(&mut self, row: i64) {
        let Some(keep_from) = self.find(row).map(|b| b.first_row) else {
            return;
        };
        self.batches = self.batches.split_off(&keep_from);
    }

    /// Keep at most `limit` batches, dropping those farthest from `row`
    pub(crate) fn evict_to(&mut self, limit: usize, row: i64) {
        self.evict_keeping(limit, row, None);
    }

    /// Like `evict_to`, but the batches holding `row` and `pinned` both stay
    pub(crate) fn evict_keeping(&mut self, limit: usize, row: i64, pinned: Option<i64>) {
        let limit = limit.max(1);
        while self.batches.len() > limit {
            let farthest = self
                .batches
                .values()
                .filter(|b| !b.contains(row) && !pinned.is_some_and(|p| b.contains(p)))
                .max_by_key(|b| b.distance(row))
                .map(|b| b.first_row);
            match farthest {
                Some(first_row) => {
                    tracing::trace!(first_row, "Evicting batch");
                    self.batches.remove(&first_row);
                }
                None => break,
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.batches.len()
    }

    pub(crate) fn clear(&mut self) {
        self.batches.clear();
    }
}
