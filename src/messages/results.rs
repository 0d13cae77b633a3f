//! Result batches
//!
//! A `ResultsMessage` covers the contiguous 1-based row range
//! `first_row..=last_row`. An empty batch has `last_row == first_row - 1`.
//! `final_row` is the last row number of the whole result once the server
//! knows it, or [`UNKNOWN_FINAL_ROW`] before that.
//!
//! A batch carrying an exception and no rows stands for the single row
//! `first_row`; reaching it raises the exception.

use crate::codec::{Decoder, Encoder, KnownType, WireType};
use crate::constants::UNKNOWN_FINAL_ROW;
use crate::error::{Error, Result};
use crate::messages::RemoteException;
use crate::row::Row;

/// Column metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column label
    pub name: String,
    /// Server type name
    pub type_name: String,
}

impl ColumnInfo {
    /// Create column metadata
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A batch of rows, or the outcome of a statement without rows
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsMessage {
    /// Row number of the first row in this batch (1-based)
    pub first_row: i64,
    /// Row number of the last row in this batch
    pub last_row: i64,
    /// Last row of the whole result, or -1 if unknown
    pub final_row: i64,
    /// Column metadata (sent with the first batch)
    pub columns: Vec<ColumnInfo>,
    /// Rows in ascending order
    pub rows: Vec<Row>,
    /// Affected row count for statements without a result set
    pub update_count: Option<i64>,
    /// Non-fatal server warnings
    pub warnings: Vec<String>,
    /// Failure that applies to this batch
    pub exception: Option<RemoteException>,
}

impl ResultsMessage {
    /// Create an empty batch header for `first_row..=last_row`
    pub fn new(first_row: i64, last_row: i64) -> Self {
        Self {
            first_row,
            last_row,
            final_row: UNKNOWN_FINAL_ROW,
            columns: Vec::new(),
            rows: Vec::new(),
            update_count: None,
            warnings: Vec::new(),
            exception: None,
        }
    }

    /// Batch of `rows` starting at `first_row`; `is_last` fixes the final row
    pub fn batch(first_row: i64, rows: Vec<Row>, is_last: bool) -> Self {
        let last_row = first_row + rows.len() as i64 - 1;
        let mut results = Self::new(first_row, last_row);
        results.rows = rows;
        if is_last {
            results.final_row = last_row;
        }
        results
    }

    /// Empty batch at `first_row` of a result that ends at `final_row`
    pub fn past_end(first_row: i64, final_row: i64) -> Self {
        let mut results = Self::new(first_row, first_row - 1);
        results.final_row = final_row;
        results
    }

    /// Batch that fails at `row`
    pub fn failure(row: i64, exception: RemoteException) -> Self {
        let mut results = Self::new(row, row - 1);
        results.exception = Some(exception);
        results
    }

    /// Outcome of a statement that produced no result set
    pub fn update(count: i64) -> Self {
        let mut results = Self::new(1, 0);
        results.final_row = 0;
        results.update_count = Some(count);
        results
    }

    /// Whether this batch contains the last row of the result
    pub fn is_last(&self) -> bool {
        self.final_row != UNKNOWN_FINAL_ROW && self.last_row >= self.final_row
    }

    /// Check that the row count matches the declared range
    pub fn validate(&self) -> Result<()> {
        let malformed = || Error::MalformedBatch {
            first_row: self.first_row,
            last_row: self.last_row,
            actual: self.rows.len(),
        };
        if self.first_row < 1 {
            return Err(malformed());
        }
        if self.exception.is_some() && self.rows.is_empty() {
            return Ok(());
        }
        let declared = self
            .last_row
            .checked_sub(self.first_row)
            .and_then(|span| span.checked_add(1))
            .ok_or_else(malformed)?;
        if declared != self.rows.len() as i64 {
            return Err(malformed());
        }
        if self.final_row != UNKNOWN_FINAL_ROW && !self.rows.is_empty() && self.final_row < self.last_row {
            return Err(malformed());
        }
        Ok(())
    }
}

impl WireType for ResultsMessage {
    const KIND: KnownType = KnownType::ResultsMessage;

    fn write_body(&self, enc: &mut Encoder) -> Result<()> {
        let buf = enc.buffer();
        buf.write_i64_be(self.first_row)?;
        buf.write_i64_be(self.last_row)?;
        buf.write_i64_be(self.final_row)?;
        buf.write_u32_be(self.columns.len() as u32)?;
        for column in &self.columns {
            buf.write_string(&column.name)?;
            buf.write_short_string(&column.type_name)?;
        }

        enc.buffer().write_u32_be(self.rows.len() as u32)?;
        for row in &self.rows {
            enc.write_values(row.values())?;
        }

        let buf = enc.buffer();
        match self.update_count {
            Some(count) => {
                buf.write_bool(true)?;
                buf.write_i64_be(count)?;
            }
            None => buf.write_bool(false)?,
        }
        buf.write_u32_be(self.warnings.len() as u32)?;
        for warning in &self.warnings {
            buf.write_string(warning)?;
        }
        enc.write_optional_object(self.exception.as_ref())
    }

    fn read_body(dec: &mut Decoder<'_>) -> Result<Self> {
        let buf = dec.buffer();
        let first_row = buf.read_i64_be()?;
        let last_row = buf.read_i64_be()?;
        let final_row = buf.read_i64_be()?;
        let column_count = buf.read_u32_be()? as usize;
        let mut columns = Vec::with_capacity(column_count.min(buf.remaining()));
        for _ in 0..column_count {
            let name = buf.read_string()?;
            let type_name = buf.read_short_string()?;
            columns.push(ColumnInfo { name, type_name });
        }

        let row_count = dec.buffer().read_u32_be()? as usize;
        let mut rows = Vec::with_capacity(row_count.min(dec.buffer().remaining()));
        for _ in 0..row_count {
            rows.push(Row::new(dec.read_values()?));
        }

        let buf = dec.buffer();
        let update_count = if buf.read_bool()? {
            Some(buf.read_i64_be()?)
        } else {
            None
        };
        let warning_count = buf.read_u32_be()? as usize;
        let mut warnings = Vec::with_capacity(warning_count.min(buf.remaining()));
        for _ in 0..warning_count {
            warnings.push(buf.read_string()?);
        }
        let exception = dec.read_optional_object::<RemoteException>()?;

        Ok(Self {
            first_row,
            last_row,
            final_row,
            columns,
            rows,
            update_count,
            warnings,
            exception,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;

    fn rows(n: usize) -> Vec<Row> {
        (0..n).map(|i| Row::new(vec![Value::Long(i as i64)])).collect()
    }

    #[test]
    fn test_batch_ranges() {
        let b = ResultsMessage::batch(401, rows(400), false);
        assert_eq!(b.last_row, 800);
        assert_eq!(b.final_row, UNKNOWN_FINAL_ROW);
        assert!(!b.is_last());
        assert!(b.validate().is_ok());

        let last = ResultsMessage::batch(801, rows(200), true);
        assert_eq!(last.final_row, 1000);
        assert!(last.is_last());
    }

    #[test]
    fn test_empty_last_batch() {
        let b = ResultsMessage::batch(1001, vec![], true);
        assert_eq!(b.last_row, 1000);
        assert_eq!(b.final_row, 1000);
        assert!(b.validate().is_ok());
    }

    #[test]
    fn test_batch_past_end() {
        let b = ResultsMessage::past_end(5000, 250);
        assert!(b.rows.is_empty());
        assert_eq!(b.final_row, 250);
        assert!(b.validate().is_ok());
    }

    #[test]
    fn test_extreme_row_range_is_malformed() {
        let mut b = ResultsMessage::new(2, i64::MIN);
        b.rows = rows(1);
        assert!(matches!(b.validate(), Err(Error::MalformedBatch { .. })));

        let mut b = ResultsMessage::new(1, i64::MAX);
        b.rows = rows(1);
        assert!(matches!(b.validate(), Err(Error::MalformedBatch { .. })));
    }

    #[test]
    fn test_count_mismatch_is_malformed() {
        let mut b = ResultsMessage::batch(1, rows(3), false);
        b.last_row = 5;
        assert!(matches!(
            b.validate(),
            Err(Error::MalformedBatch { first_row: 1, last_row: 5, actual: 3 })
        ));
    }

    #[test]
    fn test_failure_batch_is_valid() {
        let b = ResultsMessage::failure(41, RemoteException::new("disk full"));
        assert!(b.validate().is_ok());
        assert!(b.rows.is_empty());
    }
}
