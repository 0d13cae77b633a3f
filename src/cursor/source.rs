//! Where a cursor gets its batches from

use async_trait::async_trait;

use crate::error::Result;
use crate::messages::ResultsMessage;
use crate::transport::PendingCall;

/// An outstanding batch fetch
pub type PendingBatch = Box<dyn PendingCall<ResultsMessage>>;

/// Server side of a cursor
///
/// `request_batch` only issues the fetch; the returned handle is awaited
/// separately, which lets a prefetch run while the caller keeps reading
/// resident rows.
#[async_trait]
pub trait BatchSource: Send + Sync {
    /// Issue a fetch of up to `row_count` rows starting at `start_row`
    async fn request_batch(&self, start_row: i64, row_count: u32) -> Result<PendingBatch>;

    /// Release the server-side result
    async fn close(&self) -> Result<()>;
}

/// The single fetch a cursor may have outstanding
pub(crate) struct InFlight {
    pub(crate) start_row: i64,
    pub(crate) row_count: u32,
    pub(crate) call: PendingBatch,
}

impl InFlight {
    pub(crate) fn end_row(&self) -> i64 {
        self.start_row + self.row_count as i64 - 1
    }
}
