//! Transfer sources
//!
//! The update engine never builds transport requests itself. It only needs
//! three capabilities, expressed by [`TransferSource`]:
//! - the remote length of a file
//! - a byte stream starting at an offset (for resuming)
//! - the text of a manifest document
//!
//! [`HttpTransferSource`] is the default `reqwest` implementation.

mod http;

pub use http::HttpTransferSource;

use crate::error::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// A byte stream returned by [`TransferSource::ranged_read`]
pub struct RangedBody {
    /// Offset of the first byte the stream yields
    ///
    /// Normally the requested offset. A source whose server ignored the range
    /// request reports `0` here so the caller can discard its partial bytes.
    pub offset: u64,
    /// The body bytes
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl std::fmt::Debug for RangedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangedBody")
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

/// Capability to fetch remote bytes and documents
///
/// Implementations map their transport failures to
/// [`crate::error::TransferError`].
#[async_trait]
pub trait TransferSource: Send + Sync {
    /// Remote length of the resource in bytes
    async fn head_length(&self, url: &str) -> Result<u64>;

    /// Stream the resource starting at `offset`
    async fn ranged_read(&self, url: &str, offset: u64) -> Result<RangedBody>;

    /// Fetch a whole document as text
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
