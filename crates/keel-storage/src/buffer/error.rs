//! Buffer pool errors.

use std::io;

use keel_common::PageId;
use thiserror::Error;

use crate::hash::DirectoryError;

/// Result type for buffer pool operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer pool operations.
#[derive(Debug, Error)]
pub enum BufferError {
    /// Every frame is pinned; no page can be brought in.
    #[error("no evictable frames available, all pages are pinned")]
    PoolExhausted,

    /// The page is not resident in the buffer pool.
    #[error("page {page_id} is not resident in the buffer pool")]
    PageNotFound {
        /// The page that was requested.
        page_id: PageId,
    },

    /// The page is pinned and cannot be deleted.
    #[error("page {page_id} is pinned and cannot be deleted")]
    PagePinned {
        /// The page that was requested.
        page_id: PageId,
    },

    /// The requested page ID is the invalid sentinel.
    #[error("invalid page ID: {page_id:?}")]
    InvalidPageId {
        /// The offending page ID.
        page_id: PageId,
    },

    /// I/O error raised by the disk collaborator; fatal at this layer.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// Page directory error.
    #[error("page directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// What is wrong with the configuration.
        message: String,
    },
}

impl BufferError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a page-not-found error.
    pub fn page_not_found(page_id: PageId) -> Self {
        Self::PageNotFound { page_id }
    }

    /// Returns true if this is a transient error that can be retried once
    /// pins are released.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted)
    }
}
