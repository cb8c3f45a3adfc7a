//! # keel-common
//!
//! Common types and constants for KeelDB.
//!
//! This crate provides the foundational definitions shared across all
//! KeelDB components:
//!
//! - **Types**: core identifiers such as [`PageId`]
//! - **Constants**: system-wide constants and limits
//!
//! ## Example
//!
//! ```rust
//! use keel_common::types::PageId;
//!
//! let page_id = PageId::new(42);
//! assert!(page_id.is_valid());
//! assert_eq!(page_id.next(), PageId::new(43));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use types::PageId;
