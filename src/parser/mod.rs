//! Share-reference parsing.
//!
//! Turns a share link (or a bare identifier) into a [`FileId`]. Pure string
//! matching, no I/O.
//!
//! # Example
//!
//! ```
//! use drivefetch_core::parser::extract_file_id;
//!
//! let id = extract_file_id("https://drive.google.com/open?id=abc-DEF_123").unwrap();
//! assert_eq!(id.as_str(), "abc-DEF_123");
//! ```

mod error;
mod file_id;

pub use error::ParseError;
pub use file_id::{FileId, MIN_BARE_ID_LEN, extract_file_id};
