//! SBS Log Input
//!
//! Streams captured server logs line by line and recovers the queries they
//! recorded. Lines that do not hold a query are reported as [`NotAQuery`],
//! which callers treat as a filter, not a failure.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod extract;
pub mod lexer;
pub mod source;

pub use extract::{extract, NotAQuery, Reason, MAX_DEPTH, QUERY_MARKER};
pub use lexer::{Lexer, Token};
pub use source::{LogSource, SourceError};
