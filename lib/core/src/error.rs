//! Shared result type.
//!
//! Crates keep their own error enums. Fallible calls that cross a crate
//! boundary, such as identity provider requests, return them wrapped in a
//! rootcause [`Report`] so callers can attach context on the way up.

use rootcause::Report;

/// Result carrying a rootcause report with context `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
