//! Core domain types and utilities for plex-forward-auth.
//!
//! This crate provides the foundational types and error handling shared by
//! the session, access, rules and provider crates.

pub mod email;
pub mod error;

pub use email::{Email, ParseEmailError};
pub use error::Result;
