//! Core data models for the bucket object store.
//!
//! These types describe what lives on disk next to each payload and what
//! travels over the wire. They serialize as snake_case JSON via `serde`.

pub mod object;
pub mod operation;
