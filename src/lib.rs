//! A minimal single-node object store served over HTTP.
//!
//! Clients PUT byte blobs into named buckets and later GET, HEAD, DELETE or
//! LIST them by a server-assigned id. Access to each operation kind can be
//! gated behind bearer tokens.

pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
