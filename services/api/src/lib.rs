//! services/api/src/lib.rs
//!
//! The record-management service surrounding the essay core: config,
//! the PostgreSQL store adapter, and the REST surface.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
