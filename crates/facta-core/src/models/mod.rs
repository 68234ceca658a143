//! Data models for documents, results and configuration.

pub mod config;
pub mod document;
pub mod result;
pub mod vat;
