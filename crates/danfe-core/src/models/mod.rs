//! Data models for pages, invoice records and configuration.

pub mod config;
pub mod invoice;
pub mod page;
