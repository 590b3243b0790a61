//! Data models for the import pipeline.

pub mod catalog;
pub mod config;
pub mod invoice;
pub mod line;
