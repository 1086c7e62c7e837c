//! `threadscribe`: export the mail you exchanged with one correspondent
//! as a clean plain-text report.
//!
//! The heart of the crate is the [`extract`] pipeline, which turns a raw
//! MIME message into a [`model::record::MessageRecord`]: body selection,
//! HTML fallback, noise stripping and whitespace normalization, plus an
//! attachment count. Everything around it (mailbox sources, the report
//! writer, configuration) lives in the remaining modules.

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod model;
pub mod parser;
pub mod source;
