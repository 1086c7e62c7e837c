//! Core data model types: headers, the MIME part tree, and output records.

pub mod headers;
pub mod part;
pub mod record;
