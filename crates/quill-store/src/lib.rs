//! # quill-store
//!
//! Persistence for Quill: the SQLite work queue and run history, and the
//! article output directory.

pub mod files;
pub mod store;

pub use files::ArticleWriter;
pub use store::{ImportSummary, Store};
