//! # quill-core
//!
//! Core types, traits, configuration, prompt assembly, and error handling for
//! the Quill article pipeline.

pub mod config;
pub mod error;
pub mod model;
pub mod prompts;
pub mod slug;
pub mod traits;

pub use config::shellexpand;
