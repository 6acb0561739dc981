//! # quill-providers
//!
//! Generation backends for Quill.

pub mod anthropic;

pub use anthropic::AnthropicGenerator;
