//! Provider adapters
//!
//! Anthropic Claude and Google Gemini, each behind the [`LlmProvider`] trait so
//! the [`Coordinator`](crate::coordinator::Coordinator) can call either one the same way.

pub mod anthropic;
pub mod google;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use types::{LlmProvider, ProviderError};
