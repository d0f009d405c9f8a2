//! switchboard-core - keyword routing between two LLM providers
//!
//! This crate provides:
//! - Anthropic Claude and Google Gemini adapters behind one [`LlmProvider`] trait
//! - A keyword router that sends math prompts to Claude and everything else to Gemini
//! - A coordinator that routes a prompt, makes one call and renders failures as text

pub mod coordinator;
pub mod providers;
pub mod router;

// Re-export main types for convenience
pub use coordinator::{Coordinator, render_failure};
pub use providers::{AnthropicProvider, GoogleProvider, LlmProvider, ProviderError};
pub use router::{KeywordRouter, MATH_KEYWORDS, RoutingDecision};
