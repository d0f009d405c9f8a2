//! Routes a prompt and calls the chosen provider

use tracing::{info, warn};

use crate::providers::{LlmProvider, ProviderError};
use crate::router::{KeywordRouter, RoutingDecision};

/// Composes the router with one adapter per routing decision
pub struct Coordinator {
    router: KeywordRouter,
    anthropic: Box<dyn LlmProvider>,
    google: Box<dyn LlmProvider>,
}

impl Coordinator {
    pub fn new(
        router: KeywordRouter,
        anthropic: Box<dyn LlmProvider>,
        google: Box<dyn LlmProvider>,
    ) -> Self {
        Self {
            router,
            anthropic,
            google,
        }
    }

    pub fn route(&self, prompt: &str) -> RoutingDecision {
        self.router.select(prompt)
    }

    pub fn provider_for(&self, decision: RoutingDecision) -> &dyn LlmProvider {
        match decision {
            RoutingDecision::Anthropic => self.anthropic.as_ref(),
            RoutingDecision::Google => self.google.as_ref(),
        }
    }

    /// Route the prompt and make exactly one provider call, keeping the
    /// failure typed.
    pub async fn dispatch(&self, prompt: &str) -> (RoutingDecision, Result<String, ProviderError>) {
        let decision = self.route(prompt);
        let provider = self.provider_for(decision);

        info!("Using {} for this request...", provider.display_name());

        let result = provider.generate(prompt).await;
        if let Err(e) = &result {
            warn!(
                "Provider {} ({}) failed: {}",
                provider.provider_name(),
                provider.model(),
                e
            );
        }
        (decision, result)
    }

    /// Route the prompt and return the provider's text, or a rendered error
    /// message in its place.
    pub async fn get_response(&self, prompt: &str) -> String {
        let (decision, result) = self.dispatch(prompt).await;
        match result {
            Ok(text) => text,
            Err(e) => render_failure(self.provider_for(decision).display_name(), &e),
        }
    }
}

/// Render a failed call as the text handed back to the user
pub fn render_failure(provider: &str, err: &ProviderError) -> String {
    format!("Error calling {}: {}", provider, err)
}
