//! Keyword routing
//!
//! Picks a provider for a prompt by looking for math-related keywords.
//! Matching is plain substring containment on the lower-cased prompt, so
//! "calculationist" still matches "calculation". Anything without a keyword
//! (the empty prompt included) goes to the general-purpose provider.

use std::fmt;

use tracing::debug;

/// Keywords that send a prompt to Claude
pub const MATH_KEYWORDS: &[&str] = &[
    "math",
    "multiply",
    "addition",
    "subtraction",
    "divide",
    "solve",
    "equation",
    "calculation",
];

/// Which provider handles a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Math-flavoured prompts
    Anthropic,
    /// Everything else
    Google,
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::Google => write!(f, "google"),
        }
    }
}

/// Stateless keyword router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRouter {
    keywords: Vec<String>,
}

impl Default for KeywordRouter {
    fn default() -> Self {
        Self::new(MATH_KEYWORDS.iter().copied())
    }
}

impl KeywordRouter {
    /// Build a router from a keyword list. Keywords are lower-cased but keep
    /// their surrounding whitespace, so `" add "` only matches the padded
    /// form. Blank ones are dropped since they would match every prompt.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .filter(|k| !k.as_ref().trim().is_empty())
            .map(|k| k.as_ref().to_lowercase())
            .collect();
        Self { keywords }
    }

    /// First keyword found in the prompt, if any
    pub fn matched_keyword(&self, prompt: &str) -> Option<&str> {
        let lower = prompt.to_lowercase();
        self.keywords
            .iter()
            .find(|k| lower.contains(k.as_str()))
            .map(String::as_str)
    }

    pub fn select(&self, prompt: &str) -> RoutingDecision {
        match self.matched_keyword(prompt) {
            Some(keyword) => {
                debug!("Prompt matched keyword '{}', routing to anthropic", keyword);
                RoutingDecision::Anthropic
            }
            None => {
                debug!("No routing keyword matched, routing to google");
                RoutingDecision::Google
            }
        }
    }
}
