//! Breed fact lookup
//!
//! Asks a text generator for ten short facts about a breed. The free-form
//! reply is parsed by an ordered chain of strategies, each with its own
//! prompt and parser; the first strategy that yields a non-empty list wins.
//!
//! Failure never escapes as an error: the caller gets an empty list plus a
//! message, so a classification response can carry "no facts" without
//! failing.

pub mod gemini;
pub mod parse;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use gemini::GeminiClient;
pub use parse::MAX_FACTS;

/// Output token budget for every strategy
pub const MAX_OUTPUT_TOKENS: u32 = 900;

/// Text generator transport errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// A single generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// External text generation service
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for one prompt; the reply is returned verbatim
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// One prompt + parser pair in the strategy chain
#[derive(Clone, Copy)]
pub struct FactStrategy {
    pub name: &'static str,
    pub temperature: f32,
    pub prompt: fn(&str) -> String,
    pub parse: fn(&str) -> Vec<String>,
}

/// Strategies in the order they are tried
pub const STRATEGIES: [FactStrategy; 3] = [
    FactStrategy {
        name: "json",
        temperature: 0.2,
        prompt: json_prompt,
        parse: parse::parse_json_facts,
    },
    FactStrategy {
        name: "bullets",
        temperature: 0.3,
        prompt: bullet_prompt,
        parse: parse::parse_bullet_facts,
    },
    FactStrategy {
        name: "plain",
        temperature: 0.35,
        prompt: plain_prompt,
        parse: parse::parse_plain_facts,
    },
];

fn json_prompt(breed: &str) -> String {
    format!(
        "Return ONLY valid JSON with this exact schema: \
         {{\"facts\": [\"fact1\", \"fact2\", \"...\", \"fact10\"]}}. \
         No prose, markdown, or backticks.\n\n\
         You are a camel-breed expert.\n\
         Provide exactly 10 distinct, single-sentence facts about '{}'.\n\
         Each fact at most 22 words. No numbering. No duplicates.\n\
         Output only JSON as instructed.",
        breed
    )
}

fn bullet_prompt(breed: &str) -> String {
    format!(
        "You are a camel-breed expert.\n\
         Write EXACTLY 10 distinct, single-sentence facts about '{}'.\n\
         Rules:\n\
         - Each fact MUST be on its own line starting with a single dash and a space: \"- fact...\"\n\
         - No numbering, no extra lines, no intro or outro text.\n\
         - Each fact at most 22 words.\n\
         Output ONLY those 10 bullet lines.",
        breed
    )
}

fn plain_prompt(breed: &str) -> String {
    format!(
        "List EXACTLY 10 distinct, single-sentence facts about '{}'. No numbering.\n\
         Separate each fact by a newline. No extra text before or after.\n\
         Each fact at most 22 words.",
        breed
    )
}

/// Result of a fact lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactsOutcome {
    pub breed: String,
    pub facts: Vec<String>,
    pub error: Option<String>,
}

impl FactsOutcome {
    fn failed(breed: &str, error: impl Into<String>) -> Self {
        Self {
            breed: breed.to_string(),
            facts: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Fact lookup service, shared across handlers
#[derive(Clone, Default)]
pub struct FactLookup {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl FactLookup {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Lookup that always reports the generator as not configured
    pub fn disabled() -> Self {
        Self { generator: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    /// Up to [`MAX_FACTS`] facts about `breed`, or an empty list and a reason
    ///
    /// One generator call per strategy; a transport failure ends the lookup
    /// without trying later strategies.
    pub async fn get_facts(&self, breed: &str) -> FactsOutcome {
        let Some(generator) = &self.generator else {
            return FactsOutcome::failed(breed, "fact generator not configured");
        };

        let mut last_error = None;
        for strategy in STRATEGIES.iter() {
            let request = GenerationRequest {
                prompt: (strategy.prompt)(breed),
                temperature: strategy.temperature,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            };

            let text = match generator.generate(&request).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(breed = breed, strategy = strategy.name, error = %e, "Fact generation failed");
                    return FactsOutcome::failed(breed, e.to_string());
                }
            };

            let facts = (strategy.parse)(&text);
            if !facts.is_empty() {
                info!(breed = breed, strategy = strategy.name, count = facts.len(), "Facts generated");
                return FactsOutcome {
                    breed: breed.to_string(),
                    facts,
                    error: None,
                };
            }

            debug!(breed = breed, strategy = strategy.name, "No usable facts in reply");
            last_error = Some(format!("no usable facts from '{}' strategy", strategy.name));
        }

        let error = last_error.unwrap_or_else(|| "no usable facts".to_string());
        warn!(breed = breed, error = %error, "Fact lookup degraded");
        FactsOutcome::failed(breed, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records every request
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, GenerationError>>>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, GenerationError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<GenerationRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            self.seen.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn json_reply(n: usize) -> String {
        let facts: Vec<String> = (1..=n).map(|i| format!("Camel fact {}", i)).collect();
        serde_json::json!({ "facts": facts }).to_string()
    }

    #[tokio::test]
    async fn test_json_strategy_wins() {
        let generator = Scripted::new(vec![Ok(json_reply(12))]);
        let lookup = FactLookup::new(generator.clone());

        let outcome = lookup.get_facts("Majaheem Camel").await;
        assert_eq!(outcome.facts.len(), MAX_FACTS);
        assert!(outcome.error.is_none());
        assert!(outcome.facts.iter().all(|f| !f.is_empty()));

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].temperature, 0.2);
        assert_eq!(calls[0].max_output_tokens, MAX_OUTPUT_TOKENS);
        assert!(calls[0].prompt.contains("'Majaheem Camel'"));
    }

    #[tokio::test]
    async fn test_falls_through_to_bullets() {
        let generator = Scripted::new(vec![
            Ok("Sorry, I cannot produce JSON".to_string()),
            Ok("- Bactrians have two humps\n- They tolerate cold".to_string()),
        ]);
        let lookup = FactLookup::new(generator.clone());

        let outcome = lookup.get_facts("Bactrian Camel").await;
        assert_eq!(
            outcome.facts,
            ["Bactrians have two humps.", "They tolerate cold."]
        );
        assert!(outcome.error.is_none());

        let temps: Vec<f32> = generator.calls().iter().map(|c| c.temperature).collect();
        assert_eq!(temps, [0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_all_strategies_unparsable() {
        let generator = Scripted::new(vec![Ok(String::new()), Ok("??".into()), Ok("".into())]);
        let lookup = FactLookup::new(generator.clone());

        let outcome = lookup.get_facts("Libyan Camel").await;
        assert!(outcome.facts.is_empty());
        assert!(outcome.error.unwrap().contains("plain"));
        assert_eq!(generator.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_transport_failure_stops_chain() {
        let generator = Scripted::new(vec![Err(GenerationError::Network("timed out".into()))]);
        let lookup = FactLookup::new(generator.clone());

        let outcome = lookup.get_facts("Libyan Camel").await;
        assert!(outcome.facts.is_empty());
        assert_eq!(outcome.error.as_deref(), Some("Network error: timed out"));
        assert_eq!(generator.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_lookup() {
        let outcome = FactLookup::disabled().get_facts("Majaheem Camel").await;
        assert_eq!(outcome.breed, "Majaheem Camel");
        assert!(outcome.facts.is_empty());
        assert_eq!(outcome.error.as_deref(), Some("fact generator not configured"));
    }
}
