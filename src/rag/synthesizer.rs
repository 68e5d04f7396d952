//! Grounded answer generation from ranked candidates

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::debug;
use tracing::info;

use super::prompts::build_grounded_prompt;
use super::prompts::NO_RELEVANT_INFORMATION;
use crate::errors::Result;
use crate::llm::ResilientModelClient;
use crate::models::AnswerResult;
use crate::models::Candidate;
use crate::models::Citation;

pub struct AnswerSynthesizer {
    client: Arc<ResilientModelClient>,
}

impl AnswerSynthesizer {
    pub fn new(client: Arc<ResilientModelClient>) -> Self {
        Self { client }
    }

    /// Answer `query` from `ranked`, citing sources by 1-based rank
    ///
    /// With nothing ranked the fixed fallback answer is returned and the
    /// model is not called.
    pub async fn synthesize(&self, query: &str, ranked: &[Candidate]) -> Result<AnswerResult> {
        if ranked.is_empty() {
            info!("No relevant context, returning fallback answer");
            return Ok(AnswerResult {
                answer: NO_RELEVANT_INFORMATION.to_string(),
                citations: Vec::new(),
            });
        }

        let citations: Vec<Citation> = ranked
            .iter()
            .enumerate()
            .map(|(position, candidate)| Citation::from_candidate(position, candidate))
            .collect();

        let context = build_context(&citations);
        let prompt = build_grounded_prompt(query, &context);
        debug!("Generating answer from {} sources", citations.len());

        let answer = self.client.generate(&prompt).await?;
        Ok(AnswerResult { answer, citations })
    }
}

fn build_context(citations: &[Citation]) -> String {
    let mut context = String::new();
    for citation in citations {
        // Writing to a String cannot fail
        let _ = writeln!(context, "[Source {}]: {}", citation.id, citation.content);
    }
    context
}
