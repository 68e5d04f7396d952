//! Prompts for grounded answers

/// Answer returned when retrieval finds nothing to ground on
pub const NO_RELEVANT_INFORMATION: &str =
    "I couldn't find any relevant information in your documents to answer your question.";

/// Build the grounded answer prompt
///
/// `context` is the numbered source block, one `[Source n]: text` line per passage.
pub fn build_grounded_prompt(question: &str, context: &str) -> String {
    format!(
        r"You are a helpful assistant answering questions about the user's own documents.

Context:
{context}

Question: {question}

Instructions:
1. Answer based ONLY on the context above
2. If the context does not contain the answer, say that you don't know
3. Cite your sources using their numbers, e.g. [1], [2]
4. Be concise and professional

Answer:"
    )
}

/// Source numbers cited in an answer as `[n]`, in first-appearance order
///
/// Markers are not checked against the citation list; callers decide what to
/// do with numbers that have no matching source.
pub fn cited_ids(answer: &str) -> Vec<usize> {
    let mut ids = Vec::new();
    let mut rest = answer;

    while let Some(open) = rest.find('[') {
        rest = &rest[open + 1..];
        let Some(close) = rest.find(']') else {
            break;
        };
        if let Ok(id) = rest[..close].trim().parse::<usize>() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        rest = &rest[close + 1..];
    }

    ids
}
