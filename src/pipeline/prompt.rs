//! Augmented prompt assembly.

/// One retrieved context snippet, request-scoped and discarded after prompt
/// construction.
#[derive(Clone, Debug)]
pub struct ContextSnippet {
    pub id: String,
    pub text: String,
    pub score: f32,
}

const PREAMBLE: &str = "You are a helpful assistant. Answer the user's question. \
When context snippets are provided, ground the answer in them and prefer them \
over general knowledge.";

/// Assemble the generation prompt: preamble, tagged context snippets in
/// retrieval order, then the literal user question.
pub fn build_prompt(question: &str, context: &[ContextSnippet]) -> String {
    let mut prompt = String::from(PREAMBLE);
    prompt.push_str("\n\n");

    if context.is_empty() {
        prompt.push_str("No context snippets were retrieved for this question.\n");
    } else {
        prompt.push_str("Context:\n");
        for snippet in context {
            prompt.push_str(&format!("[source: {}] {}\n", snippet.id, snippet.text));
        }
    }

    prompt.push_str("\nQuestion: ");
    prompt.push_str(question);
    prompt
}

/// Prompt for the optional refinement pass over a raw answer.
pub fn build_refine_prompt(question: &str, raw_answer: &str) -> String {
    format!(
        "Rewrite the draft answer below so it is clear and direct. Preserve all \
facts; do not add new claims.\n\nQuestion: {question}\n\nDraft answer: {raw_answer}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_question_and_sources() {
        let context = vec![
            ContextSnippet {
                id: "doc-1".to_string(),
                text: "cats are mammals".to_string(),
                score: 0.9,
            },
            ContextSnippet {
                id: "doc-2".to_string(),
                text: "the sky is blue".to_string(),
                score: 0.2,
            },
        ];
        let prompt = build_prompt("tell me about cats", &context);
        assert!(prompt.contains("[source: doc-1] cats are mammals"));
        assert!(prompt.contains("[source: doc-2] the sky is blue"));
        assert!(prompt.ends_with("Question: tell me about cats"));
        // Retrieval order is preserved.
        let first = prompt.find("doc-1").unwrap();
        let second = prompt.find("doc-2").unwrap();
        assert!(first < second);
    }

    #[test]
    fn empty_context_is_stated_not_omitted() {
        let prompt = build_prompt("tell me about cats", &[]);
        assert!(prompt.contains("No context snippets"));
        assert!(prompt.ends_with("Question: tell me about cats"));
    }
}
