//! Grounded-answer prompt assembly.
//!
//! Everything the generator is allowed to know arrives through one assembled
//! instruction: the fixed behavioral contract, the retrieved passages (each
//! attributed to its document), the bounded conversation history, and the
//! question. The contract is what enforces grounding: answers come only from
//! the supplied passages, with a fixed refusal sentence when they do not
//! contain the answer.

use crate::conversation::Turn;
use crate::retrieval::RetrievedChunk;

/// The exact sentence returned when the retrieved context cannot support an
/// answer. Content-level, not an error: callers receive it as a normal answer.
pub const REFUSAL_TEXT: &str =
    "Sorry, I could not find this information in the available documents.";

/// Fixed behavioral contract prepended to every instruction.
pub const GROUNDING_CONTRACT: &str = r#"You are a document assistant. You answer questions using only the documents provided below.

IDENTITY
- Style: professional, clear, and helpful.
- Never invent information. Never use outside knowledge.

RULES
1. Every answer must be based exclusively on the provided documents.
2. If the information is not in the documents, reply with exactly:
   "Sorry, I could not find this information in the available documents."
3. Answer in natural prose, in this order: where the information was found
   (document, section, page) if available; then the direct answer; then any
   useful additional context; then a short quotation when appropriate.
   Do not print these step names as headings.
4. If the question is only a greeting, greet back and offer help. If it is
   too vague to answer, politely ask for clarification.
5. Topical consistency: before answering, check that the passage you rely on
   is actually about the subject of the question. If a passage covers a
   different subject, even if the wording looks similar, do not use it as a
   source, and say that the documents do not cover that subject.
6. Links: only provide a link if it appears literally in the documents. Never
   guess or construct links. If several links apply, list one per line.
7. Never cite a document that you did not actually use."#;

const CONTEXT_HEADER: &str = "AVAILABLE DOCUMENTS:";
const HISTORY_HEADER: &str = "CONVERSATION HISTORY:";
const QUESTION_HEADER: &str = "QUESTION:";

/// A retrieved passage as it appears in the instruction, attributed to its
/// source document.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextPassage {
    /// Origin identifier of the source document.
    pub origin: String,
    /// Stable chunk identifier.
    pub chunk_id: String,
    /// Passage text.
    pub body: String,
}

/// The structured instruction handed to the generation capability.
///
/// Providers may flatten it with [`render`](Self::render) or map its parts
/// onto a chat-message layout; either way the content is identical.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    /// The fixed behavioral contract.
    pub system: String,
    /// Retrieved passages, ranked, each attributed to its document.
    pub passages: Vec<ContextPassage>,
    /// Bounded conversation history, oldest first.
    pub history: Vec<Turn>,
    /// The user's question.
    pub question: String,
}

impl AssembledPrompt {
    /// Number of distinct source documents represented in the passages.
    #[must_use]
    pub fn cited_source_count(&self) -> usize {
        let mut origins: Vec<&str> = self.passages.iter().map(|p| p.origin.as_str()).collect();
        origins.sort_unstable();
        origins.dedup();
        origins.len()
    }

    /// The passages serialized for the instruction, one block per passage.
    #[must_use]
    pub fn render_context(&self) -> String {
        if self.passages.is_empty() {
            return "(no documents matched the question)".to_owned();
        }
        let mut out = String::new();
        for passage in &self.passages {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&format!(
                "[document: {} | passage {}]\n{}",
                passage.origin,
                passage.chunk_id,
                passage.body.trim()
            ));
        }
        out
    }

    /// The history serialized for the instruction.
    #[must_use]
    pub fn render_history(&self) -> String {
        if self.history.is_empty() {
            return "(none)".to_owned();
        }
        let mut out = String::new();
        for turn in &self.history {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("User: {}\nAssistant: {}", turn.question, turn.answer));
        }
        out
    }

    /// Flatten the whole instruction into a single string.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{system}\n\n{CONTEXT_HEADER}\n{context}\n\n{HISTORY_HEADER}\n{history}\n\n{QUESTION_HEADER}\n{question}\n\nANSWER:",
            system = self.system,
            context = self.render_context(),
            history = self.render_history(),
            question = self.question,
        )
    }
}

/// Combine the question, the retrieved context, and the bounded history into
/// one instruction under the fixed contract.
#[must_use]
pub fn assemble(
    question: &str,
    retrieved: &[RetrievedChunk],
    history: Vec<Turn>,
) -> AssembledPrompt {
    let passages = retrieved
        .iter()
        .map(|chunk| ContextPassage {
            origin: chunk.origin.clone(),
            chunk_id: chunk.id.clone(),
            body: chunk.text.clone(),
        })
        .collect();
    AssembledPrompt {
        system: GROUNDING_CONTRACT.to_owned(),
        passages,
        history,
        question: question.to_owned(),
    }
}
