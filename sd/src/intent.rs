//! Intent classification
//!
//! Routes each user message to one of a fixed set of intents. A keyword
//! fast-path avoids an LLM round-trip for unambiguous requests; everything
//! else goes through a classification prompt. Model failures degrade to
//! `Chat` rather than failing the turn.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts;

/// The classified purpose of a user turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Build a study plan
    Plan,
    /// Answer a question
    Explain,
    /// Execute user-supplied code
    Code,
    /// Look something up on the web
    Search,
    /// Plain conversation
    Chat,
}

impl Intent {
    /// Parse a classification label, ignoring case and surrounding noise
    pub fn parse_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "plan" => Some(Self::Plan),
            "explain" => Some(Self::Explain),
            "code" => Some(Self::Code),
            "search" => Some(Self::Search),
            "chat" => Some(Self::Chat),
            _ => None,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Plan => "plan",
            Self::Explain => "explain",
            Self::Code => "code",
            Self::Search => "search",
            Self::Chat => "chat",
        };
        write!(f, "{}", label)
    }
}

/// Classifies user messages into intents
pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Classify a user message
    ///
    /// Never fails: keyword match first, then the model, then `Chat`.
    pub async fn classify(&self, user_text: &str) -> Intent {
        if let Some(intent) = fast_match(user_text) {
            debug!(%intent, "classify: keyword fast-path");
            return intent;
        }

        match self.llm_classify(user_text).await {
            Some(intent) => intent,
            None => {
                debug!("classify: degrading to chat");
                Intent::Chat
            }
        }
    }

    async fn llm_classify(&self, user_text: &str) -> Option<Intent> {
        let prompt = prompts::render(prompts::CLASSIFY, &[("message", user_text)]);
        let request = CompletionRequest {
            system_prompt: String::new(),
            messages: vec![Message::user(prompt)],
            max_tokens: 10,
        };

        match self.llm.complete(request).await {
            Ok(response) => {
                let label = response.text().to_string();
                let intent = Intent::parse_label(&label);
                debug!(%label, ?intent, "llm_classify: model answered");
                intent
            }
            Err(e) => {
                debug!(error = %e, "llm_classify: model unavailable");
                None
            }
        }
    }
}

/// Keyword fast-path for unambiguous requests
///
/// Precedence mirrors the dispatch order: plan requests win over code, code
/// over search, search over questions.
fn fast_match(user_text: &str) -> Option<Intent> {
    let lower = user_text.to_lowercase();

    const PLAN_KEYWORDS: &[&str] = &[
        "study plan",
        "learning plan",
        "help me learn",
        "want to study",
        "create plan",
        "curriculum",
    ];
    const CODE_KEYWORDS: &[&str] = &["run code", "execute", "calculate", "compute", "```"];
    const SEARCH_KEYWORDS: &[&str] = &["search", "find information", "look up", "research"];
    const EXPLAIN_KEYWORDS: &[&str] = &["what is", "how do", "explain", "tell me about"];

    if PLAN_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Some(Intent::Plan);
    }
    if CODE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Some(Intent::Code);
    }
    if SEARCH_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Some(Intent::Search);
    }
    if EXPLAIN_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Some(Intent::Explain);
    }

    None
}
