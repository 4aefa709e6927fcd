//! Turn orchestration
//!
//! The orchestrator owns one user turn end to end: load session context,
//! classify intent, run the matching pipeline branch, compose the reply,
//! and persist the turn. A turn that gets past input validation always
//! completes and always persists - downstream failures degrade into the
//! response text rather than aborting.

use std::sync::Arc;

use tracing::{debug, info, warn};

use sessionstore::Message as SessionMessage;

use crate::config::OrchestratorConfig;
use crate::domain::StudyPlan;
use crate::intent::{Intent, IntentClassifier};
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::metrics::Metrics;
use crate::prompts;
use crate::session::SessionService;
use crate::tools::{Dispatcher, ToolRequest, ToolResult, extract_code, key_points};

use super::error::TurnError;

/// Reply used when the model is unreachable during generation
const MODEL_DOWN_REPLY: &str =
    "I encountered an error talking to the language model. Please try again in a moment.";

/// Composite result of one turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: String,
    pub study_plan: Option<StudyPlan>,
    pub execution_result: Option<ToolResult>,
    pub intent: Intent,
}

impl TurnOutcome {
    fn text(intent: Intent, response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            study_plan: None,
            execution_result: None,
            intent,
        }
    }
}

/// The top-level turn controller
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    sessions: Arc<SessionService>,
    classifier: IntentClassifier,
    dispatcher: Dispatcher,
    metrics: Arc<Metrics>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        sessions: Arc<SessionService>,
        dispatcher: Dispatcher,
        metrics: Arc<Metrics>,
        config: OrchestratorConfig,
    ) -> Self {
        let classifier = IntentClassifier::new(llm.clone());
        Self {
            llm,
            sessions,
            classifier,
            dispatcher,
            metrics,
            config,
        }
    }

    /// Handle one user turn
    ///
    /// Turns on the same session serialize on the session's turn lock;
    /// turns on different sessions proceed independently. The user and
    /// assistant messages are appended together at the end - history never
    /// contains half a turn.
    pub async fn handle_turn(&self, session_id: &str, user_text: &str) -> Result<TurnOutcome, TurnError> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(TurnError::EmptyMessage);
        }
        if !self.sessions.exists(session_id) {
            return Err(TurnError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        }

        let lock = self.sessions.turn_lock(session_id).await;
        let _guard = lock.lock().await;

        self.metrics.record_turn();

        let history = self.sessions.history(session_id)?;
        let window = recent_window(&history, self.config.context_window);

        let intent = self.classifier.classify(user_text).await;
        info!(%session_id, %intent, "handle_turn: dispatching");

        let mut outcome = match intent {
            Intent::Plan => self.handle_plan(user_text, &window).await,
            Intent::Code => self.handle_code(user_text, &window).await,
            Intent::Search => self.handle_search(user_text).await,
            Intent::Explain => self.handle_explain(user_text, &window).await,
            Intent::Chat => self.handle_chat(user_text, &window).await,
        };
        outcome.intent = intent;

        let user_msg = SessionMessage::user(user_text);
        let assistant_msg = attach_artifacts(SessionMessage::assistant(&outcome.response), &outcome);
        self.sessions.append_turn(session_id, user_msg, assistant_msg)?;

        debug!(%session_id, "handle_turn: turn persisted");
        Ok(outcome)
    }

    /// Plan intent: draft, refine, and summarize a study plan
    async fn handle_plan(&self, user_text: &str, window: &[Message]) -> TurnOutcome {
        let built = self.dispatcher.study_plan().build(user_text).await;
        self.metrics.record_tool_call(built.result.success);
        self.metrics.record_refine_iterations(built.iterations);

        let rendered = built.result.output.clone().unwrap_or_default();
        let summary_prompt = format!(
            "I've created this study plan for the student:\n\n{}\n\nGive a short, friendly summary and one tip for sticking with it.",
            rendered
        );

        let response = match self.complete_with_context(window, &summary_prompt).await {
            Some(text) => text,
            None => format!(
                "I've put together a {}-week study plan for {}. The details are attached below.",
                built.plan.duration_weeks, built.plan.subject
            ),
        };

        TurnOutcome {
            response,
            study_plan: Some(built.plan),
            execution_result: Some(built.result),
            intent: Intent::Plan,
        }
    }

    /// Code intent: extract, execute, and explain
    async fn handle_code(&self, user_text: &str, window: &[Message]) -> TurnOutcome {
        let Some(code) = extract_code(user_text) else {
            return TurnOutcome::text(
                Intent::Code,
                "I couldn't find any code to run. Wrap it in a ``` code block and I'll execute it.",
            );
        };

        let result = self.dispatcher.dispatch(ToolRequest::CodeExec { code }).await;
        self.metrics.record_tool_call(result.success);

        let outcome_text = if result.success {
            format!("Output:\n{}", result.output.as_deref().unwrap_or("(no output)"))
        } else {
            format!("Execution failed:\n{}", result.error.as_deref().unwrap_or("unknown error"))
        };

        let explain_prompt = format!(
            "The student ran some code. {}\n\nExplain the result in one or two sentences.",
            outcome_text
        );

        let response = match self.complete_with_context(window, &explain_prompt).await {
            Some(text) => text,
            None => outcome_text,
        };

        TurnOutcome {
            response,
            study_plan: None,
            execution_result: Some(result),
            intent: Intent::Code,
        }
    }

    /// Search intent: the search summary is the reply
    async fn handle_search(&self, user_text: &str) -> TurnOutcome {
        let result = self
            .dispatcher
            .dispatch(ToolRequest::Search {
                query: user_text.to_string(),
            })
            .await;
        self.metrics.record_tool_call(result.success);

        let response = match (&result.output, &result.error) {
            (Some(output), _) => output.clone(),
            (None, Some(error)) => format!("I couldn't complete that search: {}", error),
            (None, None) => "I couldn't complete that search.".to_string(),
        };

        TurnOutcome {
            response,
            study_plan: None,
            execution_result: Some(result),
            intent: Intent::Search,
        }
    }

    /// Explain intent: answer with search results folded into context
    async fn handle_explain(&self, user_text: &str, window: &[Message]) -> TurnOutcome {
        let search = self
            .dispatcher
            .dispatch(ToolRequest::Search {
                query: user_text.to_string(),
            })
            .await;
        self.metrics.record_tool_call(search.success);

        let prompt = match &search.output {
            Some(results) => format!(
                "{}\n\nRelevant search results:\n{}\n\nAnswer using the results where they help.",
                user_text, results
            ),
            None => user_text.to_string(),
        };

        let response = match self.complete_with_context(window, &prompt).await {
            Some(text) => text,
            None => match search.output {
                // Model down but the search worked: answer from the results
                Some(results) => {
                    let points = key_points(&results, 5);
                    if points.is_empty() {
                        format!("Here's what I found:\n{}", results)
                    } else {
                        format!("Here's what I found:\n- {}", points.join("\n- "))
                    }
                }
                None => MODEL_DOWN_REPLY.to_string(),
            },
        };

        TurnOutcome::text(Intent::Explain, response)
    }

    /// Chat intent: direct completion over the session window
    async fn handle_chat(&self, user_text: &str, window: &[Message]) -> TurnOutcome {
        let response = match self.complete_with_context(window, user_text).await {
            Some(text) => text,
            None => MODEL_DOWN_REPLY.to_string(),
        };

        TurnOutcome::text(Intent::Chat, response)
    }

    /// One completion over the session window plus the current prompt
    ///
    /// Returns None when the model is unavailable or answers empty; callers
    /// supply their own fallback text.
    async fn complete_with_context(&self, window: &[Message], prompt: &str) -> Option<String> {
        let mut messages = window.to_vec();
        messages.push(Message::user(prompt));

        let request = CompletionRequest {
            system_prompt: prompts::ASSISTANT_SYSTEM.to_string(),
            messages,
            max_tokens: 1024,
        };

        match self.llm.complete(request).await {
            Ok(response) => {
                let text = response.text().trim().to_string();
                (!text.is_empty()).then_some(text)
            }
            Err(e) => {
                warn!(error = %e, "complete_with_context: model unavailable");
                self.metrics.record_llm_failure();
                None
            }
        }
    }
}

/// Convert the most recent stored messages into a model context window
fn recent_window(history: &[SessionMessage], limit: usize) -> Vec<Message> {
    let start = history.len().saturating_sub(limit);
    history[start..]
        .iter()
        .map(|m| match m.role {
            sessionstore::Role::User => Message::user(&m.content),
            sessionstore::Role::Assistant => Message::assistant(&m.content),
        })
        .collect()
}

/// Attach the turn's structured artifacts to the assistant message
fn attach_artifacts(message: SessionMessage, outcome: &TurnOutcome) -> SessionMessage {
    if let Some(plan) = &outcome.study_plan
        && let Ok(value) = serde_json::to_value(plan)
    {
        return message.with_attachment(serde_json::json!({ "study_plan": value }));
    }
    if let Some(result) = &outcome.execution_result
        && let Ok(value) = serde_json::to_value(result)
    {
        return message.with_attachment(serde_json::json!({ "tool_result": value }));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RefineConfig, SandboxConfig, SearchConfig};
    use crate::llm::client::mock::MockLlmClient;
    use crate::tools::{CodeExecutor, StudyPlanBuilder, WebSearch};
    use crate::agents::{PlanningAgent, RefineEngine};
    use tempfile::TempDir;

    fn build_orchestrator(temp: &TempDir, llm: Arc<MockLlmClient>) -> (Orchestrator, Arc<SessionService>) {
        let sessions = Arc::new(SessionService::open(temp.path()).unwrap());
        let llm_dyn: Arc<dyn LlmClient> = llm;

        let planner = Arc::new(PlanningAgent::new(llm_dyn.clone()));
        let refiner = Arc::new(RefineEngine::new(llm_dyn.clone(), RefineConfig::default()));
        let dispatcher = Dispatcher::new(
            StudyPlanBuilder::new(planner, refiner),
            CodeExecutor::new(SandboxConfig {
                interpreter: "sh".to_string(),
                ..Default::default()
            }),
            WebSearch::new(SearchConfig::default()),
        );

        let orchestrator = Orchestrator::new(
            llm_dyn,
            sessions.clone(),
            dispatcher,
            Arc::new(Metrics::default()),
            OrchestratorConfig::default(),
        );
        (orchestrator, sessions)
    }

    #[tokio::test]
    async fn test_unknown_session_is_rejected() {
        let temp = TempDir::new().unwrap();
        let llm = Arc::new(MockLlmClient::with_texts(vec![]));
        let (orchestrator, _sessions) = build_orchestrator(&temp, llm);

        let result = orchestrator.handle_turn("missing-session", "hello").await;
        assert!(matches!(result, Err(TurnError::SessionNotFound { .. })));
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let temp = TempDir::new().unwrap();
        let llm = Arc::new(MockLlmClient::with_texts(vec![]));
        let (orchestrator, sessions) = build_orchestrator(&temp, llm);
        let id = sessions.create().unwrap();

        let result = orchestrator.handle_turn(&id, "   \n  ").await;
        assert!(matches!(result, Err(TurnError::EmptyMessage)));

        // Nothing persisted
        assert!(sessions.history(&id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_turn_persists_user_then_assistant() {
        let temp = TempDir::new().unwrap();
        // One call for classification, one for the reply
        let llm = Arc::new(MockLlmClient::with_texts(vec!["chat", "Nice to meet you!"]));
        let (orchestrator, sessions) = build_orchestrator(&temp, llm);
        let id = sessions.create().unwrap();

        let outcome = orchestrator.handle_turn(&id, "hey there").await.unwrap();
        assert_eq!(outcome.intent, Intent::Chat);
        assert_eq!(outcome.response, "Nice to meet you!");

        let history = sessions.history(&id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, sessionstore::Role::User);
        assert_eq!(history[0].content, "hey there");
        assert_eq!(history[1].role, sessionstore::Role::Assistant);
        assert_eq!(history[1].content, "Nice to meet you!");
    }

    #[tokio::test]
    async fn test_model_outage_still_completes_and_persists_turn() {
        let temp = TempDir::new().unwrap();
        // Every call fails: classification degrades to chat, reply degrades
        // to the apologetic message, and the turn still persists.
        let llm = Arc::new(MockLlmClient::new(vec![
            Err("down".to_string()),
            Err("down".to_string()),
        ]));
        let (orchestrator, sessions) = build_orchestrator(&temp, llm);
        let id = sessions.create().unwrap();

        let outcome = orchestrator.handle_turn(&id, "tell me something nice").await.unwrap();
        assert_eq!(outcome.intent, Intent::Chat);
        assert!(outcome.response.contains("encountered an error"));

        let history = sessions.history(&id).unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_code_turn_executes_and_attaches_result() {
        let temp = TempDir::new().unwrap();
        // Fast-path classifies "```" as code without a model call; then one
        // call to explain the result.
        let llm = Arc::new(MockLlmClient::with_texts(vec!["That printed a greeting."]));
        let (orchestrator, sessions) = build_orchestrator(&temp, llm);
        let id = sessions.create().unwrap();

        let outcome = orchestrator
            .handle_turn(&id, "```\necho hi from sandbox\n```")
            .await
            .unwrap();

        assert_eq!(outcome.intent, Intent::Code);
        let result = outcome.execution_result.unwrap();
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("hi from sandbox"));

        // Attachment rides on the assistant message
        let history = sessions.history(&id).unwrap();
        let attachment = history[1].attachment.as_ref().unwrap();
        assert!(attachment.get("tool_result").is_some());
    }

    #[tokio::test]
    async fn test_code_turn_without_code() {
        let temp = TempDir::new().unwrap();
        let llm = Arc::new(MockLlmClient::with_texts(vec![]));
        let (orchestrator, sessions) = build_orchestrator(&temp, llm);
        let id = sessions.create().unwrap();

        let outcome = orchestrator.handle_turn(&id, "please execute my homework").await.unwrap();
        assert_eq!(outcome.intent, Intent::Code);
        assert!(outcome.response.contains("couldn't find any code"));
        assert!(outcome.execution_result.is_none());
    }

    #[tokio::test]
    async fn test_plan_turn_returns_study_plan() {
        let temp = TempDir::new().unwrap();
        let llm = Arc::new(MockLlmClient::with_texts(vec![
            // Planner extraction
            r#"{"subject": "Python", "duration_weeks": 4, "hours_per_week": 5,
                "level": "beginner",
                "milestones": [{"week": 1, "milestone": "Basics"},
                               {"week": 4, "milestone": "First project"}]}"#,
            // Refinement scoring: converges immediately
            "SCORE: 95",
            // Friendly summary
            "Here's your Python plan - four focused weeks!",
        ]));
        let (orchestrator, sessions) = build_orchestrator(&temp, llm);
        let id = sessions.create().unwrap();

        let outcome = orchestrator
            .handle_turn(&id, "Create a study plan for Python in 4 weeks")
            .await
            .unwrap();

        assert_eq!(outcome.intent, Intent::Plan);
        let plan = outcome.study_plan.unwrap();
        assert!(plan.subject.contains("Python"));
        assert_eq!(plan.duration_weeks, 4);
        assert!(plan.is_normalized());

        let history = sessions.history(&id).unwrap();
        let attachment = history[1].attachment.as_ref().unwrap();
        assert_eq!(attachment["study_plan"]["subject"], "Python");
    }

    #[test]
    fn test_recent_window_limits_and_converts() {
        let history: Vec<SessionMessage> = (0..15)
            .map(|i| {
                if i % 2 == 0 {
                    SessionMessage::user(format!("u{}", i))
                } else {
                    SessionMessage::assistant(format!("a{}", i))
                }
            })
            .collect();

        let window = recent_window(&history, 10);
        assert_eq!(window.len(), 10);
        assert_eq!(window[0].content, "a5");
        assert_eq!(window[9].content, "u14");
    }
}
