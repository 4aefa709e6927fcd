//! studyd - conversational study-assistant agent service
//!
//! Turns a free-text user request into a structured study plan, an
//! explanatory answer, a sandboxed code-execution result, or a web-search
//! result, while maintaining durable multi-turn session history.
//!
//! # Core Concepts
//!
//! - **One turn, one unit of work**: the orchestrator owns a turn end to
//!   end; turns on the same session serialize, other sessions never wait
//! - **Degrade, don't abort**: model and tool failures become response
//!   text; a turn that passes input validation always persists
//! - **Bounded refinement**: plan polishing is an explicit state machine
//!   with a hard iteration budget, never open-ended recursion
//! - **Closed tool set**: dispatch is an exhaustive match over a fixed
//!   enum, so a missing handler is a compile error
//!
//! # Modules
//!
//! - [`llm`] - LLM client trait and provider implementations
//! - [`intent`] - intent classification with graceful degradation
//! - [`agents`] - planning agent and loop-refinement engine
//! - [`tools`] - code sandbox, web search, study-plan builder
//! - [`session`] - per-session serialized access to durable history
//! - [`orchestrator`] - the top-level turn controller
//! - [`server`] - HTTP API
//! - [`config`] - configuration types and loading

pub mod agents;
pub mod cli;
pub mod config;
pub mod domain;
pub mod intent;
pub mod llm;
pub mod metrics;
pub mod orchestrator;
pub mod prompts;
pub mod server;
pub mod session;
pub mod tools;

// Re-export commonly used types
pub use agents::{PlanningAgent, Refined, RefineEngine};
pub use config::{Config, LlmConfig};
pub use domain::{Level, Milestone, StudyPlan};
pub use intent::{Intent, IntentClassifier};
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient};
pub use metrics::{Metrics, MetricsSnapshot};
pub use orchestrator::{Orchestrator, TurnError, TurnOutcome};
pub use server::AppState;
pub use session::SessionService;
pub use tools::{CodeExecutor, Dispatcher, StudyPlanBuilder, ToolKind, ToolRequest, ToolResult, WebSearch};
