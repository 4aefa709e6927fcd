//! Tool system
//!
//! The tool set is fixed, so dispatch is a closed tagged enum with one
//! handler per variant - the compiler enforces that no tool kind goes
//! unhandled. Every tool honors the same contract: it never panics and
//! never raises, failures land in `ToolResult::error`.

use serde::{Deserialize, Serialize};
use tracing::debug;

mod code_exec;
mod search;
mod study_plan;

pub use code_exec::{CodeExecutor, extract_code};
pub use search::{WebSearch, key_points};
pub use study_plan::{BuiltPlan, StudyPlanBuilder};

/// The fixed set of tool capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    StudyPlan,
    CodeExec,
    Search,
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StudyPlan => write!(f, "study_plan"),
            Self::CodeExec => write!(f, "code_exec"),
            Self::Search => write!(f, "search"),
        }
    }
}

/// Result of a tool execution
///
/// Exactly one of `output`/`error` is meaningful when `success` is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub kind: ToolKind,
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(kind: ToolKind, output: impl Into<String>) -> Self {
        Self {
            kind,
            success: true,
            output: Some(output.into()),
            error: None,
        }
    }

    /// Create a failed result
    pub fn failure(kind: ToolKind, error: impl Into<String>) -> Self {
        Self {
            kind,
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// A tool invocation request
#[derive(Debug, Clone)]
pub enum ToolRequest {
    StudyPlan { goal: String },
    CodeExec { code: String },
    Search { query: String },
}

impl ToolRequest {
    /// The tool kind this request targets
    pub fn kind(&self) -> ToolKind {
        match self {
            Self::StudyPlan { .. } => ToolKind::StudyPlan,
            Self::CodeExec { .. } => ToolKind::CodeExec,
            Self::Search { .. } => ToolKind::Search,
        }
    }
}

/// Dispatches tool requests to their handlers
pub struct Dispatcher {
    study_plan: StudyPlanBuilder,
    code_exec: CodeExecutor,
    search: WebSearch,
}

impl Dispatcher {
    pub fn new(study_plan: StudyPlanBuilder, code_exec: CodeExecutor, search: WebSearch) -> Self {
        Self {
            study_plan,
            code_exec,
            search,
        }
    }

    /// Execute a tool request
    pub async fn dispatch(&self, request: ToolRequest) -> ToolResult {
        debug!(kind = %request.kind(), "dispatch: called");
        match request {
            ToolRequest::StudyPlan { goal } => self.study_plan.build(&goal).await.result,
            ToolRequest::CodeExec { code } => self.code_exec.execute(&code).await,
            ToolRequest::Search { query } => self.search.execute(&query).await,
        }
    }

    /// The study-plan builder, for callers that need the typed plan
    pub fn study_plan(&self) -> &StudyPlanBuilder {
        &self.study_plan
    }

    /// The code executor
    pub fn code_exec(&self) -> &CodeExecutor {
        &self.code_exec
    }

    /// The web search tool
    pub fn search(&self) -> &WebSearch {
        &self.search
    }
}
