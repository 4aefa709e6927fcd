//! Loop-refinement engine
//!
//! Iteratively critiques and rewrites a draft plan until it clears a quality
//! threshold or the iteration budget runs out. Implemented as an explicit
//! state machine over a bounded loop - never recursion - so termination is
//! guaranteed: at most `2 * max_iterations` LLM calls per invocation.
//!
//! Model scores are not monotonic, so the engine tracks every draft it has
//! scored and returns the best one seen, not necessarily the last.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::RefineConfig;
use crate::domain::StudyPlan;
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts;

use super::planner::parse_plan_json;

/// Result of a refinement run
#[derive(Debug, Clone)]
pub struct Refined {
    /// Best-scoring draft seen, with `quality_score` set to its score
    pub plan: StudyPlan,
    /// Scoring iterations performed
    pub iterations: u32,
    /// Whether the quality threshold was reached
    pub converged: bool,
}

/// States of the refinement machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefineState {
    Scoring,
    Improving,
    Converged,
    Exhausted,
}

/// Transient per-invocation state - never persisted, never shared
struct RefinementState {
    draft: StudyPlan,
    iteration: u32,
    score: f64,
    critique: String,
    history: Vec<f64>,
    best: (StudyPlan, f64),
}

impl RefinementState {
    fn new(draft: StudyPlan) -> Self {
        let best = (draft.clone(), -1.0);
        Self {
            draft,
            iteration: 0,
            score: 0.0,
            critique: String::new(),
            history: Vec::new(),
            best,
        }
    }

    fn record_score(&mut self, score: f64, critique: String) {
        self.score = score;
        self.critique = critique;
        self.history.push(score);
        if score > self.best.1 {
            self.best = (self.draft.clone(), score);
        }
    }

    fn into_result(self, converged: bool) -> Refined {
        let (mut plan, score) = self.best;
        plan.quality_score = score.max(0.0);
        Refined {
            plan,
            iterations: self.iteration,
            converged,
        }
    }
}

/// The refinement engine
pub struct RefineEngine {
    llm: Arc<dyn LlmClient>,
    config: RefineConfig,
}

impl RefineEngine {
    pub fn new(llm: Arc<dyn LlmClient>, config: RefineConfig) -> Self {
        Self { llm, config }
    }

    /// Refine a draft until convergence or budget exhaustion
    pub async fn refine(&self, draft: StudyPlan) -> Refined {
        let max_iterations = self.config.max_iterations.max(1);
        let threshold = self.config.quality_threshold;

        let mut state = RefinementState::new(draft);
        let mut machine = RefineState::Scoring;

        loop {
            match machine {
                RefineState::Scoring => {
                    state.iteration += 1;
                    let (score, critique) = self.score(&state.draft).await;
                    debug!(iteration = state.iteration, score, "refine: scored draft");
                    state.record_score(score, critique);

                    machine = if score >= threshold {
                        RefineState::Converged
                    } else if state.iteration >= max_iterations {
                        RefineState::Exhausted
                    } else {
                        RefineState::Improving
                    };
                }
                RefineState::Improving => {
                    if let Some(improved) = self.improve(&state.draft, state.score, &state.critique).await {
                        state.draft = improved;
                    }
                    machine = RefineState::Scoring;
                }
                RefineState::Converged => {
                    info!(
                        iterations = state.iteration,
                        score = state.score,
                        "refine: converged"
                    );
                    return state.into_result(true);
                }
                RefineState::Exhausted => {
                    info!(
                        iterations = state.iteration,
                        best_score = state.best.1,
                        history = ?state.history,
                        "refine: budget exhausted, returning best draft"
                    );
                    return state.into_result(false);
                }
            }
        }
    }

    /// Score the current draft with a critique prompt
    ///
    /// Model failure or an unparsable score yields 0 - conservative, forcing
    /// another iteration rather than falsely converging.
    async fn score(&self, draft: &StudyPlan) -> (f64, String) {
        let plan_json = serde_json::to_string_pretty(draft).unwrap_or_default();
        let prompt = prompts::render(prompts::CRITIQUE, &[("plan", plan_json.as_str())]);
        let request = CompletionRequest {
            system_prompt: String::new(),
            messages: vec![Message::user(prompt)],
            max_tokens: 512,
        };

        match self.llm.complete(request).await {
            Ok(response) => {
                let text = response.text().to_string();
                let score = parse_score(&text).unwrap_or(0.0);
                (score, text)
            }
            Err(e) => {
                debug!(error = %e, "score: model unavailable, scoring 0");
                (0.0, String::new())
            }
        }
    }

    /// Produce a wholesale replacement draft
    ///
    /// Returns None when the model fails or its output is unparsable; the
    /// caller keeps the current draft in that case.
    async fn improve(&self, draft: &StudyPlan, score: f64, critique: &str) -> Option<StudyPlan> {
        let plan_json = serde_json::to_string_pretty(draft).unwrap_or_default();
        let score_text = format!("{:.0}", score);
        let prompt = prompts::render(
            prompts::IMPROVE,
            &[
                ("plan", plan_json.as_str()),
                ("score", score_text.as_str()),
                ("critique", critique),
            ],
        );
        let request = CompletionRequest {
            system_prompt: String::new(),
            messages: vec![Message::user(prompt)],
            max_tokens: 1024,
        };

        match self.llm.complete(request).await {
            Ok(response) => {
                let improved = parse_plan_json(response.text());
                if improved.is_none() {
                    debug!("improve: unparsable revision, keeping current draft");
                }
                improved
            }
            Err(e) => {
                debug!(error = %e, "improve: model unavailable, keeping current draft");
                None
            }
        }
    }
}

/// Parse a quality score from critique text
///
/// Prefers an explicit `SCORE: <n>` marker; falls back to the first
/// standalone number within [0, 100].
fn parse_score(text: &str) -> Option<f64> {
    let marker = regex::Regex::new(r"(?i)score\s*[:=]\s*(\d+(?:\.\d+)?)").ok()?;
    if let Some(cap) = marker.captures(text) {
        let score: f64 = cap.get(1)?.as_str().parse().ok()?;
        return Some(score.clamp(0.0, 100.0));
    }

    let number = regex::Regex::new(r"\b(\d+(?:\.\d+)?)\b").ok()?;
    for cap in number.captures_iter(text) {
        if let Ok(score) = cap[1].parse::<f64>()
            && (0.0..=100.0).contains(&score)
        {
            return Some(score);
        }
    }

    None
}
