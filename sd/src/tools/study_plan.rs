//! Study-plan builder tool
//!
//! Thin adapter over the planning agent and the refinement engine, wrapping
//! the result in the uniform tool contract.

use std::sync::Arc;

use crate::agents::{PlanningAgent, RefineEngine};
use crate::domain::StudyPlan;

use super::{ToolKind, ToolResult};

/// A built plan: the typed artifact plus its tool-contract wrapper
#[derive(Debug, Clone)]
pub struct BuiltPlan {
    pub plan: StudyPlan,
    pub result: ToolResult,
    /// Refinement iterations spent on the plan
    pub iterations: u32,
    /// Whether refinement reached the quality threshold
    pub converged: bool,
}

/// Builds and refines study plans behind the tool contract
pub struct StudyPlanBuilder {
    planner: Arc<PlanningAgent>,
    refiner: Arc<RefineEngine>,
}

impl StudyPlanBuilder {
    pub fn new(planner: Arc<PlanningAgent>, refiner: Arc<RefineEngine>) -> Self {
        Self { planner, refiner }
    }

    /// Draft a plan for the goal and refine it
    ///
    /// Never fails: the planner always produces a draft and the refiner
    /// always terminates with its best effort.
    pub async fn build(&self, goal: &str) -> BuiltPlan {
        let draft = self.planner.draft_plan(goal).await;
        let refined = self.refiner.refine(draft).await;

        let output = render_plan(&refined.plan);
        BuiltPlan {
            result: ToolResult::success(ToolKind::StudyPlan, output),
            plan: refined.plan,
            iterations: refined.iterations,
            converged: refined.converged,
        }
    }
}

/// Render a plan as readable text for the tool output
fn render_plan(plan: &StudyPlan) -> String {
    let mut out = format!(
        "Study plan: {} ({} level)\n{} weeks, {} hours/week ({} hours total)\n",
        plan.subject,
        plan.level,
        plan.duration_weeks,
        plan.hours_per_week,
        plan.total_hours(),
    );
    for m in &plan.milestones {
        out.push_str(&format!("  week {}: {}\n", m.week, m.milestone));
    }
    out.push_str(&format!("Quality score: {:.0}/100", plan.quality_score));
    out
}
