//! Agents - planning and refinement

pub mod planner;
pub mod refine;

pub use planner::PlanningAgent;
pub use refine::{Refined, RefineEngine};
