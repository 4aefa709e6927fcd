//! Planning agent - turns a learning goal into a draft study plan
//!
//! Extraction is model-first with a heuristic fallback: a constrained JSON
//! prompt against the LLM, then keyword/number scraping of the raw goal
//! text for anything the model omitted. Drafting never fails; the worst
//! case is a minimal single-milestone plan for the refinement loop to work
//! with.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::domain::{Level, Milestone, StudyPlan};
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts;

/// Default plan duration when neither model nor text supplies one
pub const DEFAULT_DURATION_WEEKS: u32 = 4;

/// Default weekly study hours
pub const DEFAULT_HOURS_PER_WEEK: f64 = 5.0;

/// Planning agent
pub struct PlanningAgent {
    llm: Arc<dyn LlmClient>,
}

impl PlanningAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Build a first draft plan for a learning goal
    ///
    /// The returned plan is normalized and unscored (`quality_score == 0`).
    pub async fn draft_plan(&self, goal: &str) -> StudyPlan {
        let hints = TextHints::parse(goal);

        let mut plan = match self.extract_with_model(goal).await {
            Some(extraction) => {
                debug!(subject = ?extraction.subject, "draft_plan: model extraction succeeded");
                extraction.into_plan(&hints)
            }
            None => {
                debug!("draft_plan: falling back to heuristic plan");
                hints.into_plan()
            }
        };

        if plan.milestones.is_empty() {
            plan.milestones = level_milestones(&plan.subject, plan.level, plan.duration_weeks);
        }

        plan.quality_score = 0.0;
        plan.normalize();
        plan
    }

    async fn extract_with_model(&self, goal: &str) -> Option<PlanExtraction> {
        let prompt = prompts::render(prompts::EXTRACT_PLAN, &[("goal", goal)]);
        let request = CompletionRequest {
            system_prompt: String::new(),
            messages: vec![Message::user(prompt)],
            max_tokens: 1024,
        };

        let response = match self.llm.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "extract_with_model: model unavailable");
                return None;
            }
        };

        let json = extract_json_object(response.text())?;
        match serde_json::from_str::<PlanExtraction>(&json) {
            Ok(extraction) => Some(extraction),
            Err(e) => {
                debug!(error = %e, "extract_with_model: unparsable extraction");
                None
            }
        }
    }
}

/// Pull the first top-level JSON object out of model output
///
/// Models wrap JSON in prose or code fences often enough that a plain
/// `from_str` on the whole response is too strict.
pub(crate) fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(text[start..=end].to_string())
}

/// Parse a study plan from model output, normalizing on success
pub(crate) fn parse_plan_json(text: &str) -> Option<StudyPlan> {
    let json = extract_json_object(text)?;
    let extraction: PlanExtraction = serde_json::from_str(&json).ok()?;
    let mut plan = extraction.into_plan(&TextHints::default());
    if plan.subject.trim().is_empty() {
        return None;
    }
    plan.normalize();
    Some(plan)
}

/// Relaxed deserialization target for model output
#[derive(Debug, Default, Deserialize)]
struct PlanExtraction {
    subject: Option<String>,
    duration_weeks: Option<u32>,
    hours_per_week: Option<f64>,
    level: Option<String>,
    #[serde(default)]
    milestones: Vec<MilestoneExtraction>,
}

#[derive(Debug, Deserialize)]
struct MilestoneExtraction {
    week: Option<u32>,
    milestone: String,
}

impl PlanExtraction {
    /// Merge model output with text hints, defaults last
    fn into_plan(self, hints: &TextHints) -> StudyPlan {
        let subject = self
            .subject
            .filter(|s| !s.trim().is_empty())
            .or_else(|| hints.subject.clone())
            .unwrap_or_else(|| "general studies".to_string());

        let level = self
            .level
            .as_deref()
            .map(Level::parse)
            .or(hints.level)
            .unwrap_or_default();

        let milestones = self
            .milestones
            .into_iter()
            .enumerate()
            .map(|(i, m)| Milestone {
                week: m.week.unwrap_or(i as u32 + 1),
                milestone: m.milestone,
            })
            .collect();

        StudyPlan {
            subject,
            duration_weeks: self
                .duration_weeks
                .or(hints.duration_weeks)
                .unwrap_or(DEFAULT_DURATION_WEEKS),
            hours_per_week: self
                .hours_per_week
                .or(hints.hours_per_week)
                .unwrap_or(DEFAULT_HOURS_PER_WEEK),
            level,
            milestones,
            quality_score: 0.0,
        }
    }
}

/// Hints scraped from the raw goal text
#[derive(Debug, Default)]
struct TextHints {
    subject: Option<String>,
    duration_weeks: Option<u32>,
    hours_per_week: Option<f64>,
    level: Option<Level>,
}

impl TextHints {
    fn parse(goal: &str) -> Self {
        let lower = goal.to_lowercase();

        let duration_weeks = scrape_number(&lower, "week")
            .or_else(|| if lower.contains("month") { Some(8) } else { None });
        let hours_per_week = scrape_number(&lower, "hour").map(|h| h as f64);

        let level = if lower.contains("advanced")
            || lower.contains("expert")
            || lower.contains("intermediate")
            || lower.contains("beginner")
        {
            Some(Level::parse(&lower))
        } else {
            None
        };

        Self {
            subject: guess_subject(goal),
            duration_weeks,
            hours_per_week,
            level,
        }
    }

    /// Build a plan from hints alone (model unavailable or unparsable)
    fn into_plan(self) -> StudyPlan {
        let subject = self.subject.unwrap_or_else(|| "general studies".to_string());
        let duration_weeks = self.duration_weeks.unwrap_or(DEFAULT_DURATION_WEEKS);
        let level = self.level.unwrap_or_default();

        StudyPlan {
            milestones: level_milestones(&subject, level, duration_weeks),
            subject,
            duration_weeks,
            hours_per_week: self.hours_per_week.unwrap_or(DEFAULT_HOURS_PER_WEEK),
            level,
            quality_score: 0.0,
        }
    }
}

/// Find a number immediately preceding a unit word, e.g. "4 weeks"
fn scrape_number(lower: &str, unit: &str) -> Option<u32> {
    let re = regex::Regex::new(&format!(r"(\d+)\s*{}", unit)).ok()?;
    re.captures(lower)?.get(1)?.as_str().parse().ok()
}

/// Guess the subject from the goal text
///
/// Tries "for X" / "learn X" phrasing first, then broad topic keywords.
fn guess_subject(goal: &str) -> Option<String> {
    const STOPWORDS: &[&str] = &["a", "an", "the", "me", "my", "in", "it", "to", "some", "plan", "plans"];

    let re = regex::Regex::new(r"(?i)\b(?:for|learn|study|about)\s+([A-Za-z][A-Za-z0-9+#.-]*)").ok()?;
    for cap in re.captures_iter(goal) {
        if let Some(word) = cap.get(1).map(|m| m.as_str())
            && !STOPWORDS.contains(&word.to_lowercase().as_str())
        {
            return Some(word.to_string());
        }
    }

    let lower = goal.to_lowercase();
    const TOPICS: &[(&str, &[&str])] = &[
        ("mathematics", &["math", "calculus", "algebra", "geometry"]),
        ("programming", &["program", "code", "python", "javascript", "rust"]),
        ("science", &["science", "physics", "chemistry", "biology"]),
        ("language", &["language", "spanish", "french", "english"]),
        ("history", &["history", "historical"]),
    ];
    for (topic, keywords) in TOPICS {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return Some(topic.to_string());
        }
    }

    None
}

/// Level-specific milestone templates, weeks spaced across the duration
fn level_milestones(subject: &str, level: Level, duration_weeks: u32) -> Vec<Milestone> {
    let names: [String; 4] = match level {
        Level::Beginner => [
            format!("Understand basic {} concepts", subject),
            format!("Complete introductory {} exercises", subject),
            format!("Apply {} to simple problems", subject),
            format!("Master fundamental {} skills", subject),
        ],
        Level::Intermediate => [
            format!("Review and strengthen {} fundamentals", subject),
            format!("Tackle intermediate {} challenges", subject),
            format!("Build {} projects", subject),
            format!("Achieve proficiency in {}", subject),
        ],
        Level::Advanced => [
            format!("Explore advanced {} topics", subject),
            format!("Research {} specialization areas", subject),
            format!("Contribute to the {} community", subject),
            format!("Master expert-level {} concepts", subject),
        ],
    };

    let weeks_per_milestone = (duration_weeks / 4).max(1);

    names
        .into_iter()
        .enumerate()
        .filter_map(|(i, milestone)| {
            let week = (i as u32 + 1) * weeks_per_milestone;
            (week <= duration_weeks).then_some(Milestone { week, milestone })
        })
        .collect()
}
