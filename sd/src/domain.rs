//! Domain types for study plans

use serde::{Deserialize, Serialize};

/// Skill level a plan is pitched at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    /// Parse a level from free text, defaulting to Beginner
    pub fn parse(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("advanced") || lower.contains("expert") || lower.contains("master") {
            Self::Advanced
        } else if lower.contains("intermediate") || lower.contains("improve") {
            Self::Intermediate
        } else {
            Self::Beginner
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Beginner => write!(f, "beginner"),
            Self::Intermediate => write!(f, "intermediate"),
            Self::Advanced => write!(f, "advanced"),
        }
    }
}

/// A single milestone within a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    /// Week this milestone falls in, within [1, duration_weeks]
    pub week: u32,
    pub milestone: String,
}

/// A structured study plan
///
/// Invariant: milestone weeks are non-decreasing and within
/// [1, duration_weeks]. Producers call [`StudyPlan::normalize`] before the
/// plan leaves their hands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyPlan {
    pub subject: String,
    pub duration_weeks: u32,
    pub hours_per_week: f64,
    pub level: Level,
    pub milestones: Vec<Milestone>,
    /// Quality judgment in [0, 100]; 0 until scored by the refinement loop
    #[serde(default)]
    pub quality_score: f64,
}

impl StudyPlan {
    /// Total study hours across the plan
    pub fn total_hours(&self) -> f64 {
        self.duration_weeks as f64 * self.hours_per_week
    }

    /// Enforce the plan invariants in place
    ///
    /// Out-of-range milestone weeks are clamped to the nearest valid bound,
    /// milestones are stable-sorted by week, and numeric fields are pulled
    /// back into their valid ranges.
    pub fn normalize(&mut self) {
        if self.duration_weeks == 0 {
            self.duration_weeks = 1;
        }
        if !self.hours_per_week.is_finite() || self.hours_per_week <= 0.0 {
            self.hours_per_week = 5.0;
        }
        self.quality_score = self.quality_score.clamp(0.0, 100.0);

        for m in &mut self.milestones {
            m.week = m.week.clamp(1, self.duration_weeks);
        }
        self.milestones.sort_by_key(|m| m.week);
    }

    /// Check the milestone-week invariant
    pub fn is_normalized(&self) -> bool {
        self.milestones
            .windows(2)
            .all(|pair| pair[0].week <= pair[1].week)
            && self
                .milestones
                .iter()
                .all(|m| m.week >= 1 && m.week <= self.duration_weeks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with_milestones(duration_weeks: u32, weeks: &[u32]) -> StudyPlan {
        StudyPlan {
            subject: "Rust".to_string(),
            duration_weeks,
            hours_per_week: 5.0,
            level: Level::Beginner,
            milestones: weeks
                .iter()
                .map(|&week| Milestone {
                    week,
                    milestone: format!("week {} goal", week),
                })
                .collect(),
            quality_score: 0.0,
        }
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(Level::parse("I want to master advanced calculus"), Level::Advanced);
        assert_eq!(Level::parse("improve my intermediate Spanish"), Level::Intermediate);
        assert_eq!(Level::parse("just starting out"), Level::Beginner);
    }

    #[test]
    fn test_normalize_clamps_out_of_range_weeks() {
        let mut plan = plan_with_milestones(4, &[0, 2, 9]);
        plan.normalize();

        assert_eq!(plan.milestones[0].week, 1);
        assert_eq!(plan.milestones[1].week, 2);
        assert_eq!(plan.milestones[2].week, 4);
        assert!(plan.is_normalized());
    }

    #[test]
    fn test_normalize_sorts_milestones() {
        let mut plan = plan_with_milestones(8, &[6, 2, 4]);
        plan.normalize();

        let weeks: Vec<u32> = plan.milestones.iter().map(|m| m.week).collect();
        assert_eq!(weeks, vec![2, 4, 6]);
    }

    #[test]
    fn test_normalize_repairs_degenerate_fields() {
        let mut plan = plan_with_milestones(0, &[1]);
        plan.hours_per_week = -3.0;
        plan.quality_score = 250.0;
        plan.normalize();

        assert_eq!(plan.duration_weeks, 1);
        assert_eq!(plan.hours_per_week, 5.0);
        assert_eq!(plan.quality_score, 100.0);
    }

    #[test]
    fn test_total_hours() {
        let plan = plan_with_milestones(4, &[]);
        assert_eq!(plan.total_hours(), 20.0);
    }

    #[test]
    fn test_serde_round_trip() {
        let plan = plan_with_milestones(4, &[1, 3]);
        let json = serde_json::to_string(&plan).unwrap();
        let back: StudyPlan = serde_json::from_str(&json).unwrap();

        assert_eq!(back.subject, "Rust");
        assert_eq!(back.milestones.len(), 2);
    }
}
