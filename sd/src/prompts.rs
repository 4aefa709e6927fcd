//! Embedded prompts
//!
//! Prompt templates are compiled into the binary. Placeholders use
//! `{{name}}` syntax and are filled by [`render`].

/// System prompt for conversational turns
pub const ASSISTANT_SYSTEM: &str = "You are an educational AI assistant specialized in helping students \
create personalized study plans and learning paths.\n\
\n\
Your role is to:\n\
- Understand student goals and learning preferences\n\
- Provide educational guidance and resources\n\
- Help break down complex topics into manageable steps\n\
- Encourage effective learning strategies\n\
\n\
Keep responses concise, practical, and focused on education.";

/// Intent classification prompt
///
/// The model must answer with exactly one label.
pub const CLASSIFY: &str = "Classify the intent of this student message into exactly one category.\n\
\n\
Message: \"{{message}}\"\n\
\n\
Categories:\n\
- plan: wants a study plan, learning schedule, or curriculum\n\
- explain: asks a question or wants a concept explained\n\
- code: wants code executed, evaluated, or calculated\n\
- search: wants information looked up on the web\n\
- chat: anything else\n\
\n\
Answer with only the category name, lowercase, nothing else.";

/// Constrained extraction prompt for drafting a study plan
pub const EXTRACT_PLAN: &str = "Extract a study plan from this learning request.\n\
\n\
Request: \"{{goal}}\"\n\
\n\
Respond with ONLY a JSON object, no prose, in this exact shape:\n\
{\n\
  \"subject\": \"<main topic>\",\n\
  \"duration_weeks\": <integer>,\n\
  \"hours_per_week\": <number>,\n\
  \"level\": \"beginner\" | \"intermediate\" | \"advanced\",\n\
  \"milestones\": [{ \"week\": <integer>, \"milestone\": \"<goal for that week>\" }]\n\
}\n\
\n\
Use 4 weeks, 5 hours and beginner level when the request does not say otherwise.\n\
Provide one milestone per distinct phase of learning, weeks in ascending order.";

/// Critique prompt for scoring a draft plan
pub const CRITIQUE: &str = "You are reviewing a study plan for quality. Judge coverage, pacing, and\n\
whether the milestones build on each other.\n\
\n\
Plan:\n\
{{plan}}\n\
\n\
Reply with a line `SCORE: <0-100>` followed by a short critique of the\n\
weakest parts of the plan.";

/// Improvement prompt producing a revised plan
pub const IMPROVE: &str = "Improve this study plan. Its current quality score is {{score}}/100.\n\
\n\
Plan:\n\
{{plan}}\n\
\n\
Critique:\n\
{{critique}}\n\
\n\
Respond with ONLY the revised plan as a JSON object in the same shape as the\n\
input (subject, duration_weeks, hours_per_week, level, milestones). Keep the\n\
subject and duration unless the critique says they are wrong.";

/// Render a prompt template with the given placeholder values
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in values {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_placeholders() {
        let result = render("Hello {{name}}, score {{score}}", &[("name", "world"), ("score", "42")]);
        assert_eq!(result, "Hello world, score 42");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let result = render("{{known}} and {{unknown}}", &[("known", "yes")]);
        assert_eq!(result, "yes and {{unknown}}");
    }

    #[test]
    fn test_classify_prompt_mentions_all_intents() {
        for label in ["plan", "explain", "code", "search", "chat"] {
            assert!(CLASSIFY.contains(label));
        }
    }
}
