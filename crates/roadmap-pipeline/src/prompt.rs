//! Prompt templates for every agent.
//!
//! User prompts are minijinja templates rendered against a serializable
//! context. System prompts are plain constants, except for the researcher,
//! whose brief depends on the session type.

use crate::language::Language;
use crate::models::SessionType;
use minijinja::Environment;
use serde::Serialize;

/// Renders a minijinja `template` against `context`.
///
/// ```rust
/// use roadmap_pipeline::prompt::render_prompt;
///
/// let ctx = serde_json::json!({"topic": "Rust"});
/// assert_eq!(render_prompt("Learn {{ topic }}", ctx).unwrap(), "Learn Rust");
/// ```
pub fn render_prompt<T: Serialize>(template: &str, context: T) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template("prompt", template)?;
    let tmpl = env.get_template("prompt")?;
    tmpl.render(context)
}

/// Prefixes `prompt` with the output-language instruction, if the language needs one.
pub fn localize(language: Language, prompt: String) -> String {
    match language.prompt_instruction() {
        Some(instruction) => format!("{instruction}\n\n{prompt}"),
        None => prompt,
    }
}

macro_rules! json_only {
    () => {
        "Respond with JSON that matches the provided schema. Do not wrap it in markdown."
    };
}

const JSON_ONLY: &str = json_only!();

pub const INTERVIEWER_SYSTEM: &str = concat!(
    "You are a learning consultant who knows the subject well. \
Before a personalised learning roadmap is designed, you ask the learner a few clarifying \
questions about their current level, available time, preferred learning style, concrete goals \
and constraints. Keep every question specific to the topic, offer two or three example answers, \
and keep the tone friendly. ",
    json_only!()
);

pub const ARCHITECT_SYSTEM: &str = concat!(
    "You design structured learning paths. \
Every session has exactly one type: concept (theory and mental models), tutorial (guided \
step-by-step skill building), practice (drills and exercises), project (building something \
real) or review (recap and self-assessment). Move from fundamentals to advanced material, \
interleave the session types instead of grouping them, and make the first session approachable \
for a newcomer to the topic. ",
    json_only!()
);

const RESEARCHER_BASE: &str = "You write the teaching material for one session of a learning path. \
Stay focused on the session objective, explain with concrete examples, end with practical \
takeaways and format the content as markdown suitable for self-study. Use markdown tables for \
tabular data, never code blocks. Material that belongs to a sibling session must not be \
repeated here.";

pub const VALIDATOR_SYSTEM: &str = concat!(
    "You review a complete learning path for quality problems. \
Look for overlap (material repeated across sessions), gap (a session relies on knowledge no \
earlier session teaches), ordering (sessions that would flow better in another order), \
coherence (material that drifts away from the learning goal) and depth (sessions far too \
shallow or too deep). Rate each issue high, medium or low, point to the affected sessions by \
their 0-based index and suggest a concrete fix. Report real problems only. ",
    json_only!()
);

pub const EDITOR_SYSTEM: &str = concat!(
    "You revise the content of one learning session so that the \
listed quality issues are resolved. Keep what is already good, remove material that overlaps \
with sibling sessions, and keep the markdown format. If resolving an issue needs new material \
you cannot write confidently from the existing content, set needs_research and describe \
precisely what is missing. ",
    json_only!()
);

pub const EDITOR_RESEARCH_SYSTEM: &str = concat!(
    "You write one short, self-contained markdown section \
that fills a specific gap in a learning session. Write only the new section. ",
    json_only!()
);

pub const VIDEO_FALLBACK_SYSTEM: &str = concat!(
    "You recommend existing YouTube videos for a learning \
session. Only list videos you are confident exist, with their full watch URL. An empty list is \
better than a guess. ",
    json_only!()
);

/// System prompt for the researcher, specialised by session type.
pub fn researcher_system_prompt(session_type: SessionType) -> String {
    let brief = match session_type {
        SessionType::Concept => {
            "This is a CONCEPT session. Open with why the idea matters, define every key term, \
             build intuition with analogies and mental models, connect the theory to real \
             applications and close with a summary of the key takeaways."
        }
        SessionType::Tutorial => {
            "This is a TUTORIAL session. Guide the learner through numbered steps, explain the \
             purpose of each step, show code or worked examples along the way, warn about common \
             mistakes, add checkpoints describing what the learner should see, and finish with \
             what they have accomplished."
        }
        SessionType::Practice => {
            "This is a PRACTICE session. Begin with warm-up exercises and raise the difficulty \
             gradually, mix exercise formats, give hints as blockquotes starting with \
             \"**Hint:**\", include worked solutions, and offer stretch challenges."
        }
        SessionType::Project => {
            "This is a PROJECT session. State the goal and deliverables, split the work into \
             milestones, provide starter code where useful, call out design decisions with their \
             options, suggest variations, and define when the project is done."
        }
        SessionType::Review => {
            "This is a REVIEW session. Recap the key ideas of the earlier sessions, add \
             self-assessment questions and reflection prompts, include a short quiz with \
             answers, and point to next steps."
        }
    };
    format!("{brief}\n\n{RESEARCHER_BASE}\n\n{JSON_ONLY}")
}

pub const INTERVIEW_TEMPLATE: &str = r#"The learner wants to learn:
"{{ topic }}"

Ask at most {{ max_questions }} clarifying questions that will help design their learning roadmap.
For each question give its purpose and two or three example answers, each with a short label."#;

pub const OUTLINE_TEMPLATE: &str = r#"Design a learning roadmap for this topic:
"{{ topic }}"
{% if answers %}
What the learner told us:
{% for qa in answers %}- Q: {{ qa.question }}
  A: {{ qa.answer }}
{% endfor %}{% endif %}
Return:
- a descriptive, engaging roadmap title of three to eight words,
- a learning path summary of two or three sentences,
- between {{ min_sessions }} and {{ max_sessions }} sessions in learning order, each with only a title and a session_type."#;

pub const SESSION_DETAILS_TEMPLATE: &str = r#"Roadmap topic: "{{ topic }}"

All sessions, in order (0-based index):
{% for title in sibling_titles %}{{ loop.index0 }}. {{ title }}
{% endfor %}
Describe session {{ index }}: "{{ title }}" (type: {{ session_type }}).

Return its learning objective in one sentence, an estimated duration in minutes, and the
0-based indices of the earlier sessions it depends on. Only sessions that come before
index {{ index }} can be prerequisites."#;

pub const RESEARCH_TEMPLATE: &str = r#"Write the content for this learning session.

Session {{ session.order }} of {{ total }}: {{ session.title }}
Type: {{ session.session_type }}
Objective: {{ session.objective }}
Duration: about {{ session.estimated_duration_minutes }} minutes
Roadmap topic: {{ topic }}

The full learning path, so you can avoid repeating what other sessions teach:
{% for sibling in siblings %}{{ sibling.order }}. {{ sibling.title }} ({{ sibling.session_type }}){% if sibling.order == session.order %}  <- this session{% endif %}
{% endfor %}
Return the markdown content, the key concepts covered, useful resources (URLs or book
references) and exercises."#;

pub const VALIDATION_TEMPLATE: &str = r#"Roadmap topic: {{ topic }}
Summary: {{ summary }}

Sessions (0-based index):
{% for s in sessions %}
### [{{ loop.index0 }}] {{ s.title }} ({{ s.session_type }})
Key concepts: {{ s.key_concepts | join(", ") }}
{{ s.content }}
{% endfor %}
Identify overlap, gap, ordering, coherence and depth issues. Reference sessions by index.
Give an overall score from 0 to 100 and a one-paragraph summary."#;

pub const EDIT_TEMPLATE: &str = r#"Revise session {{ session.order }}: "{{ session.title }}" ({{ session.session_type }}).

Issues to resolve:
{% for issue in issues %}- [{{ issue.severity }} {{ issue.issue_type }}] {{ issue.description }}
  Suggested fix: {{ issue.suggested_fix }}
{% endfor %}
Other sessions in the learning path:
{% for sibling in siblings %}{% if sibling.order != session.order %}{{ sibling.order }}. {{ sibling.title }} ({{ sibling.session_type }})
{% endif %}{% endfor %}
Current content:
{{ session.content }}"#;

pub const GAP_FILL_TEMPLATE: &str = r#"Session: "{{ title }}"
Roadmap topic: {{ topic }}

Write a focused section that covers exactly this:
{{ request }}"#;

pub const VIDEO_FALLBACK_TEMPLATE: &str = r#"Recommend up to {{ max_videos }} YouTube videos for this learning session.

Session: {{ title }}
Key concepts: {{ key_concepts | join(", ") }}
{% if language != "en" %}Prefer videos in language "{{ language }}" when good ones exist.
{% endif %}
Return each video's full watch URL, title and channel."#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_outline_with_answers() {
        let rendered = render_prompt(
            OUTLINE_TEMPLATE,
            json!({
                "topic": "Learn Python basics",
                "answers": [{"question": "Experience?", "answer": "None"}],
                "min_sessions": 5,
                "max_sessions": 15,
            }),
        )
        .unwrap();
        assert!(rendered.contains("Learn Python basics"));
        assert!(rendered.contains("A: None"));
        assert!(rendered.contains("between 5 and 15 sessions"));
    }

    #[test]
    fn test_render_session_details_indexes_siblings() {
        let rendered = render_prompt(
            SESSION_DETAILS_TEMPLATE,
            json!({
                "topic": "Rust",
                "sibling_titles": ["Intro", "Ownership"],
                "index": 1,
                "title": "Ownership",
                "session_type": "concept",
            }),
        )
        .unwrap();
        assert!(rendered.contains("0. Intro"));
        assert!(rendered.contains("1. Ownership"));
    }

    #[test]
    fn test_researcher_prompt_differs_by_type() {
        let concept = researcher_system_prompt(SessionType::Concept);
        let project = researcher_system_prompt(SessionType::Project);
        assert!(concept.contains("CONCEPT"));
        assert!(project.contains("PROJECT"));
        assert_ne!(concept, project);
    }

    #[test]
    fn test_localize() {
        assert_eq!(localize(Language::En, "Hi".into()), "Hi");
        let he = localize(Language::He, "Hi".into());
        assert!(he.starts_with("IMPORTANT"));
        assert!(he.ends_with("Hi"));
    }

    #[test]
    fn test_template_error_surfaces() {
        assert!(render_prompt("{% for %}", json!({})).is_err());
    }

    #[test]
    fn test_every_system_prompt_ends_with_json_instruction() {
        let research = researcher_system_prompt(SessionType::Practice);
        for system in [
            INTERVIEWER_SYSTEM,
            ARCHITECT_SYSTEM,
            VALIDATOR_SYSTEM,
            EDITOR_SYSTEM,
            EDITOR_RESEARCH_SYSTEM,
            VIDEO_FALLBACK_SYSTEM,
            research.as_str(),
        ] {
            assert!(system.ends_with(JSON_ONLY), "{system}");
            assert_eq!(system.matches(JSON_ONLY).count(), 1);
            assert!(!system.contains("  "));
        }
    }
}
