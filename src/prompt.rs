use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::grouper::StudentGroup;

/// Built-in prompt for the batch summarizer. `{input}` receives the
/// JSON-encoded array of students in the chunk.
pub const DEFAULT_PROMPT: &str = r#"You are analyzing reflection conversations from students in a hands-on building program.

For each student in the input array, read their combined conversation and produce one JSON object with exactly these keys:
- "name": copied verbatim from the input
- "phone": copied verbatim from the input
- "record_ids": copied verbatim from the input, unchanged
- "reflection_depth": "Surface", "Developing" or "Deep"
- "challenge_favorite": the challenge they most enjoyed, or ""
- "challenge_disliked": the challenge they least enjoyed, or ""
- "highlight_quotes": up to two objects of \{quote, tags} with short topical tags
- "patterns": an object keyed by each of these pattern names: "Engagement & Enjoyment", "Creativity & Pride in Building", "Challenges Faced & Problem-Solving", "Teamwork Dynamics", "Mentor Support & Relationship", "Suggestions for Improvement", "Recommendation Sentiment", "Overall Sentiment". Each value is \{category, term, quote}: a one-or-two-word category label, a representative term from the conversation, and a short direct quote.

Answer with a bare JSON array, one object per input student, in input order. Do not wrap the answer in markdown.

Input:
{input}"#;

#[derive(Serialize)]
struct PromptContext {
    input: String,
}

/// A chunk member as embedded in the prompt.
#[derive(Serialize)]
pub struct PromptStudent<'a> {
    pub phone: &'a str,
    pub name: &'a str,
    pub conversation: &'a str,
    pub record_ids: &'a [String],
}

impl<'a> PromptStudent<'a> {
    pub fn from_group(group: &'a StudentGroup) -> Self {
        Self {
            phone: &group.phone,
            name: &group.name,
            conversation: &group.combined_conversation,
            record_ids: &group.record_ids,
        }
    }
}

/// Renders the summarization prompt for one chunk of groups.
pub fn render_prompt(template: &str, chunk: &[StudentGroup]) -> anyhow::Result<String> {
    let students: Vec<PromptStudent> = chunk.iter().map(PromptStudent::from_group).collect();
    let ctx = PromptContext {
        input: serde_json::to_string_pretty(&students)?,
    };
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("prompt", template)?;
    Ok(tt.render("prompt", &ctx)?)
}
