//! Prompt construction for lay summaries.

use serde::{Deserialize, Serialize};

use crate::job::{DocumentMetadata, JobOptions, SummaryLength, SummaryStyle};

/// Instructions sent as the system message.
pub const SYSTEM_PROMPT: &str = "\
You write lay summaries of scientific papers for curious readers without a \
technical background, such as science journalists.

Structure every summary as Problem, Solution, Impact:
- Problem: the gap or challenge that motivated the work and why it matters.
- Solution: what the authors did, at a high level, without equations.
- Impact: what they found, who benefits, and at least one limitation.

Lengths:
- Default: three short paragraphs, at most 200 words.
- Extended: five short paragraphs (context, approach, evidence, findings with \
limitations, real-world implications), at most 350 words.

Rules:
- Avoid jargon. Define any unavoidable term once, in plain words.
- Neutral tone. No hype, no policy, legal or medical advice.
- Never invent results. If only part of the paper is available (for example \
just the abstract), say so and stay within what the text supports.

Output Markdown that starts with this header:
Title: <paper title>
Authors: <author list>
Venue/Year: <venue>, <year>
Link/DOI: <canonical link or DOI>

**Lay Summary - <Default|Extended>**
<paragraphs>";

/// One chat message in an OpenAI-compatible request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

fn style_instruction(style: SummaryStyle) -> Option<&'static str> {
    match style {
        SummaryStyle::Default => None,
        SummaryStyle::Detailed => Some(
            "Favour concrete detail: name the data, the methods and the main numbers where the text gives them.",
        ),
        SummaryStyle::Funny => Some(
            "Use a light, playful tone with a joke or two, without distorting any finding.",
        ),
    }
}

/// The user-facing request: length, style and target language.
pub fn instruction(options: &JobOptions) -> String {
    let mut out = format!(
        "Please produce a {} lay summary. If you only have partial text, say so briefly. \
         Output in Markdown exactly as specified.",
        options.length.label()
    );
    if let Some(style) = style_instruction(options.style) {
        out.push(' ');
        out.push_str(style);
    }
    if options.language != "en" {
        out.push_str(&format!(
            " Write the entire summary in the language with tag '{}'.",
            options.language
        ));
    }
    out
}

/// Metadata header and extracted text, as the model should see them.
pub fn source_block(text: &str, metadata: &DocumentMetadata) -> String {
    let title = metadata.title.as_deref().unwrap_or("(unknown title)");
    let link = metadata
        .doi
        .as_deref()
        .or(metadata.resolved_url.as_deref())
        .unwrap_or("");

    format!(
        "Source metadata (best-effort):\n\
         - Title: {}\n\
         - Link/DOI: {}\n\n\
         Extracted text (may be partial):\n---\n{}\n---",
        title, link, text
    )
}

/// Full message list: system prompt, instruction, then the source.
pub fn build_messages(
    text: &str,
    metadata: &DocumentMetadata,
    options: &JobOptions,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::new("system", SYSTEM_PROMPT),
        ChatMessage::new("user", instruction(options)),
        ChatMessage::new("user", source_block(text, metadata)),
    ]
}

/// System message for translating a finished summary.
pub const TRANSLATION_PROMPT: &str = "\
You translate Markdown lay summaries. Keep the Markdown structure, line \
breaks and header labels layout identical and translate only the prose and \
label text. Leave titles of papers, author names, DOIs and links unchanged. \
Output only the translated summary.";

/// Messages asking for `summary` in `language`.
pub fn build_translation_messages(summary: &str, language: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::new("system", TRANSLATION_PROMPT),
        ChatMessage::new(
            "user",
            format!(
                "Translate the following summary into the language with tag '{}'.\n---\n{}\n---",
                language, summary
            ),
        ),
    ]
}

/// Word budget for a summary length.
pub fn word_limit(length: SummaryLength) -> usize {
    match length {
        SummaryLength::Default => 200,
        SummaryLength::Extended => 350,
    }
}
