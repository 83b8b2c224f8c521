//! Prompt text for the rewrite collaborator.

/// Instructions sent ahead of every chunk.
pub const TYPESETTER_INSTRUCTIONS: &str = "You are a professional academic typesetter.

## Format Instructions:
- Use `#`, `##`, `###` for heading levels: topics, subtopics, and sub-subtopics.
- Keep numbered sections such as `1 INTRODUCTION` or `1.1 Motivation` as they are.
- Keep paragraph breaks.
- Wrap code in triple backticks.
- Use Markdown tables where the content is tabular.
- Output only Markdown, nothing else.";

/// The full prompt for one chunk of slide text.
pub fn typesetter_prompt(chunk: &str) -> String {
    format!(
        "{}\n\n## Input Text:\n\"\"\"\n{}\n\"\"\"\n",
        TYPESETTER_INSTRUCTIONS, chunk
    )
}
