//! Resume field extraction via the LLM.

use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, strip_code_fence};

use super::model::ResumeFields;

/// Longest slice of resume text forwarded to the model.
const MAX_RESUME_CHARS: usize = 12_000;

/// Build the extraction prompt for a resume.
pub fn resume_extraction_prompt(resume_text: &str) -> String {
    let excerpt: String = resume_text.chars().take(MAX_RESUME_CHARS).collect();
    format!(
        r#"Extract the candidate's details from the resume below.

Return ONLY a JSON object with these keys:
- "name": full name, or null if not found
- "email": email address, or null if not found
- "skills": array of technologies and skills (at most 10, short tags)
- "position_interest": array with the kind of role the candidate fits (e.g. "backend", "data"), may be empty

Resume:
---
{excerpt}
---"#
    )
}

/// Parse the model's answer. Anything that is not the expected JSON object
/// yields `None`.
pub fn parse_resume_fields(response: &str) -> Option<ResumeFields> {
    match serde_json::from_str::<ResumeFields>(strip_code_fence(response)) {
        Ok(fields) => Some(fields),
        Err(e) => {
            tracing::warn!("Failed to parse resume extraction JSON: {e}");
            None
        }
    }
}

/// Ask `llm` for structured fields from `resume_text`.
///
/// Transport failures are returned; unparseable answers become `Ok(None)`.
pub async fn extract_resume_fields(
    llm: &dyn LlmProvider,
    resume_text: &str,
) -> Result<Option<ResumeFields>, LlmError> {
    let messages = vec![
        ChatMessage::system("You are a data extraction assistant. Output only valid JSON."),
        ChatMessage::user(resume_extraction_prompt(resume_text)),
    ];
    let request = CompletionRequest::new(messages)
        .with_max_tokens(1024)
        .with_temperature(0.0);

    let response = llm.complete(request).await?;
    Ok(parse_resume_fields(&response.content))
}
