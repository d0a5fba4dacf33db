//! System prompt sent with every generation request

/// Base system prompt establishing the assistant's role
const BASE_PROMPT: &str = r"You are an expert AI assistant and senior software developer with deep knowledge of many programming languages, frameworks, and best practices.

Be concise in your responses. Prefer complete, working code over descriptions of code. When a response is long, keep writing until it is complete; do not summarize or elide parts of files.

Use valid markdown for all responses. Do not use HTML tags except inside code blocks.";

/// The system prompt for a chat turn.
///
/// Continuation segments reuse the same prompt so the model keeps its
/// register across a split response.
pub fn system_prompt() -> String {
    BASE_PROMPT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_is_stable() {
        assert_eq!(system_prompt(), system_prompt());
        assert!(system_prompt().starts_with("You are an expert AI assistant"));
    }
}
