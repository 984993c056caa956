use pandora_core::{AnalysisRequest, PandoraError, Result, Task};

const ANALYZE_FRAME: &str = "As a code review specialist, analyze the following code:\n\
    1. Algorithm complexity\n\
    2. Code readability\n\
    3. Suggested improvements";

const SUGGEST_FRAME: &str = "Suggest concrete improvements for the following code.\n\
    Write one suggestion per line, each starting with \"- \".";

const EXPLAIN_FRAME: &str = "Explain what the following code does, step by step, \
    in plain language for a developer reading it for the first time.";

const SECURITY_FRAME: &str = "Review the following code for security vulnerabilities \
    (SQL injection, XSS, command injection, unsafe deserialization, hard-coded secrets).\n\
    Report one finding per line using exactly this format:\n\
    type | severity (critical, high, medium, low) | line number | description\n\
    If there are no findings, answer \"No vulnerabilities found\".";

/// Build the code-analysis prompt for a snippet.
pub fn build(code: &str, language: Option<&str>) -> Result<String> {
    render(ANALYZE_FRAME, code, language, None)
}

/// Build the prompt for any task from a full request.
pub fn build_for_task(task: Task, request: &AnalysisRequest) -> Result<String> {
    let frame = match task {
        Task::Analyze => ANALYZE_FRAME,
        Task::Suggest => SUGGEST_FRAME,
        Task::Explain => EXPLAIN_FRAME,
        Task::Security => SECURITY_FRAME,
    };

    render(
        frame,
        &request.code,
        request.language.as_deref(),
        request.context.as_deref(),
    )
}

/// Reject requests whose code is empty or whitespace only.
pub fn validate_code(code: &str) -> Result<()> {
    if code.trim().is_empty() {
        return Err(PandoraError::InvalidRequest(
            "code must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn render(
    frame: &str,
    code: &str,
    language: Option<&str>,
    context: Option<&str>,
) -> Result<String> {
    validate_code(code)?;

    let tag = language.map(str::trim).unwrap_or_default();
    let mut prompt = String::with_capacity(frame.len() + code.len() + 64);
    prompt.push_str(frame);
    prompt.push_str("\n\n");

    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str("Context:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Code:\n```");
    prompt.push_str(tag);
    prompt.push('\n');
    prompt.push_str(code);
    if !code.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str("```\n");

    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIB: &str = "def fibonacci(n):\n    if n <= 1:\n        return n\n    return fibonacci(n-1) + fibonacci(n-2)";

    #[test]
    fn test_build_embeds_code_verbatim() {
        let prompt = build(FIB, None).unwrap();
        assert!(prompt.contains(FIB));
        assert!(prompt.contains("Algorithm complexity"));
        assert!(prompt.contains("Code readability"));
        assert!(prompt.contains("Suggested improvements"));
        assert!(prompt.contains("```\ndef fibonacci"));
    }

    #[test]
    fn test_language_becomes_fence_tag() {
        let prompt = build(FIB, Some("python")).unwrap();
        assert!(prompt.contains("```python\ndef fibonacci"));
        assert!(prompt.trim_end().ends_with("```"));
    }

    #[test]
    fn test_build_is_deterministic() {
        assert_eq!(build(FIB, Some("python")).unwrap(), build(FIB, Some("python")).unwrap());
    }

    #[test]
    fn test_empty_code_is_rejected() {
        assert!(matches!(build("", None), Err(PandoraError::InvalidRequest(_))));
        assert!(matches!(
            build("   \n\t", Some("rust")),
            Err(PandoraError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_context_precedes_code() {
        let request = AnalysisRequest::new("x = 1")
            .with_language("python")
            .with_context("Part of a billing module");
        let prompt = build_for_task(Task::Analyze, &request).unwrap();
        let context_at = prompt.find("Context:\nPart of a billing module").unwrap();
        let code_at = prompt.find("```python\nx = 1").unwrap();
        assert!(context_at < code_at);
    }

    #[test]
    fn test_blank_context_is_omitted() {
        let request = AnalysisRequest::new("x = 1").with_context("  ");
        let prompt = build_for_task(Task::Explain, &request).unwrap();
        assert!(!prompt.contains("Context:"));
    }

    #[test]
    fn test_task_frames_differ() {
        let request = AnalysisRequest::new("eval(input())");
        let security = build_for_task(Task::Security, &request).unwrap();
        assert!(security.contains("type | severity"));

        let suggest = build_for_task(Task::Suggest, &request).unwrap();
        assert!(suggest.contains("one suggestion per line"));

        let analyze = build_for_task(Task::Analyze, &request).unwrap();
        assert_eq!(analyze, build("eval(input())", None).unwrap());
    }
}
