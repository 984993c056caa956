//! Cleans raw model output and substitutes a canned report when the output
//! is unusable.

use pandora_core::AnalysisResult;

/// Cleaned output shorter than this is treated as degenerate.
pub const MIN_ANALYSIS_LEN: usize = 50;

const DEFAULT_SUGGESTIONS: [&str; 3] = ["Add documentation", "Add unit tests", "Add error handling"];

/// Turn raw backend text into an analysis result.
pub fn normalize(raw_text: &str, code: &str) -> AnalysisResult {
    let cleaned = strip_non_ascii(raw_text);
    let cleaned = cleaned.trim();

    if cleaned.len() < MIN_ANALYSIS_LEN {
        return default_analysis(code);
    }

    AnalysisResult {
        text: cleaned.to_string(),
        suggestions: split_lines(cleaned),
        errors: Vec::new(),
        fallback: false,
    }
}

/// Default analysis with the backend failure that caused it recorded.
pub fn degrade(code: &str, reason: impl Into<String>) -> AnalysisResult {
    let mut result = default_analysis(code);
    result.errors.push(reason.into());
    result
}

/// Deterministic three-section report built from substring heuristics.
pub fn default_analysis(code: &str) -> AnalysisResult {
    let complexity = if is_recursive(code) {
        "Medium (recursive implementation)"
    } else {
        "Low (simple implementation)"
    };
    let readability = if is_class_based(code) {
        "Good, clear class structure"
    } else {
        "Concise and direct code"
    };

    let text = format!(
        "1. Complexity: {}\n2. Readability: {}\n3. Suggestions: Add documentation, unit tests and error handling",
        complexity, readability
    );

    AnalysisResult {
        text,
        suggestions: DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        errors: Vec::new(),
        fallback: true,
    }
}

/// Drop every character outside the ASCII range.
pub fn strip_non_ascii(text: &str) -> String {
    text.chars().filter(char::is_ascii).collect()
}

/// Name of the first `def` in the code, if any.
pub fn function_name(code: &str) -> Option<&str> {
    let after_def = code.split_once("def ")?.1;
    let name = after_def.split('(').next().unwrap_or_default().trim();
    (!name.is_empty()).then_some(name)
}

/// Crude recursion check: a `return` exists and the first function's name
/// shows up more than once in the snippet.
pub fn is_recursive(code: &str) -> bool {
    if !code.contains("return") {
        return false;
    }
    match function_name(code) {
        Some(name) => code.matches(name).count() > 1,
        None => false,
    }
}

pub fn is_class_based(code: &str) -> bool {
    code.contains("class")
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
