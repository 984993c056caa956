use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Map a free-form severity label (English, Portuguese or a 1-4 rank)
    /// onto the four-level scale. Unknown labels are treated as medium.
    ///
    /// Accented Portuguese labels are also matched in the form left behind
    /// once normalization has dropped non-ASCII characters ("crtico").
    pub fn assess(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "critical" | "grave" | "crítico" | "critico" | "crtico" | "1" => Severity::Critical,
            "high" | "alta" | "alto" | "2" => Severity::High,
            "medium" | "moderate" | "moderada" | "moderado" | "média" | "media" | "mdia"
            | "médio" | "medio" | "mdio" | "3" => Severity::Medium,
            "low" | "baixa" | "baixo" | "4" => Severity::Low,
            _ => Severity::Medium,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub line: Option<u32>,
    pub description: String,
}

/// Parse `type | severity | line | description` lines out of a model report.
///
/// Lines with fewer than two `|`-separated fields are prose and are skipped.
pub fn parse_vulnerabilities(text: &str) -> Vec<Vulnerability> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Vulnerability> {
    let line = strip_list_marker(line.trim());
    let fields: Vec<&str> = line.split('|').map(str::trim).collect();
    if fields.len() < 2 || fields[0].is_empty() {
        return None;
    }

    let kind = fields[0].to_string();
    let severity = Severity::assess(fields[1]);
    let line_no = fields.get(2).and_then(|f| parse_line_number(f));

    // A non-numeric third field is part of the description
    let description_start = if line_no.is_some() || (fields.len() == 3 && fields[2].is_empty()) {
        3
    } else {
        2
    };
    let description = fields
        .get(description_start..)
        .map(|rest| rest.join(" | "))
        .unwrap_or_default();

    Some(Vulnerability {
        kind,
        severity,
        line: line_no,
        description,
    })
}

fn parse_line_number(field: &str) -> Option<u32> {
    let digits = field
        .trim_start_matches(|c: char| c.is_ascii_alphabetic() || c.is_whitespace() || c == ':');
    digits.parse().ok()
}

fn strip_list_marker(line: &str) -> &str {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return rest.trim_start();
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return rest.trim_start();
        }
    }
    line
}
