//! Classification of a terminal error into a broad category with remediation
//! hints. Informational only: recovery does not branch on it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Syntax,
    Dependency,
    Runtime,
    Network,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    pub category: ErrorCategory,
    pub suggestions: Vec<String>,
}

/// A category, the substrings that select it, and what to tell the user.
struct ErrorRule {
    category: ErrorCategory,
    markers: &'static [&'static str],
    suggestions: &'static [&'static str],
}

// Checked in order; first match wins.
const RULES: &[ErrorRule] = &[
    ErrorRule {
        category: ErrorCategory::Syntax,
        markers: &["syntaxerror", "unexpected token", "parsing error"],
        suggestions: &[
            "The code has a syntax error",
            "Check that brackets and quotes are balanced",
            "Rolling back to the previous checkpoint is recommended",
        ],
    },
    ErrorRule {
        category: ErrorCategory::Dependency,
        markers: &["module not found", "cannot find module", "enoent"],
        suggestions: &[
            "A required module or file is missing",
            "Check import paths and file names",
            "Make sure referenced files were created",
        ],
    },
    ErrorRule {
        category: ErrorCategory::Runtime,
        markers: &["typeerror", "referenceerror", "undefined"],
        suggestions: &[
            "A type error occurred at runtime",
            "Check that variables are defined and initialised",
            "Searching the web for a fix",
        ],
    },
    ErrorRule {
        category: ErrorCategory::Network,
        markers: &["econnrefused", "fetch", "network"],
        suggestions: &[
            "There is a network connectivity problem",
            "Check that the server is running",
            "Try again in a moment",
        ],
    },
];

const UNKNOWN_SUGGESTIONS: &[&str] = &[
    "An unrecognised error occurred",
    "Searching the web for a fix",
    "Check the error message",
];

/// Case-insensitive substring classification of `error`.
pub fn analyze_error(error: &str) -> ErrorAnalysis {
    let lower = error.to_lowercase();
    let (category, suggestions) = RULES
        .iter()
        .find(|rule| rule.markers.iter().any(|m| lower.contains(m)))
        .map_or((ErrorCategory::Unknown, UNKNOWN_SUGGESTIONS), |rule| {
            (rule.category, rule.suggestions)
        });

    ErrorAnalysis {
        category,
        suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let cases = [
            ("SyntaxError: Unexpected token '}'", ErrorCategory::Syntax),
            ("Error: Cannot find module './utils'", ErrorCategory::Dependency),
            ("ENOENT: no such file", ErrorCategory::Dependency),
            ("TypeError: x is not a function", ErrorCategory::Runtime),
            ("connect ECONNREFUSED 127.0.0.1:3000", ErrorCategory::Network),
            ("segfault", ErrorCategory::Unknown),
        ];
        for (error, expected) in cases {
            assert_eq!(analyze_error(error).category, expected, "{}", error);
        }
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // "undefined" is a runtime marker, but the syntax marker comes first
        let analysis = analyze_error("SyntaxError: undefined label");
        assert_eq!(analysis.category, ErrorCategory::Syntax);
        assert_eq!(analysis.suggestions.len(), 3);
    }
}
