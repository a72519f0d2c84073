use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Languages the sandbox knows how to wrap and run.
///
/// Requests carry the language as a tag; parsing it with `FromStr` is the
/// single place where a tag is resolved. Tags match exactly and are lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Python, Language::JavaScript, Language::TypeScript];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "python" => Ok(Language::Python),
            "javascript" => Ok(Language::JavaScript),
            "typescript" => Ok(Language::TypeScript),
            _ => Err(format!("Unsupported language: {}", s)),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_hidden: bool,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            description: None,
            is_hidden: false,
        }
    }
}

pub const DEFAULT_TIME_LIMIT_MS: u64 = 5000;

fn default_time_limit() -> u64 {
    DEFAULT_TIME_LIMIT_MS
}

/// One submission: user code plus the ordered test cases to run it against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: String,
    pub test_cases: Vec<TestCase>,
    #[serde(default = "default_time_limit")]
    pub time_limit_ms: u64,
}

/// Result of a single test case. `index` is the position in the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    #[serde(rename = "test_case_index")]
    pub index: usize,
    pub passed: bool,
    pub expected_output: String,
    pub actual_output: String,
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(rename = "test_results")]
    pub outcomes: Vec<TestOutcome>,
    #[serde(rename = "execution_time_ms")]
    pub total_execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Request-level failure: nothing ran.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            outcomes: Vec::new(),
            total_execution_time_ms: 0,
            error: Some(error.into()),
        }
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_round_trip_tags() {
        for lang in Language::ALL {
            assert_eq!(lang.as_str().parse::<Language>(), Ok(lang));
        }
        assert_eq!(
            "cobol".parse::<Language>(),
            Err("Unsupported language: cobol".to_string())
        );
    }

    #[test]
    fn test_language_tags_match_exactly() {
        assert!(" python".parse::<Language>().is_err());
        assert!("Python".parse::<Language>().is_err());
        assert!("".parse::<Language>().is_err());
    }

    #[test]
    fn test_request_defaults_time_limit() {
        let req: ExecutionRequest = serde_json::from_str(
            r#"{"code": "x", "language": "python", "test_cases": [{"input": "1", "expected_output": "1"}]}"#,
        )
        .unwrap();
        assert_eq!(req.time_limit_ms, 5000);
        assert!(!req.test_cases[0].is_hidden);
        assert!(req.test_cases[0].description.is_none());
    }

    #[test]
    fn test_result_wire_names() {
        let result = ExecutionResult {
            success: true,
            outcomes: vec![TestOutcome {
                index: 0,
                passed: true,
                expected_output: "4".to_string(),
                actual_output: "4".to_string(),
                error_message: None,
                execution_time_ms: 12,
            }],
            total_execution_time_ms: 12,
            error: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["test_results"][0]["test_case_index"], 0);
        assert_eq!(json["execution_time_ms"], 12);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_rejected_result_is_empty() {
        let result = ExecutionResult::rejected("Unsupported language: cobol");
        assert!(!result.success);
        assert!(result.outcomes.is_empty());
        assert_eq!(result.total_execution_time_ms, 0);
        assert_eq!(result.passed_count(), 0);
    }
}
