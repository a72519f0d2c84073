// Mentor hint orchestrator
//
// Two LLM steps per request: a JSON analysis of the submitted code, then a
// hint written at the requested level. Each step degrades independently:
// a failed analysis falls back to a neutral one, a failed hint to fixed text.

use crate::llm::{extract_json_block, LlmGateway};
use aura_common::types::TestCase;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

pub const MAX_HINT_LEVEL: u8 = 3;
pub const FALLBACK_HINT: &str = "Think about breaking your component into smaller, focused pieces.";

const SNIPPET_LANGUAGE_TAGS: &[&str] = &[
    "tsx",
    "typescript",
    "javascript",
    "jsx",
    "python",
    "java",
    "cpp",
];

#[derive(Debug, Clone, Deserialize)]
pub struct ProblemContext {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HintRequest {
    pub problem: ProblemContext,
    pub code: String,
    pub hint_level: u8,
    #[serde(default)]
    pub previous_attempts: u32,
    /// Cooldown key; requests without one are not rate gated
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HintResponse {
    pub hint: String,
    pub code_snippet: Option<String>,
    pub point_penalty: u32,
    pub explanation: String,
}

/// Clamp to the highest level and escalate once for users who keep asking
pub fn adjusted_level(hint_level: u8, previous_attempts: u32) -> u8 {
    let level = hint_level.min(MAX_HINT_LEVEL);
    if previous_attempts > 5 && level < MAX_HINT_LEVEL {
        level + 1
    } else {
        level
    }
}

pub fn point_penalty(level: u8, previous_attempts: u32) -> u32 {
    let base = match level {
        0 => 2,
        1 => 5,
        2 => 10,
        3 => 20,
        _ => 0,
    };
    if previous_attempts > 3 {
        base * 3 / 2
    } else {
        base
    }
}

/// First fenced block of the hint, minus a leading language tag line
pub fn extract_snippet(hint: &str) -> Option<String> {
    let parts: Vec<&str> = hint.split("```").collect();
    if parts.len() < 3 {
        return None;
    }

    let block = parts[1].trim();
    let snippet = match block.split_once('\n') {
        Some((first, rest)) if SNIPPET_LANGUAGE_TAGS.contains(&first.trim()) => rest,
        None if SNIPPET_LANGUAGE_TAGS.contains(&block) => "",
        _ => block,
    };
    Some(snippet.to_string())
}

fn default_analysis() -> Value {
    json!({
        "correctness": "partially_complete",
        "issues": ["Could not analyze code"],
        "suggestions": [],
        "quality_score": 30,
        "react_patterns": "Could not assess"
    })
}

fn requirements_list(requirements: &[String]) -> String {
    if requirements.is_empty() {
        return "No specific requirements".to_string();
    }
    requirements
        .iter()
        .map(|r| format!("- {}", r))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Only visible cases are shown to the model
fn examples_list(test_cases: &[TestCase]) -> String {
    let examples: Vec<String> = test_cases
        .iter()
        .filter(|tc| !tc.is_hidden)
        .map(|tc| format!("- input: {} -> expected: {}", tc.input, tc.expected_output))
        .collect();
    if examples.is_empty() {
        "None".to_string()
    } else {
        examples.join("\n")
    }
}

fn analysis_prompt(problem: &ProblemContext, code: &str) -> String {
    format!(
        "Analyze this React component code for the challenge.\n\n\
         Challenge: Title: {}\n{}\n\n\
         Code:\n```tsx\n{}\n```\n\n\
         Requirements to meet:\n{}\n\n\
         Example cases:\n{}\n\n\
         Return ONLY valid JSON with: correctness (\"complete\" | \"partially_complete\" | \"incomplete\"), \
         issues (list), suggestions (list), quality_score (0-100), react_patterns (short assessment).",
        problem.title,
        problem.description,
        code,
        requirements_list(&problem.requirements),
        examples_list(&problem.test_cases),
    )
}

fn hint_prompt(problem: &ProblemContext, analysis: &Value, level: u8) -> String {
    let instruction = match level {
        0 => "Give a gentle nudge: one encouraging sentence. Do NOT give away the solution.",
        1 => "Give a guidance-level hint in 2-3 sentences about component structure, hooks or state. Don't show code yet.",
        2 => "Explain the relevant React pattern and include a short code snippet of the pattern skeleton, NOT the full solution.",
        _ => "Provide a component structure outline: breakdown, hooks and why, props/state shape, and commented scaffold code (not the full working solution).",
    };
    let analysis = serde_json::to_string_pretty(analysis).unwrap_or_default();

    format!(
        "You are a React mentor. {}\n\nChallenge: {}: {}\nCode Analysis: {}",
        instruction, problem.title, problem.description, analysis
    )
}

#[derive(Clone)]
pub struct MentorAgent {
    llm: LlmGateway,
}

impl MentorAgent {
    pub fn new(llm: LlmGateway) -> Self {
        Self { llm }
    }

    async fn analyze(&self, problem: &ProblemContext, code: &str) -> Value {
        let prompt = analysis_prompt(problem, code);
        let reply = match self.llm.generate("mentor_analysis", &prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(problem_id = %problem.id, error = %e, "Code analysis failed, using default analysis");
                return default_analysis();
            }
        };

        match serde_json::from_str(extract_json_block(&reply)) {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(problem_id = %problem.id, error = %e, "Code analysis was not valid JSON, using default analysis");
                default_analysis()
            }
        }
    }

    async fn write_hint(&self, problem: &ProblemContext, analysis: &Value, level: u8) -> (String, Option<String>) {
        let prompt = hint_prompt(problem, analysis, level);
        match self.llm.generate("mentor_hint", &prompt).await {
            Ok(hint) => {
                let snippet = if level >= 2 { extract_snippet(&hint) } else { None };
                (hint, snippet)
            }
            Err(e) => {
                warn!(problem_id = %problem.id, error = %e, "Hint generation failed, using fallback hint");
                (FALLBACK_HINT.to_string(), None)
            }
        }
    }

    pub async fn generate_hint(&self, request: &HintRequest) -> HintResponse {
        let level = adjusted_level(request.hint_level, request.previous_attempts);

        let analysis = self.analyze(&request.problem, &request.code).await;
        let (hint, code_snippet) = self.write_hint(&request.problem, &analysis, level).await;
        let point_penalty = point_penalty(level, request.previous_attempts);

        info!(
            problem_id = %request.problem.id,
            requested_level = request.hint_level,
            hint_level = level,
            point_penalty,
            has_snippet = code_snippet.is_some(),
            "Hint generated"
        );

        HintResponse {
            hint,
            code_snippet,
            point_penalty,
            explanation: format!("Level {} React coaching hint.", level),
        }
    }
}
