// Code review orchestrator: scores a submission against a fixed five-part rubric

use crate::llm::{extract_json_block, LlmError, LlmGateway};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

fn default_language() -> String {
    "typescript".to_string()
}

fn default_max_score() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationRequest {
    pub code: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub challenge_title: String,
    #[serde(default)]
    pub challenge_description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryScore {
    pub category: String,
    pub score: u32,
    #[serde(default = "default_max_score")]
    pub max_score: u32,
    pub feedback: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResponse {
    #[serde(default)]
    pub overall_score: u32,
    #[serde(default)]
    pub categories: Vec<CategoryScore>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub requirements_met: Vec<String>,
    #[serde(default)]
    pub requirements_unmet: Vec<String>,
    #[serde(default)]
    pub is_complete: bool,
}

impl EvaluationResponse {
    /// Returned whenever the model call or its JSON fails
    pub fn fallback(request: &EvaluationRequest, reason: &str) -> Self {
        Self {
            overall_score: 0,
            categories: vec![CategoryScore {
                category: "Error".to_string(),
                score: 0,
                max_score: 100,
                feedback: format!("Evaluation failed: {}", reason),
                suggestions: vec!["Please try again".to_string()],
            }],
            summary: "Evaluation service encountered an error. Please try again.".to_string(),
            strengths: vec![],
            improvements: vec!["Try submitting your code again".to_string()],
            requirements_met: vec![],
            requirements_unmet: request.requirements.clone(),
            is_complete: false,
        }
    }
}

#[derive(Debug, Error)]
enum ReviewError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("Invalid evaluation JSON: {0}")]
    Json(#[from] serde_json::Error),
}

const RUBRIC: &[&str] = &[
    "Component Architecture",
    "React Patterns & Hooks",
    "Code Quality",
    "Functionality & Requirements",
    "UI & Accessibility",
];

fn evaluation_prompt(request: &EvaluationRequest) -> String {
    let requirements = if request.requirements.is_empty() {
        "No specific requirements listed.".to_string()
    } else {
        request
            .requirements
            .iter()
            .map(|r| format!("- {}", r))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let rubric = RUBRIC
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}. {} (0-20)", i + 1, name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert React developer and hackathon judge.\n\n\
         ## Challenge\nTitle: {title}\nDescription: {description}\n\n\
         ## Requirements the submission must meet\n{requirements}\n\n\
         ## Submitted Code ({language})\n```tsx\n{code}\n```\n\n\
         ## Rubric (score each category 0-20, total /100)\n{rubric}\n\n\
         Return ONLY valid JSON with fields overall_score, categories \
         (category, score, max_score, feedback, suggestions), summary, strengths, \
         improvements, requirements_met, requirements_unmet, is_complete.",
        title = request.challenge_title,
        description = request.challenge_description,
        requirements = requirements,
        language = request.language,
        code = request.code,
        rubric = rubric,
    )
}

#[derive(Clone)]
pub struct Reviewer {
    llm: LlmGateway,
}

impl Reviewer {
    pub fn new(llm: LlmGateway) -> Self {
        Self { llm }
    }

    async fn try_evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationResponse, ReviewError> {
        let prompt = evaluation_prompt(request);
        let reply = self.llm.generate("evaluate", &prompt).await?;
        Ok(serde_json::from_str(extract_json_block(&reply))?)
    }

    pub async fn evaluate(&self, request: &EvaluationRequest) -> EvaluationResponse {
        match self.try_evaluate(request).await {
            Ok(response) => {
                info!(
                    title = %request.challenge_title,
                    overall_score = response.overall_score,
                    is_complete = response.is_complete,
                    "Evaluation complete"
                );
                response
            }
            Err(e) => {
                warn!(title = %request.challenge_title, error = %e, "Evaluation failed, returning fallback");
                EvaluationResponse::fallback(request, &e.to_string())
            }
        }
    }
}
