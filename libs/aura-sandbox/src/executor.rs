/// Code Executor - High-Level Orchestration
///
/// Resolves the request's language, then hands over to the engine
/// (execution) and the evaluator (judging). Always produces an
/// `ExecutionResult`: request-level problems such as an unsupported
/// language come back as a rejected result before anything is spawned.
use crate::config::LanguageRegistry;
use crate::engine::{ExecutionEngine, MAX_SOURCE_CODE_BYTES};
use crate::error::SandboxError;
use crate::evaluator;
use crate::runner::{ProcessRunner, SubprocessRunner};
use aura_common::types::{ExecutionRequest, ExecutionResult};
use std::sync::Arc;
use tracing::{info, warn};

pub struct CodeExecutor<R = SubprocessRunner> {
    registry: Arc<LanguageRegistry>,
    engine: ExecutionEngine<R>,
}

impl CodeExecutor<SubprocessRunner> {
    pub fn new(registry: Arc<LanguageRegistry>) -> Self {
        Self::with_runner(registry, SubprocessRunner::new())
    }
}

impl<R: ProcessRunner> CodeExecutor<R> {
    pub fn with_runner(registry: Arc<LanguageRegistry>, runner: R) -> Self {
        Self {
            registry,
            engine: ExecutionEngine::new(runner),
        }
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn runner(&self) -> &R {
        self.engine.runner()
    }

    /// Tags accepted by `execute`
    pub fn supported_languages(&self) -> Vec<String> {
        self.registry.list_languages()
    }

    /// Execute a submission against all of its test cases
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let profile = match self.registry.get(&request.language) {
            Ok(profile) => profile,
            Err(e) => {
                warn!(language = %request.language, "Rejecting submission: {}", e);
                return ExecutionResult::rejected(e.to_string());
            }
        };

        if request.code.len() > MAX_SOURCE_CODE_BYTES {
            let e = SandboxError::InputTooLarge {
                what: "Source code",
                limit: MAX_SOURCE_CODE_BYTES,
            };
            warn!(language = %request.language, source_size = request.code.len(), "Rejecting submission: {}", e);
            return ExecutionResult::rejected(e.to_string());
        }

        info!(
            language = %profile.language,
            test_count = request.test_cases.len(),
            source_size = request.code.len(),
            time_limit_ms = request.time_limit_ms,
            "Starting execution"
        );

        let outputs = self
            .engine
            .execute_tests(profile, &request.code, &request.test_cases, request.time_limit_ms)
            .await;

        // Cross-layer guard: surface failed runs before evaluation
        for output in &outputs {
            match &output.result {
                Err(SandboxError::Timeout { limit_ms }) => warn!(
                    test_num = output.index + 1,
                    limit_ms, "Execution timed out; test cannot pass"
                ),
                Err(e) => warn!(
                    test_num = output.index + 1,
                    error = %e, "Execution failed; test cannot pass"
                ),
                Ok(_) => {}
            }
        }

        evaluator::evaluate(&request.test_cases, outputs)
    }
}
