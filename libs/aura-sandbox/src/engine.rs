/// Execution Engine - runs every test case of one submission
///
/// **Core Responsibility:**
/// Generate the harness for each test input, hand it to the runner and keep
/// the raw outcome.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to execute (harness + runner)
/// - Engine does NOT compare outputs or decide pass/fail
/// - Engine returns raw outputs for the Evaluator to judge
///
/// Test cases run strictly one after another, in request order. A failure in
/// one test case is stored in its output and never stops the loop.
use crate::config::LanguageProfile;
use crate::error::SandboxError;
use crate::harness;
use crate::runner::{ProcessRunner, RunOutput};
use aura_common::types::TestCase;
use tracing::{debug, info};

/// Safety limits to keep pathological submissions away from the interpreter
pub const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024; // 1MB
pub const MAX_TEST_INPUT_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Raw execution output for a single test case
/// Produced by the engine, consumed by the evaluator
#[derive(Debug)]
pub struct TestExecutionOutput {
    pub index: usize,
    pub result: Result<RunOutput, SandboxError>,
}

pub struct ExecutionEngine<R> {
    runner: R,
}

impl<R: ProcessRunner> ExecutionEngine<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run `code` against each test case and collect one output per case
    pub async fn execute_tests(
        &self,
        profile: &LanguageProfile,
        code: &str,
        test_cases: &[TestCase],
        time_limit_ms: u64,
    ) -> Vec<TestExecutionOutput> {
        let mut outputs = Vec::with_capacity(test_cases.len());

        info!(
            language = %profile.language,
            test_cases = test_cases.len(),
            time_limit_ms,
            "Executing test cases"
        );

        for (index, test_case) in test_cases.iter().enumerate() {
            let result = self.execute_one(profile, code, test_case, time_limit_ms).await;

            match &result {
                Ok(run) => debug!(
                    test_num = index + 1,
                    execution_ms = run.elapsed.as_millis() as u64,
                    output_bytes = run.output.len(),
                    "Test executed"
                ),
                Err(e) => debug!(test_num = index + 1, error = %e, "Test execution failed"),
            }

            outputs.push(TestExecutionOutput { index, result });
        }

        outputs
    }

    async fn execute_one(
        &self,
        profile: &LanguageProfile,
        code: &str,
        test_case: &TestCase,
        time_limit_ms: u64,
    ) -> Result<RunOutput, SandboxError> {
        if test_case.input.len() > MAX_TEST_INPUT_BYTES {
            return Err(SandboxError::InputTooLarge {
                what: "Test input",
                limit: MAX_TEST_INPUT_BYTES,
            });
        }

        let source = harness::generate(profile, code, &test_case.input);
        self.runner.run(&source, profile, time_limit_ms).await
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Runner that replays scripted results and counts spawns
    #[derive(Default)]
    pub struct ScriptedRunner {
        responses: Mutex<VecDeque<Result<RunOutput, SandboxError>>>,
        sources: Mutex<Vec<String>>,
        spawns: AtomicUsize,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_output(self, output: &str, elapsed_ms: u64) -> Self {
            self.responses.lock().unwrap().push_back(Ok(RunOutput {
                output: output.to_string(),
                elapsed: Duration::from_millis(elapsed_ms),
            }));
            self
        }

        pub fn push_error(self, error: SandboxError) -> Self {
            self.responses.lock().unwrap().push_back(Err(error));
            self
        }

        pub fn spawn_count(&self) -> usize {
            self.spawns.load(Ordering::SeqCst)
        }

        pub fn sources(&self) -> Vec<String> {
            self.sources.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessRunner for ScriptedRunner {
        async fn run(
            &self,
            source: &str,
            _profile: &LanguageProfile,
            _timeout_ms: u64,
        ) -> Result<RunOutput, SandboxError> {
            self.spawns.fetch_add(1, Ordering::SeqCst);
            self.sources.lock().unwrap().push(source.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SandboxError::Io(std::io::Error::other("no scripted response"))))
        }
    }
}
