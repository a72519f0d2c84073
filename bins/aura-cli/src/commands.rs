// CLI commands for running submissions and managing sandbox languages
use anyhow::{Context, Result};
use aura_common::types::{ExecutionRequest, TestCase};
use aura_sandbox::config::LanguagesJson;
use aura_sandbox::{CodeExecutor, LanguageRegistry};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Read a JSON array of test cases. An empty array is valid and passes vacuously.
fn load_test_cases(tests_path: &Path) -> Result<Vec<TestCase>> {
    let content = fs::read_to_string(tests_path)
        .with_context(|| format!("Failed to read test cases: {}", tests_path.display()))?;
    let test_cases: Vec<TestCase> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse test cases: {}", tests_path.display()))?;

    debug!(path = %tests_path.display(), count = test_cases.len(), "Loaded test cases");
    Ok(test_cases)
}

/// Execute a submission locally and print the result as JSON.
/// Returns whether every test passed.
pub async fn run_submission(
    language: &str,
    code_path: &Path,
    tests_path: &Path,
    time_limit_ms: u64,
    languages_path: &Path,
) -> Result<bool> {
    let code = fs::read_to_string(code_path)
        .with_context(|| format!("Failed to read source file: {}", code_path.display()))?;
    let test_cases = load_test_cases(tests_path)?;
    let registry = LanguageRegistry::load_or_builtin(languages_path)?;

    let executor = CodeExecutor::new(Arc::new(registry));
    let request = ExecutionRequest {
        code,
        language: language.to_string(),
        test_cases,
        time_limit_ms,
    };

    let result = executor.execute(&request).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.success {
        eprintln!("✅ {}/{} tests passed", result.passed_count(), result.outcomes.len());
    } else if let Some(error) = &result.error {
        eprintln!("❌ {}", error);
    } else {
        eprintln!("❌ {}/{} tests passed", result.passed_count(), result.outcomes.len());
    }

    Ok(result.success)
}

/// Print the enabled languages with how each one is launched
pub fn list_languages(languages_path: &Path) -> Result<()> {
    let registry = LanguageRegistry::load_or_builtin(languages_path)?;

    let mut profiles: Vec<_> = registry.profiles().collect();
    profiles.sort_by_key(|p| p.language.as_str());

    println!("📋 Supported languages:");
    for profile in profiles {
        println!(
            "  {:<12} {:<10} {}",
            profile.language, profile.executable, profile.file_extension
        );
    }
    Ok(())
}

/// Write the default languages.json under `path`; an existing file is kept
pub fn init_project(path: &Path) -> Result<()> {
    println!("🚀 Initializing Aura project at: {}", path.display());

    let config_dir = path.join("config");
    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create directory: {}", config_dir.display()))?;

    let languages_json_path = config_dir.join("languages.json");
    if languages_json_path.exists() {
        println!("  ⏭️  Kept existing: config/languages.json");
    } else {
        let json_content = serde_json::to_string_pretty(&LanguagesJson::defaults())
            .context("Failed to serialize languages.json")?;
        fs::write(&languages_json_path, json_content)
            .context("Failed to write languages.json")?;
        println!("  ✅ Created: config/languages.json");
    }

    println!("✅ Project initialized successfully!");
    println!("\n📋 Next steps:");
    println!("  1. Disable or repoint languages in config/languages.json");
    println!("  2. Try it: aura-cli run --language python --code solution.py --tests tests.json");

    Ok(())
}
