// Language registry for the sandbox
// Built-in defaults, optionally overridden by config/languages.json
use crate::error::SandboxError;
use crate::harness::{self, HarnessTemplate};
use anyhow::{bail, Context, Result};
use aura_common::types::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Everything needed to turn a submission into a runnable process for one language.
#[derive(Debug, Clone)]
pub struct LanguageProfile {
    pub language: Language,
    pub executable: String,
    pub file_extension: String,
    pub harness: &'static HarnessTemplate,
}

impl LanguageProfile {
    pub fn builtin(language: Language) -> Self {
        let (executable, file_extension) = match language {
            Language::Python => ("python3", ".py"),
            Language::JavaScript => ("node", ".js"),
            Language::TypeScript => ("ts-node", ".ts"),
        };

        Self {
            language,
            executable: executable.to_string(),
            file_extension: file_extension.to_string(),
            harness: harness::template_for(language),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageEntry {
    pub name: String,
    pub executable: String,
    pub file_extension: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LanguagesJson {
    pub languages: Vec<LanguageEntry>,
}

impl LanguagesJson {
    /// The file `aura-cli init` writes: the built-in registry, spelled out.
    pub fn defaults() -> Self {
        let languages = Language::ALL
            .iter()
            .map(|lang| {
                let profile = LanguageProfile::builtin(*lang);
                LanguageEntry {
                    name: lang.to_string(),
                    executable: profile.executable,
                    file_extension: profile.file_extension,
                    enabled: true,
                }
            })
            .collect();
        Self { languages }
    }
}

/// Registry of enabled languages.
/// Adding a language means one `Language` variant, one harness template and one entry here.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    profiles: HashMap<Language, LanguageProfile>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LanguageRegistry {
    pub fn builtin() -> Self {
        let profiles = Language::ALL
            .iter()
            .map(|lang| (*lang, LanguageProfile::builtin(*lang)))
            .collect();
        Self { profiles }
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = LanguageProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.language, p)).collect(),
        }
    }

    /// Load language overrides from languages.json
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .context("Failed to read languages.json")?;

        let languages_json: LanguagesJson = serde_json::from_str(&content)
            .context("Failed to parse languages.json")?;

        Self::from_json(languages_json)
    }

    pub fn from_json(languages_json: LanguagesJson) -> Result<Self> {
        let mut profiles = HashMap::new();
        for entry in languages_json.languages {
            let Ok(language) = entry.name.parse::<Language>() else {
                bail!("Unknown language '{}' in languages.json", entry.name);
            };
            if !entry.enabled {
                continue;
            }
            if entry.executable.trim().is_empty() {
                bail!("Language '{}' has an empty executable", entry.name);
            }

            let file_extension = if entry.file_extension.starts_with('.') {
                entry.file_extension
            } else {
                format!(".{}", entry.file_extension)
            };

            profiles.insert(
                language,
                LanguageProfile {
                    language,
                    executable: entry.executable,
                    file_extension,
                    harness: harness::template_for(language),
                },
            );
        }

        if profiles.is_empty() {
            bail!("No languages enabled in languages.json");
        }

        Ok(Self { profiles })
    }

    /// Load from `config_path`, or fall back to the built-in registry when the
    /// file does not exist. A file that exists but is broken is still an error.
    pub fn load_or_builtin(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let registry = Self::load(config_path)?;
            info!(
                path = %config_path.display(),
                languages = ?registry.list_languages(),
                "Loaded language configuration"
            );
            Ok(registry)
        } else {
            warn!(
                path = %config_path.display(),
                "Language config not found, using built-in defaults"
            );
            Ok(Self::builtin())
        }
    }

    /// Resolve a request's language tag
    pub fn get(&self, tag: &str) -> std::result::Result<&LanguageProfile, SandboxError> {
        tag.parse::<Language>()
            .ok()
            .and_then(|lang| self.profiles.get(&lang))
            .ok_or_else(|| SandboxError::UnsupportedLanguage(tag.to_string()))
    }

    pub fn is_enabled(&self, language: Language) -> bool {
        self.profiles.contains_key(&language)
    }

    /// Sorted so API responses are stable
    pub fn list_languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.keys().map(|l| l.to_string()).collect();
        names.sort();
        names
    }

    pub fn profiles(&self) -> impl Iterator<Item = &LanguageProfile> {
        self.profiles.values()
    }
}
