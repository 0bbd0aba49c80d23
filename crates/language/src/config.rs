//! Language configuration.
//!
//! Maps language identifiers to the grammar files that back them. Loaded from
//! TOML or assembled programmatically:
//!
//! ```toml
//! [[language]]
//! language-id = "lisp"
//!
//! [[language]]
//! language-id = "scheme"
//! grammar = "lisp"
//! ```

use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;

/// File extension of grammar blobs.
pub const GRAMMAR_EXTENSION: &str = "grammar";

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("failed to parse language config: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("language `{0}` is defined more than once")]
	Duplicate(String),
}

/// Configuration for a single language.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LanguageConfig {
	/// Language identifier (e.g., "rust", "python").
	pub language_id: String,

	/// Grammar name. Defaults to `language_id` if not specified.
	#[serde(default)]
	pub grammar: Option<String>,
}

impl LanguageConfig {
	pub fn new(language_id: impl Into<String>) -> Self {
		Self {
			language_id: language_id.into(),
			grammar: None,
		}
	}

	pub fn with_grammar(mut self, grammar: impl Into<String>) -> Self {
		self.grammar = Some(grammar.into());
		self
	}

	/// Returns the grammar name to use for loading.
	pub fn grammar_name(&self) -> &str {
		self.grammar.as_deref().unwrap_or(&self.language_id)
	}

	/// File name handed to grammar storage.
	pub fn grammar_file(&self) -> String {
		format!("{}.{GRAMMAR_EXTENSION}", self.grammar_name())
	}
}

#[derive(Deserialize)]
struct ConfigFile {
	#[serde(default)]
	language: Vec<LanguageConfig>,
}

/// Known languages, keyed by identifier.
#[derive(Debug, Default, Clone)]
pub struct LanguageRegistry {
	languages: FxHashMap<String, LanguageConfig>,
}

impl LanguageRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses a TOML document of `[[language]]` tables.
	pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
		let file: ConfigFile = toml::from_str(source)?;
		let mut registry = Self::new();
		for config in file.language {
			if registry.languages.contains_key(&config.language_id) {
				return Err(ConfigError::Duplicate(config.language_id));
			}
			registry.register(config);
		}
		Ok(registry)
	}

	/// Registers a language, replacing any previous entry with the same id.
	pub fn register(&mut self, config: LanguageConfig) {
		self.languages.insert(config.language_id.clone(), config);
	}

	pub fn get(&self, language_id: &str) -> Option<&LanguageConfig> {
		self.languages.get(language_id)
	}

	pub fn contains(&self, language_id: &str) -> bool {
		self.languages.contains_key(language_id)
	}

	pub fn len(&self) -> usize {
		self.languages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.languages.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &LanguageConfig> {
		self.languages.values()
	}
}

impl FromIterator<LanguageConfig> for LanguageRegistry {
	fn from_iter<I: IntoIterator<Item = LanguageConfig>>(iter: I) -> Self {
		let mut registry = Self::new();
		for config in iter {
			registry.register(config);
		}
		registry
	}
}
