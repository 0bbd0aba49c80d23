//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use sylvan_language::DEFAULT_SLICE_BUDGET;

/// Default capacity of the tree-update broadcast channel.
pub const DEFAULT_UPDATE_CAPACITY: usize = 256;

/// Syntax engine settings.
///
/// ```toml
/// enabled-languages = ["lisp", "scheme"]
/// slice-budget-ms = 20
/// grammar-dirs = ["/opt/grammars"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SyntaxConfig {
	/// Languages that get syntax trees. Empty disables the engine.
	pub enabled_languages: Vec<String>,
	/// Wall-clock budget of one parse slice, in milliseconds.
	pub slice_budget_ms: u64,
	pub update_capacity: usize,
	/// Searched for grammar files before the default search paths.
	pub grammar_dirs: Vec<PathBuf>,
}

impl Default for SyntaxConfig {
	fn default() -> Self {
		Self {
			enabled_languages: Vec::new(),
			slice_budget_ms: DEFAULT_SLICE_BUDGET.as_millis() as u64,
			update_capacity: DEFAULT_UPDATE_CAPACITY,
			grammar_dirs: Vec::new(),
		}
	}
}

impl SyntaxConfig {
	pub fn with_languages<I, S>(languages: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			enabled_languages: languages.into_iter().map(Into::into).collect(),
			..Self::default()
		}
	}

	pub fn from_toml(source: &str) -> Result<Self, toml::de::Error> {
		toml::from_str(source)
	}

	pub fn is_engine_enabled(&self) -> bool {
		!self.enabled_languages.is_empty()
	}

	pub fn is_enabled(&self, language_id: &str) -> bool {
		self.enabled_languages.iter().any(|id| id == language_id)
	}

	pub fn slice_budget(&self) -> Duration {
		Duration::from_millis(self.slice_budget_ms)
	}
}
