//! Grammar blob storage.
//!
//! The catalog only asks storage for the raw bytes of a grammar file; where
//! those bytes live is up to the [`GrammarStorage`] implementation.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
	#[error("grammar file not found: {0}")]
	NotFound(String),

	#[error("failed to read {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

/// Asynchronous source of grammar blobs, keyed by file name.
#[async_trait]
pub trait GrammarStorage: Send + Sync {
	async fn fetch(&self, file_name: &str) -> Result<Vec<u8>, StorageError>;
}

/// Reads grammar files from the first directory that contains them.
#[derive(Debug, Clone)]
pub struct FsGrammarStorage {
	dirs: Vec<PathBuf>,
}

impl FsGrammarStorage {
	pub fn new(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
		Self {
			dirs: dirs.into_iter().collect(),
		}
	}

	/// Storage over `dirs` followed by [`grammar_search_paths`].
	pub fn with_search_paths(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
		Self::new(dirs.into_iter().chain(grammar_search_paths()))
	}

	pub fn dirs(&self) -> &[PathBuf] {
		&self.dirs
	}
}

#[async_trait]
impl GrammarStorage for FsGrammarStorage {
	async fn fetch(&self, file_name: &str) -> Result<Vec<u8>, StorageError> {
		if Path::new(file_name).components().count() != 1 {
			return Err(StorageError::NotFound(file_name.to_owned()));
		}

		for dir in &self.dirs {
			let path = dir.join(file_name);
			match tokio::fs::read(&path).await {
				Ok(bytes) => {
					tracing::debug!(path = %path.display(), bytes = bytes.len(), "grammar.storage.read");
					return Ok(bytes);
				}
				Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
				Err(source) => return Err(StorageError::Io { path, source }),
			}
		}

		Err(StorageError::NotFound(file_name.to_owned()))
	}
}

/// Environment variable naming a runtime directory; its `grammars/` subdirectory is searched first.
pub const RUNTIME_ENV: &str = "SYLVAN_RUNTIME";

/// Directories searched for grammar files, most specific first.
///
/// Order: `$SYLVAN_RUNTIME/grammars`, the user config dir, the user data dir,
/// then `grammars/` and `../share/sylvan/grammars` next to the executable.
pub fn grammar_search_paths() -> Vec<PathBuf> {
	search_paths_with(|key| std::env::var_os(key), std::env::current_exe().ok())
}

fn search_paths_with(var: impl Fn(&str) -> Option<OsString>, exe: Option<PathBuf>) -> Vec<PathBuf> {
	let home = || var("HOME").map(PathBuf::from);
	let (config, data) = if cfg!(windows) {
		(var("APPDATA").map(PathBuf::from), var("LOCALAPPDATA").map(PathBuf::from))
	} else {
		(
			var("XDG_CONFIG_HOME").map(PathBuf::from).or_else(|| home().map(|h| h.join(".config"))),
			var("XDG_DATA_HOME").map(PathBuf::from).or_else(|| home().map(|h| h.join(".local").join("share"))),
		)
	};

	let mut dirs: Vec<PathBuf> = var(RUNTIME_ENV).map(|runtime| PathBuf::from(runtime).join("grammars")).into_iter().collect();
	dirs.extend([config, data].into_iter().flatten().map(|base| base.join("sylvan").join("grammars")));
	if let Some(exe_dir) = exe.as_deref().and_then(Path::parent) {
		dirs.push(exe_dir.join("grammars"));
		dirs.push(exe_dir.join("..").join("share").join("sylvan").join("grammars"));
	}
	dirs
}
