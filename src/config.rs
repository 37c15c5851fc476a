//! Configuration for FastDL sync sessions
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (Config::default())
//! 2. Config file (`.toml`, `.json` or `.json5`)
//! 3. Environment variables (FASTDL_* prefix)
//! 4. CLI flags (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::pool::DEFAULT_PROGRESS_INTERVAL;
use crate::transform::DEFAULT_COMPRESS_LEVEL;
use crate::types::{SyncMode, MANIFEST_NAME};

/// Settings for one sync session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	// ========================================================================
	// TREES
	// ========================================================================
	/// Game server content directory to mirror
	pub source: PathBuf,

	/// FastDL directory receiving the mirrored files.
	///
	/// Everything in here that does not match the sync mode is deleted, so it
	/// must belong to FastDL alone.
	pub destination: PathBuf,

	// ========================================================================
	// SYNC BEHAVIOR
	// ========================================================================
	/// bzip2-compress files (`.bz2` suffix) instead of copying them
	pub compress: bool,

	/// bzip2 block size level, 1-9
	pub compress_level: u32,

	/// Maximum number of files transformed at the same time
	pub max_workers: usize,

	/// Name of the manifest file inside the source root
	pub manifest_name: String,

	// ========================================================================
	// EXCLUSION
	// ========================================================================
	/// Exclude list file (one token per line)
	pub exclude_file: Option<PathBuf>,

	/// Extra exclude tokens, merged with the exclude file
	pub exclude_tokens: Vec<String>,

	/// Game whose default exclude file (`excludes/<game>.txt`) to use
	pub game: Option<String>,

	// ========================================================================
	// OUTPUT & LOGGING
	// ========================================================================
	/// Cadence of active-worker reports while draining, in milliseconds
	pub progress_interval_ms: u64,

	/// Log level (trace, debug, info, warn, error)
	pub log_level: String,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			source: PathBuf::new(),
			destination: PathBuf::new(),

			compress: true,
			compress_level: DEFAULT_COMPRESS_LEVEL,
			max_workers: 4,
			manifest_name: MANIFEST_NAME.to_string(),

			exclude_file: None,
			exclude_tokens: vec![],
			game: None,

			progress_interval_ms: DEFAULT_PROGRESS_INTERVAL.as_millis() as u64,
			log_level: "info".to_string(),
		}
	}
}

impl Config {
	/// Sync mode derived from `compress`
	pub fn mode(&self) -> SyncMode {
		SyncMode { compressed: self.compress }
	}

	/// Load a config file, picking the parser from the extension
	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let contents = fs::read_to_string(path)
			.map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
		let parse_err = |message: String| ConfigError::Parse { path: path.to_path_buf(), message };

		match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref() {
			Some("toml") => toml::from_str(&contents).map_err(|e| parse_err(e.to_string())),
			Some("json") => serde_json::from_str(&contents).map_err(|e| parse_err(e.to_string())),
			Some("json5") => json5::from_str(&contents).map_err(|e| parse_err(e.to_string())),
			_ => Err(ConfigError::UnsupportedFormat { path: path.to_path_buf() }),
		}
	}

	/// Defaults, overlaid with `path` if given, then the environment
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let mut config = match path {
			Some(p) => Self::from_file(p)?,
			None => Self::default(),
		};
		config.apply_env(|name| std::env::var(name).ok())?;
		Ok(config)
	}

	/// Apply FASTDL_* overrides using `lookup` to read variables
	pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(v) = lookup("FASTDL_SOURCE") {
			self.source = PathBuf::from(v);
		}
		if let Some(v) = lookup("FASTDL_DEST") {
			self.destination = PathBuf::from(v);
		}
		if let Some(v) = lookup("FASTDL_COMPRESS") {
			self.compress = parse_bool(&v)
				.ok_or(ConfigError::InvalidEnv { var: "FASTDL_COMPRESS".to_string(), value: v })?;
		}
		if let Some(v) = lookup("FASTDL_THREADS") {
			self.max_workers = v
				.trim()
				.parse()
				.map_err(|_| ConfigError::InvalidEnv { var: "FASTDL_THREADS".to_string(), value: v })?;
		}
		if let Some(v) = lookup("FASTDL_LOG") {
			self.log_level = v;
		}
		Ok(())
	}
}

fn parse_bool(s: &str) -> Option<bool> {
	match s.trim().to_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" => Some(false),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use tempfile::TempDir;

	#[test]
	fn test_config_default() {
		let config = Config::default();
		assert!(config.compress);
		assert_eq!(config.compress_level, 5);
		assert_eq!(config.max_workers, 4);
		assert_eq!(config.manifest_name, "fastdownload.txt");
		assert_eq!(config.progress_interval_ms, 200);
		assert!(config.mode().compressed);
	}

	#[test]
	fn test_config_serialization() {
		let config = Config { source: PathBuf::from("/srv/csgo"), ..Default::default() };
		let json = serde_json::to_string(&config).expect("Failed to serialize");
		assert!(json.contains("\"maxWorkers\""));
		let deserialized: Config = serde_json::from_str(&json).expect("Failed to deserialize");
		assert_eq!(config, deserialized);
	}

	#[test]
	fn test_from_toml_file() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("fastdl.toml");
		fs::write(
			&path,
			"source = \"/srv/csgo\"\ndestination = \"/var/www/fastdl\"\ncompress = false\nmaxWorkers = 8\nexcludeTokens = [\".txt\", \"sound\"]\n",
		)
		.unwrap();

		let config = Config::from_file(&path).unwrap();
		assert_eq!(config.source, PathBuf::from("/srv/csgo"));
		assert!(!config.compress);
		assert_eq!(config.max_workers, 8);
		assert_eq!(config.exclude_tokens, vec![".txt", "sound"]);
		// untouched fields keep their defaults
		assert_eq!(config.compress_level, 5);
	}

	#[test]
	fn test_from_json5_file() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("fastdl.json5");
		fs::write(&path, "{\n  // comments are fine here\n  game: 'garrysmod',\n  compressLevel: 9,\n}\n")
			.unwrap();

		let config = Config::from_file(&path).unwrap();
		assert_eq!(config.game.as_deref(), Some("garrysmod"));
		assert_eq!(config.compress_level, 9);
	}

	#[test]
	fn test_unsupported_and_broken_files() {
		let dir = TempDir::new().unwrap();
		let yaml = dir.path().join("fastdl.yaml");
		fs::write(&yaml, "source: x").unwrap();
		assert!(matches!(Config::from_file(&yaml), Err(ConfigError::UnsupportedFormat { .. })));

		let broken = dir.path().join("fastdl.json");
		fs::write(&broken, "{ not json").unwrap();
		assert!(matches!(Config::from_file(&broken), Err(ConfigError::Parse { .. })));

		assert!(matches!(
			Config::from_file(&dir.path().join("missing.toml")),
			Err(ConfigError::Read { .. })
		));
	}

	#[test]
	fn test_env_overrides() {
		let env: HashMap<&str, &str> = [
			("FASTDL_SOURCE", "/srv/tf"),
			("FASTDL_COMPRESS", "off"),
			("FASTDL_THREADS", "12"),
		]
		.into_iter()
		.collect();

		let mut config = Config::default();
		config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
		assert_eq!(config.source, PathBuf::from("/srv/tf"));
		assert!(!config.compress);
		assert_eq!(config.max_workers, 12);
	}

	#[test]
	fn test_env_rejects_garbage() {
		let mut config = Config::default();
		let err = config
			.apply_env(|k| if k == "FASTDL_THREADS" { Some("many".to_string()) } else { None })
			.unwrap_err();
		assert!(matches!(err, ConfigError::InvalidEnv { .. }));
	}
}

// vim: ts=4
