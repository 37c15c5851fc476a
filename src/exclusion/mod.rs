//! Exclusion list matching
//!
//! An exclude list is a flat set of literal tokens. Each token is either a
//! file extension with its leading dot (`.txt`), a directory relative to the
//! source root (`sound/ambient`), or a file path relative to the source root
//! (`maps/test.bsp`). There are no wildcards.
//!
//! Matching is done on normalized paths (see [`crate::mapping::normalize_key`])
//! so `Maps\Test.BSP` and `maps/test.bsp` are the same entry.

mod loader;

use std::collections::HashSet;
use std::path::Path;

use crate::error::SyncError;
use crate::mapping::normalize_key;

/// Which rule excluded a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcludeReason {
	/// The full relative path is listed
	Path,
	/// The file's immediate parent directory is listed
	Directory,
	/// The file's extension is listed
	Extension,
}

/// Set of literal exclusion tokens
#[derive(Debug, Clone, Default)]
pub struct ExcludeList {
	tokens: HashSet<String>,
}

impl ExcludeList {
	/// Empty list, excludes nothing
	pub fn new() -> Self {
		Self::default()
	}

	/// Build from in-memory tokens; blank tokens are dropped
	pub fn from_tokens<I, S>(tokens: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let tokens = tokens
			.into_iter()
			.map(|t| normalize_key(t.as_ref()))
			.filter(|t| !t.is_empty())
			.collect();
		ExcludeList { tokens }
	}

	/// Load from an exclude file, one token per line
	pub fn load(path: &Path) -> Result<Self, SyncError> {
		loader::load_exclude_file(path)
	}

	/// Add tokens to an existing list
	pub fn extend<I, S>(&mut self, tokens: I)
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		for t in tokens {
			let t = normalize_key(t.as_ref());
			if !t.is_empty() {
				self.tokens.insert(t);
			}
		}
	}

	pub fn len(&self) -> usize {
		self.tokens.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}

	/// Is `relative_path` (relative to the source root) excluded?
	pub fn is_excluded(&self, relative_path: &str) -> bool {
		self.match_reason(relative_path).is_some()
	}

	/// Like [`is_excluded`](Self::is_excluded) but tells which rule matched.
	///
	/// First hit wins: full path, then immediate parent directory, then
	/// extension. Paths without an extension are only checked against the
	/// full-path rule.
	pub fn match_reason(&self, relative_path: &str) -> Option<ExcludeReason> {
		if self.tokens.is_empty() {
			return None;
		}

		let key = normalize_key(relative_path);
		if self.tokens.contains(&key) {
			return Some(ExcludeReason::Path);
		}

		let (dir, name) = match key.rfind('/') {
			Some(idx) => (&key[..idx], &key[idx + 1..]),
			None => ("", key.as_str()),
		};

		let ext = match extension_of(name) {
			Some(ext) => ext,
			None => return None,
		};

		if !dir.is_empty() && self.tokens.contains(dir) {
			return Some(ExcludeReason::Directory);
		}

		if self.tokens.contains(ext) {
			return Some(ExcludeReason::Extension);
		}

		None
	}
}

/// Extension of a file name including the leading dot.
///
/// Dot-files (`.htaccess`) and names ending in a dot have no extension.
fn extension_of(name: &str) -> Option<&str> {
	let idx = name.rfind('.')?;
	if idx == 0 || idx == name.len() - 1 {
		return None;
	}
	Some(&name[idx..])
}

#[cfg(test)]
mod tests {
	use super::*;

	fn list(tokens: &[&str]) -> ExcludeList {
		ExcludeList::from_tokens(tokens.iter().copied())
	}

	#[test]
	fn test_exact_path() {
		let l = list(&["maps/test.bsp"]);
		assert_eq!(l.match_reason("maps/test.bsp"), Some(ExcludeReason::Path));
		assert!(!l.is_excluded("maps/other.bsp"));
	}

	#[test]
	fn test_directory() {
		let l = list(&["sounds"]);
		assert_eq!(l.match_reason("sounds/ambient.wav"), Some(ExcludeReason::Directory));
		// only the immediate parent is compared
		assert!(!l.is_excluded("sounds/ambient/wind.wav"));
		assert!(!l.is_excluded("maps/de_dust.bsp"));
	}

	#[test]
	fn test_nested_directory_token() {
		let l = list(&["sounds/ambient"]);
		assert!(l.is_excluded("sounds/ambient/wind.wav"));
		assert!(!l.is_excluded("sounds/wind.wav"));
	}

	#[test]
	fn test_extension() {
		let l = list(&[".txt", ".ztmp"]);
		assert_eq!(l.match_reason("cfg/readme.txt"), Some(ExcludeReason::Extension));
		assert!(l.is_excluded("top.ztmp"));
		assert!(!l.is_excluded("maps/de_dust.bsp"));
	}

	#[test]
	fn test_first_rule_wins() {
		let l = list(&["maps/a.bsp", "maps", ".bsp"]);
		assert_eq!(l.match_reason("maps/a.bsp"), Some(ExcludeReason::Path));
		assert_eq!(l.match_reason("maps/b.bsp"), Some(ExcludeReason::Directory));
		assert_eq!(l.match_reason("other/b.bsp"), Some(ExcludeReason::Extension));
	}

	#[test]
	fn test_extensionless_only_matches_full_path() {
		let l = list(&["cfg", "cfg/motd"]);
		assert!(l.is_excluded("cfg/motd"));
		assert!(!l.is_excluded("cfg/banner"));
		assert!(l.is_excluded("cfg"));
	}

	#[test]
	fn test_case_and_separator_normalization() {
		let l = list(&["Sound\\Ambient", ".WAV"]);
		assert!(l.is_excluded("sound/ambient/x.mp3"));
		assert!(l.is_excluded("Music/Theme.wav"));
	}

	#[test]
	fn test_dotfile_has_no_extension() {
		let l = list(&[".htaccess"]);
		assert_eq!(l.match_reason("web/.htaccess"), None);
		assert_eq!(l.match_reason(".htaccess"), Some(ExcludeReason::Path));
	}

	#[test]
	fn test_empty_list() {
		let l = ExcludeList::new();
		assert!(l.is_empty());
		assert!(!l.is_excluded("anything.bsp"));
	}

	#[test]
	fn test_blank_tokens_dropped() {
		let mut l = list(&["", "  ", ".txt"]);
		assert_eq!(l.len(), 1);
		l.extend(["maps"]);
		assert_eq!(l.len(), 2);
	}
}
