//! Source → destination path mapping
//!
//! All comparisons (exclusion, manifest dedup, destination naming) go through
//! [`normalize_key`]: lower-case, forward slashes, no empty or `.` segments.
//! Destination files are therefore always written with lower-case names.

use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::types::{SyncMode, COMPRESSED_SUFFIX};

/// Normalize a path string for comparison
pub fn normalize_key(path: &str) -> String {
	let lowered = path.trim().replace('\\', "/").to_lowercase();
	let absolute = lowered.starts_with('/');
	let joined =
		lowered.split('/').filter(|seg| !seg.is_empty() && *seg != ".").collect::<Vec<_>>().join("/");
	if absolute {
		format!("/{}", joined)
	} else {
		joined
	}
}

/// Normalized comparison key of a filesystem path
pub fn path_key(path: &Path) -> String {
	normalize_key(&path.to_string_lossy())
}

/// Result of mapping one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedPath {
	/// Directory that will contain `dest_path`
	pub dest_dir: PathBuf,
	/// Full destination file path, suffixed in compressed mode
	pub dest_path: PathBuf,
	/// Normalized path relative to the source root (`maps/de_dust.bsp`)
	pub relative_path: String,
}

/// Maps source files below `source_root` into `dest_root`
#[derive(Debug, Clone)]
pub struct PathMapper {
	source_root: PathBuf,
	dest_root: PathBuf,
	mode: SyncMode,
}

impl PathMapper {
	pub fn new(source_root: impl Into<PathBuf>, dest_root: impl Into<PathBuf>, mode: SyncMode) -> Self {
		PathMapper { source_root: source_root.into(), dest_root: dest_root.into(), mode }
	}

	pub fn source_root(&self) -> &Path {
		&self.source_root
	}

	pub fn dest_root(&self) -> &Path {
		&self.dest_root
	}

	pub fn mode(&self) -> SyncMode {
		self.mode
	}

	/// Normalized path of `source_path` relative to the source root
	pub fn relative_key(&self, source_path: &Path) -> Result<String, SyncError> {
		if let Ok(rel) = source_path.strip_prefix(&self.source_root) {
			let key = path_key(rel);
			if !key.is_empty() {
				return Ok(key);
			}
		} else {
			// Manifests written on case-insensitive systems may differ in case only
			let root = path_key(&self.source_root);
			let full = path_key(source_path);
			if let Some(rest) = full.strip_prefix(&root) {
				if let Some(rest) = rest.strip_prefix('/') {
					if !rest.is_empty() {
						return Ok(rest.to_string());
					}
				}
			}
		}

		Err(SyncError::PathOutsideRoot {
			path: source_path.to_path_buf(),
			root: self.source_root.clone(),
		})
	}

	/// Map a source file using the session's sync mode
	pub fn map(&self, source_path: &Path) -> Result<MappedPath, SyncError> {
		self.map_with(source_path, self.mode)
	}

	/// Map a source file as if `mode` were active
	pub fn map_with(&self, source_path: &Path, mode: SyncMode) -> Result<MappedPath, SyncError> {
		let relative_path = self.relative_key(source_path)?;
		let dest_path = self.dest_for_key(&relative_path, mode);
		let dest_dir = dest_path.parent().map(Path::to_path_buf).unwrap_or_else(|| self.dest_root.clone());
		Ok(MappedPath { dest_dir, dest_path, relative_path })
	}

	/// Raw and compressed destination of a source file, regardless of mode
	pub fn variants(&self, source_path: &Path) -> Result<[PathBuf; 2], SyncError> {
		let relative_path = self.relative_key(source_path)?;
		Ok([
			self.dest_for_key(&relative_path, SyncMode::raw()),
			self.dest_for_key(&relative_path, SyncMode::compressed()),
		])
	}

	fn dest_for_key(&self, relative_key: &str, mode: SyncMode) -> PathBuf {
		let mut dest = self.dest_root.clone();
		for segment in relative_key.split('/') {
			dest.push(segment);
		}
		if mode.compressed {
			let mut s = dest.into_os_string();
			s.push(COMPRESSED_SUFFIX);
			dest = PathBuf::from(s);
		}
		dest
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_normalize_key() {
		assert_eq!(normalize_key("Maps\\DE_Dust.bsp"), "maps/de_dust.bsp");
		assert_eq!(normalize_key("./sound//ambient/"), "sound/ambient");
		assert_eq!(normalize_key("/Srv/CSGO"), "/srv/csgo");
		assert_eq!(normalize_key("  .TXT "), ".txt");
		assert_eq!(normalize_key(""), "");
	}

	#[test]
	fn test_map_compressed() {
		let m = PathMapper::new("/srv/csgo", "/var/www/fastdl", SyncMode::compressed());
		let mapped = m.map(Path::new("/srv/csgo/maps/de_dust.bsp")).unwrap();
		assert_eq!(mapped.relative_path, "maps/de_dust.bsp");
		assert_eq!(mapped.dest_path, PathBuf::from("/var/www/fastdl/maps/de_dust.bsp.bz2"));
		assert_eq!(mapped.dest_dir, PathBuf::from("/var/www/fastdl/maps"));
	}

	#[test]
	fn test_map_raw_lowercases() {
		let m = PathMapper::new("/srv/csgo", "/var/www/fastdl", SyncMode::raw());
		let mapped = m.map(Path::new("/srv/csgo/Materials/Logo.VTF")).unwrap();
		assert_eq!(mapped.dest_path, PathBuf::from("/var/www/fastdl/materials/logo.vtf"));
	}

	#[test]
	fn test_map_top_level_file() {
		let m = PathMapper::new("/srv/csgo", "/fastdl", SyncMode::raw());
		let mapped = m.map(Path::new("/srv/csgo/motd.txt")).unwrap();
		assert_eq!(mapped.dest_dir, PathBuf::from("/fastdl"));
		assert_eq!(mapped.relative_path, "motd.txt");
	}

	#[test]
	fn test_outside_root() {
		let m = PathMapper::new("/srv/csgo", "/fastdl", SyncMode::raw());
		let err = m.map(Path::new("/srv/tf/maps/a.bsp")).unwrap_err();
		assert!(matches!(err, SyncError::PathOutsideRoot { .. }));
		// the root itself is not a file below the root
		assert!(m.map(Path::new("/srv/csgo")).is_err());
	}

	#[test]
	fn test_case_insensitive_root_fallback() {
		let m = PathMapper::new("/srv/CSGO", "/fastdl", SyncMode::raw());
		let mapped = m.map(Path::new("/srv/csgo/maps/a.bsp")).unwrap();
		assert_eq!(mapped.relative_path, "maps/a.bsp");
	}

	#[test]
	fn test_variants() {
		let m = PathMapper::new("/srv/csgo", "/fastdl", SyncMode::compressed());
		let [raw, bz] = m.variants(Path::new("/srv/csgo/maps/old_map.bsp")).unwrap();
		assert_eq!(raw, PathBuf::from("/fastdl/maps/old_map.bsp"));
		assert_eq!(bz, PathBuf::from("/fastdl/maps/old_map.bsp.bz2"));
	}
}
