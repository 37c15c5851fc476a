//! Path validation functions

use std::path::{Path, PathBuf};

use super::ValidationError;

/// Check if path is within a root directory
///
/// # Arguments
/// * `path` - Path to check
/// * `root` - Root directory that path should be within
///
/// # Returns
/// `true` if path is within root, `false` otherwise
pub fn is_path_within_root(path: &Path, root: &Path) -> bool {
	path.starts_with(root)
}

/// Make `path` absolute against the current directory without touching the disk
pub fn absolutize(path: &Path) -> Result<PathBuf, ValidationError> {
	if path.is_absolute() {
		return Ok(path.to_path_buf());
	}
	std::env::current_dir()
		.map(|cwd| cwd.join(path))
		.map_err(|e| ValidationError::Root(format!("Cannot resolve {:?}: {}", path, e)))
}

/// Validate the source root: must name an existing directory
///
/// # Returns
/// The canonical source root
pub fn validate_source_root(path: &Path) -> Result<PathBuf, ValidationError> {
	if path.as_os_str().is_empty() {
		return Err(ValidationError::Root("Source directory is not set".to_string()));
	}
	if !path.is_dir() {
		return Err(ValidationError::Root(format!(
			"Source {:?} does not exist or is not a directory",
			path
		)));
	}
	path.canonicalize()
		.map_err(|e| ValidationError::Root(format!("Cannot resolve source {:?}: {}", path, e)))
}

/// Validate the destination root: set, and a directory if it already exists
///
/// # Returns
/// The canonical destination root. A root that does not exist yet is
/// resolved through its closest existing ancestor.
pub fn validate_destination_root(path: &Path) -> Result<PathBuf, ValidationError> {
	if path.as_os_str().is_empty() {
		return Err(ValidationError::Root("Destination directory is not set".to_string()));
	}
	if path.exists() {
		if !path.is_dir() {
			return Err(ValidationError::Root(format!(
				"Destination {:?} exists but is not a directory",
				path
			)));
		}
		return path.canonicalize().map_err(|e| {
			ValidationError::Root(format!("Cannot resolve destination {:?}: {}", path, e))
		});
	}
	let absolute = absolutize(path)?;
	let mut base = absolute.as_path();
	let mut rest = Vec::new();
	while !base.exists() {
		match (base.parent(), base.file_name()) {
			(Some(parent), Some(name)) => {
				rest.push(name.to_os_string());
				base = parent;
			}
			_ => return Ok(absolute),
		}
	}
	let mut resolved = base.canonicalize().map_err(|e| {
		ValidationError::Root(format!("Cannot resolve destination {:?}: {}", path, e))
	})?;
	resolved.extend(rest.iter().rev());
	Ok(resolved)
}

/// Validate that neither root contains the other.
///
/// The cleanup pass deletes foreign files anywhere below the destination, so
/// an overlap would destroy source content.
pub fn validate_disjoint_roots(source: &Path, dest: &Path) -> Result<(), ValidationError> {
	if is_path_within_root(dest, source) || is_path_within_root(source, dest) {
		return Err(ValidationError::Root(format!(
			"Source {:?} and destination {:?} must not contain each other",
			source, dest
		)));
	}
	Ok(())
}
