//! Configuration validation functions

use super::{ValidationError, Validator};
use crate::config::Config;

/// Validate the worker limit (must be 1-1024)
pub fn validate_max_workers(max_workers: usize) -> Result<(), ValidationError> {
	if max_workers == 0 {
		return Err(ValidationError::setting("maxWorkers", "must be at least 1"));
	}
	if max_workers > 1024 {
		return Err(ValidationError::setting("maxWorkers", format!("must be at most 1024, got {}", max_workers)));
	}
	Ok(())
}

/// Validate the bzip2 compression level (1-9)
pub fn validate_compress_level(level: u32) -> Result<(), ValidationError> {
	if !(1..=9).contains(&level) {
		return Err(ValidationError::setting("compressLevel", format!("must be between 1 and 9, got {}", level)));
	}
	Ok(())
}

/// Validate the manifest file name (a bare file name)
pub fn validate_manifest_name(name: &str) -> Result<(), ValidationError> {
	if name.trim().is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".." {
		return Err(ValidationError::setting("manifestName", format!("must be a plain file name, got {:?}", name)));
	}
	Ok(())
}

impl Validator for Config {
	fn validate(&self) -> Result<(), ValidationError> {
		validate_max_workers(self.max_workers)?;
		validate_compress_level(self.compress_level)?;
		validate_manifest_name(&self.manifest_name)?;
		if self.progress_interval_ms == 0 {
			return Err(ValidationError::setting("progressIntervalMs", "must be greater than 0"));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_validate_max_workers() {
		assert!(validate_max_workers(1).is_ok());
		assert!(validate_max_workers(64).is_ok());
		assert!(validate_max_workers(0).unwrap_err().to_string().contains("at least 1"));
		assert!(validate_max_workers(5000).is_err());
	}

	#[test]
	fn test_validate_compress_level() {
		assert!(validate_compress_level(1).is_ok());
		assert!(validate_compress_level(5).is_ok());
		assert!(validate_compress_level(9).is_ok());
		assert!(validate_compress_level(0).is_err());
		assert!(validate_compress_level(10).is_err());
	}

	#[test]
	fn test_validate_manifest_name() {
		assert!(validate_manifest_name("fastdownload.txt").is_ok());
		assert!(validate_manifest_name("").is_err());
		assert!(validate_manifest_name("../manifest.txt").is_err());
	}

	#[test]
	fn test_default_config_is_valid() {
		assert!(Config::default().validate().is_ok());
		let bad = Config { max_workers: 0, ..Default::default() };
		assert!(bad.validate().is_err());
	}
}
