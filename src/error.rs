//! Error types for FastDL sync operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Main error type for sync sessions
///
/// Only configuration-level problems surface as a `SyncError` from a session.
/// Failures of individual files are reported as [`TransformError`]s through the
/// event surface and never abort the run.
#[derive(Debug)]
pub enum SyncError {
	/// Invalid configuration (missing roots, bad limits, overlapping trees)
	InvalidConfig { message: String },

	/// A source path was handed to the mapper that is not below the source root
	PathOutsideRoot { path: PathBuf, root: PathBuf },

	/// Exclude list could not be read
	ExcludeList { path: PathBuf, source: io::Error },

	/// Manifest exists but could not be read
	Manifest { path: PathBuf, source: io::Error },

	/// Manifest could not be written at the end of a session
	ManifestWrite { path: PathBuf, source: io::Error },

	/// I/O error
	Io(io::Error),

	/// A blocking phase or worker task panicked or was aborted
	Task { message: String },

	/// Generic error message
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::PathOutsideRoot { path, root } => {
				write!(f, "Path {} is not below source root {}", path.display(), root.display())
			}
			SyncError::ExcludeList { path, source } => {
				write!(f, "Cannot read exclude list {}: {}", path.display(), source)
			}
			SyncError::Manifest { path, source } => {
				write!(f, "Cannot read manifest {}: {}", path.display(), source)
			}
			SyncError::ManifestWrite { path, source } => {
				write!(f, "Cannot write manifest {}: {}", path.display(), source)
			}
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::Task { message } => write!(f, "Task failed: {}", message),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			SyncError::ExcludeList { source, .. } => Some(source),
			SyncError::Manifest { source, .. } => Some(source),
			SyncError::ManifestWrite { source, .. } => Some(source),
			SyncError::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

impl From<tokio::task::JoinError> for SyncError {
	fn from(e: tokio::task::JoinError) -> Self {
		SyncError::Task { message: e.to_string() }
	}
}

impl From<crate::validation::ValidationError> for SyncError {
	fn from(e: crate::validation::ValidationError) -> Self {
		SyncError::InvalidConfig { message: e.to_string() }
	}
}

impl From<ConfigError> for SyncError {
	fn from(e: ConfigError) -> Self {
		SyncError::InvalidConfig { message: e.to_string() }
	}
}

impl SyncError {
	/// True for errors that are raised before the session touches the disk
	pub fn is_config_error(&self) -> bool {
		matches!(
			self,
			SyncError::InvalidConfig { .. }
				| SyncError::ExcludeList { .. }
				| SyncError::Manifest { .. }
				| SyncError::PathOutsideRoot { .. }
		)
	}
}

/// Which step of a file transformation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOp {
	CreateDir,
	Read,
	Write,
	Metadata,
	Rename,
}

impl fmt::Display for TransformOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransformOp::CreateDir => write!(f, "create directory"),
			TransformOp::Read => write!(f, "read"),
			TransformOp::Write => write!(f, "write"),
			TransformOp::Metadata => write!(f, "preserve metadata"),
			TransformOp::Rename => write!(f, "rename"),
		}
	}
}

/// Per-file failure of a compress or copy job
#[derive(Debug)]
pub struct TransformError {
	pub path: PathBuf,
	pub op: TransformOp,
	pub source: io::Error,
}

impl TransformError {
	pub fn new(path: impl Into<PathBuf>, op: TransformOp, source: io::Error) -> Self {
		TransformError { path: path.into(), op, source }
	}
}

impl fmt::Display for TransformError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Failed to {} {}: {}", self.op, self.path.display(), self.source)
	}
}

impl Error for TransformError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		Some(&self.source)
	}
}

/// Config file loading errors
#[derive(Debug)]
pub enum ConfigError {
	/// Failed to read the config file
	Read { path: PathBuf, source: io::Error },

	/// Failed to parse the config file
	Parse { path: PathBuf, message: String },

	/// Unknown config file extension
	UnsupportedFormat { path: PathBuf },

	/// An environment override had an unparseable value
	InvalidEnv { var: String, value: String },
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::Read { path, source } => {
				write!(f, "Cannot read config {}: {}", path.display(), source)
			}
			ConfigError::Parse { path, message } => {
				write!(f, "Cannot parse config {}: {}", path.display(), message)
			}
			ConfigError::UnsupportedFormat { path } => {
				write!(f, "Unsupported config format: {} (use .toml, .json or .json5)", path.display())
			}
			ConfigError::InvalidEnv { var, value } => {
				write!(f, "Invalid value for {}: {:?}", var, value)
			}
		}
	}
}

impl Error for ConfigError {}


// vim: ts=4
