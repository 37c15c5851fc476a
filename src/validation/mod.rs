//! Pre-flight checks run before a session deletes or writes anything
//!
//! Settings are checked through [`Validator`], the source and destination
//! roots through the functions in [`path`]. Every failure ends up as
//! [`crate::error::SyncError::InvalidConfig`], which the CLI maps to exit code 2.

use std::error::Error;
use std::fmt;

pub mod config;
pub mod path;

pub use config::*;
pub use path::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
	/// A setting is out of range; `key` is its camelCase config name
	Setting { key: &'static str, reason: String },
	/// Source or destination root is unusable
	Root(String),
}

impl ValidationError {
	pub fn setting(key: &'static str, reason: impl Into<String>) -> Self {
		ValidationError::Setting { key, reason: reason.into() }
	}

	/// Config key at fault, if the error is about a setting
	pub fn key(&self) -> Option<&'static str> {
		match self {
			ValidationError::Setting { key, .. } => Some(*key),
			ValidationError::Root(_) => None,
		}
	}
}

impl fmt::Display for ValidationError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ValidationError::Setting { key, reason } => write!(f, "Invalid setting {}: {}", key, reason),
			ValidationError::Root(reason) => write!(f, "Invalid sync root: {}", reason),
		}
	}
}

impl Error for ValidationError {}

/// Settings that can be checked without touching the filesystem
pub trait Validator {
	fn validate(&self) -> Result<(), ValidationError>;
}


// vim: ts=4
