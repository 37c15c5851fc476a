//! Shared data types for a sync session

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Suffix appended to every destination file in compressed mode; also the
/// extension (with leading dot) that marks a compressed destination file
pub const COMPRESSED_SUFFIX: &str = ".bz2";

/// Suffix for in-flight transformer output, renamed into place when complete
pub const TEMP_SUFFIX: &str = ".fastdl-tmp";

/// Default manifest file name, stored inside the source root
pub const MANIFEST_NAME: &str = "fastdownload.txt";

/// Whether destination files are bzip2-compressed or raw copies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMode {
	pub compressed: bool,
}

impl SyncMode {
	pub fn compressed() -> Self {
		SyncMode { compressed: true }
	}

	pub fn raw() -> Self {
		SyncMode { compressed: false }
	}

	/// Suffix appended to mapped destination paths
	pub fn suffix(&self) -> &'static str {
		if self.compressed {
			COMPRESSED_SUFFIX
		} else {
			""
		}
	}

	/// Does a destination file with this extension belong to the other mode?
	///
	/// Files without an extension are never considered foreign.
	pub fn is_foreign_extension(&self, ext: Option<&str>) -> bool {
		match ext {
			None => false,
			Some(ext) => {
				let is_bz2 = ext.eq_ignore_ascii_case(COMPRESSED_SUFFIX);
				if self.compressed {
					!is_bz2
				} else {
					is_bz2
				}
			}
		}
	}
}

impl std::fmt::Display for SyncMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.compressed {
			write!(f, "bzip2")
		} else {
			write!(f, "raw")
		}
	}
}

/// One unit of work: transform `source_path` into `dest_path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
	pub source_path: PathBuf,
	pub dest_path: PathBuf,
	pub dest_dir: PathBuf,
}

/// Phases of a sync session, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
	Idle,
	CleaningUp,
	Scanning,
	Dispatching,
	Draining,
	Completed,
}

impl SyncPhase {
	/// The phase that follows this one (Completed is terminal)
	pub fn next(self) -> SyncPhase {
		match self {
			SyncPhase::Idle => SyncPhase::CleaningUp,
			SyncPhase::CleaningUp => SyncPhase::Scanning,
			SyncPhase::Scanning => SyncPhase::Dispatching,
			SyncPhase::Dispatching => SyncPhase::Draining,
			SyncPhase::Draining => SyncPhase::Completed,
			SyncPhase::Completed => SyncPhase::Completed,
		}
	}
}

/// Outcome of a sync session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
	pub session_id: Uuid,
	pub files_queued: usize,
	pub files_synced: usize,
	pub files_failed: usize,
	pub files_up_to_date: usize,
	pub files_excluded: usize,
	/// Sources skipped because a differently-cased source owns the destination
	pub case_collisions: usize,
	pub stale_replaced: usize,
	pub orphans_removed: usize,
	pub artifacts_removed: usize,
	pub manifest_entries: usize,
	pub cancelled: bool,
	#[serde(with = "duration_millis")]
	pub elapsed: Duration,
}

mod duration_millis {
	use serde::Serializer;
	use std::time::Duration;

	pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
		s.serialize_u64(d.as_millis() as u64)
	}
}
