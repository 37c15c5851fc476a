//! Blocking filesystem passes of a session: cleanup, reconcile and scan
//!
//! These run on tokio's blocking pool; they walk whole trees with `walkdir`
//! and must not be called from an async context directly.

use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

use super::state::SyncSession;
use crate::callbacks::SyncEvent;
use crate::logging::*;
use crate::manifest::ManifestStore;
use crate::types::{SyncJob, TEMP_SUFFIX};

/// How a destination file compares to its source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Freshness {
	/// No destination file yet
	Missing,
	/// Destination is at least as new as the source
	UpToDate,
	/// Source was modified after the destination was written
	Stale,
}

/// Compare modification times; only a strictly newer source is stale
pub(super) fn freshness(source: &Path, dest: &Path) -> io::Result<Freshness> {
	let dest_meta = match fs::metadata(dest) {
		Ok(m) => m,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Freshness::Missing),
		Err(e) => return Err(e),
	};
	let source_mtime = fs::metadata(source)?.modified()?;
	if source_mtime > dest_meta.modified()? {
		Ok(Freshness::Stale)
	} else {
		Ok(Freshness::UpToDate)
	}
}

/// Extension of the file name with its leading dot (`.bsp`), if any
fn dotted_extension(path: &Path) -> Option<String> {
	path.extension().map(|e| e.to_string_lossy()).filter(|e| !e.is_empty()).map(|e| format!(".{}", e))
}

impl SyncSession {
	/// Delete destination files that belong to the other sync mode.
	///
	/// Also removes `*.fastdl-tmp` leftovers of interrupted jobs. Files
	/// without an extension are never touched.
	pub(super) fn remove_foreign_artifacts(&mut self) {
		let root = self.mapper.dest_root().to_path_buf();
		let mode = self.mapper.mode();
		if mode.compressed {
			info!("Compressed mode: removing raw files from {}", root.display());
		} else {
			info!("Raw mode: removing .bz2 files from {}", root.display());
		}

		for entry in WalkDir::new(&root).min_depth(1) {
			let entry = match entry {
				Ok(e) => e,
				Err(e) => {
					self.report(format!("Cannot read destination entry: {}", e));
					continue;
				}
			};
			if entry.file_type().is_dir() {
				continue;
			}

			let path = entry.path();
			let is_temp = entry.file_name().to_string_lossy().ends_with(TEMP_SUFFIX);
			if !is_temp && !mode.is_foreign_extension(dotted_extension(path).as_deref()) {
				continue;
			}

			match fs::remove_file(path) {
				Ok(()) => {
					debug!("Removed {}", path.display());
					self.summary.artifacts_removed += 1;
					self.emit(SyncEvent::ArtifactRemoved { path: path.to_path_buf() });
				}
				Err(e) => self.report(format!("Failed to delete {}: {}", path.display(), e)),
			}
		}
	}

	/// Drop manifest entries whose source is gone, deleting their destinations
	pub(super) fn reconcile_manifest(&mut self) {
		let manifest = std::mem::take(&mut self.manifest);
		let before = manifest.len();
		let result = ManifestStore::reconcile(manifest, &self.mapper, self.events.as_ref());

		self.summary.orphans_removed += result.removed_dest_paths.len();
		self.manifest = result.kept;
		info!(
			"Manifest reconciled: {} of {} entries kept, {} destination files removed",
			self.manifest.len(),
			before,
			result.removed_dest_paths.len()
		);
	}

	/// Walk the source tree and collect every file that needs syncing.
	///
	/// Stale destinations are deleted here, before their job is queued.
	/// Destination directories are created as files are found. The walk is
	/// sorted, so jobs come out in a stable order.
	pub(super) fn scan_source(&mut self) -> Vec<SyncJob> {
		let root = self.mapper.source_root().to_path_buf();
		let manifest_path = self.store.path().to_path_buf();
		let mut jobs = Vec::new();

		for entry in WalkDir::new(&root).min_depth(1).sort_by_file_name() {
			if self.is_cancelled() {
				break;
			}

			let entry = match entry {
				Ok(e) => e,
				Err(e) => {
					self.report(format!("Cannot read source entry: {}", e));
					continue;
				}
			};
			let file_type = entry.file_type();
			let is_file = file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
			if !is_file || entry.path() == manifest_path {
				continue;
			}

			if let Some(job) = self.consider(entry.path()) {
				self.emit(SyncEvent::FileQueued { path: job.source_path.clone() });
				jobs.push(job);
			}
		}

		self.summary.files_queued = jobs.len();
		info!(
			"Scan found {} files to sync ({} up to date, {} excluded)",
			jobs.len(),
			self.summary.files_up_to_date,
			self.summary.files_excluded
		);
		jobs
	}

	/// Decide whether one source file becomes a job
	fn consider(&mut self, source: &Path) -> Option<SyncJob> {
		let mapped = match self.mapper.map(source) {
			Ok(m) => m,
			Err(e) => {
				self.report(e.to_string());
				return None;
			}
		};

		if let Some(reason) = self.exclude.match_reason(&mapped.relative_path) {
			debug!("Excluded {} ({:?})", mapped.relative_path, reason);
			self.summary.files_excluded += 1;
			return None;
		}

		// sources differing only in case share one destination; the first in walk order owns it
		if let Some(owner) = self.claimed.get(&mapped.relative_path) {
			let message = format!(
				"Skipping {}: {} already maps to {}",
				source.display(),
				owner.display(),
				mapped.dest_path.display()
			);
			self.summary.case_collisions += 1;
			self.report(message);
			return None;
		}
		self.claimed.insert(mapped.relative_path.clone(), source.to_path_buf());

		if let Err(e) = fs::create_dir_all(&mapped.dest_dir) {
			self.report(format!("Cannot create {}: {}", mapped.dest_dir.display(), e));
			return None;
		}

		match freshness(source, &mapped.dest_path) {
			Ok(Freshness::Missing) => {}
			Ok(Freshness::UpToDate) => {
				self.summary.files_up_to_date += 1;
				return None;
			}
			Ok(Freshness::Stale) => {
				info!("Newer file detected: {}", source.display());
				if let Err(e) = fs::remove_file(&mapped.dest_path) {
					self.report(format!("Failed to delete {}: {}", mapped.dest_path.display(), e));
					return None;
				}
				self.summary.stale_replaced += 1;
				self.emit(SyncEvent::StaleFileRemoved { path: mapped.dest_path.clone() });
			}
			Err(e) => {
				self.report(format!("Cannot compare {}: {}", source.display(), e));
				return None;
			}
		}

		Some(SyncJob { source_path: source.to_path_buf(), dest_path: mapped.dest_path, dest_dir: mapped.dest_dir })
	}
}


// vim: ts=4
