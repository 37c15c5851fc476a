//! FastDL manifest: the record of which source files are mirrored
//!
//! The manifest is a plain text file (`fastdownload.txt` in the source root),
//! one absolute source path per line. It is read when a session starts,
//! reconciled against the source tree, extended with every file queued during
//! the scan and rewritten when the session ends.
//!
//! **Reconciliation is destructive**: for every entry whose source file is
//! gone, both the raw and the `.bz2` destination files are deleted. This is
//! how content removed from the game server disappears from the FastDL tree.

use std::collections::HashSet;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::callbacks::{SyncEvent, SyncEventHandler};
use crate::error::SyncError;
use crate::mapping::{path_key, PathMapper};
use crate::types::TEMP_SUFFIX;

/// Ordered, deduplicated set of source paths
///
/// Entries keep the path as found on disk; uniqueness is decided on the
/// normalized key so differently-cased spellings collapse into one entry.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
	entries: Vec<PathBuf>,
	keys: HashSet<String>,
}

impl Manifest {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert a path; returns false if an equivalent path was already present
	pub fn insert(&mut self, path: impl Into<PathBuf>) -> bool {
		let path = path.into();
		if !self.keys.insert(path_key(&path)) {
			return false;
		}
		self.entries.push(path);
		true
	}

	pub fn contains(&self, path: &Path) -> bool {
		self.keys.contains(&path_key(path))
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Path> {
		self.entries.iter().map(PathBuf::as_path)
	}

	/// Add every path, skipping duplicates; returns how many were new
	pub fn append<I, P>(&mut self, paths: I) -> usize
	where
		I: IntoIterator<Item = P>,
		P: Into<PathBuf>,
	{
		let mut added = 0;
		for path in paths {
			if self.insert(path) {
				added += 1;
			}
		}
		added
	}
}

impl<P: Into<PathBuf>> FromIterator<P> for Manifest {
	fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
		let mut manifest = Manifest::new();
		manifest.append(iter);
		manifest
	}
}

/// Outcome of [`ManifestStore::reconcile`]
#[derive(Debug, Default)]
pub struct ReconcileResult {
	/// Entries whose source file still exists
	pub kept: Manifest,
	/// Destination files that were deleted
	pub removed_dest_paths: Vec<PathBuf>,
	/// Entries dropped because their source is gone or unmappable
	pub dropped: Vec<PathBuf>,
}

/// Reads and writes the manifest file
#[derive(Debug, Clone)]
pub struct ManifestStore {
	path: PathBuf,
}

impl ManifestStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		ManifestStore { path: path.into() }
	}

	/// Manifest stored as `name` inside the source root
	pub fn in_source_root(source_root: &Path, name: &str) -> Self {
		Self::new(source_root.join(name))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Load the manifest; a missing file yields an empty manifest
	pub fn load(&self) -> Result<Manifest, SyncError> {
		let contents = match fs::read_to_string(&self.path) {
			Ok(c) => c,
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				debug!("No manifest at {}, starting empty", self.path.display());
				return Ok(Manifest::new());
			}
			Err(source) => return Err(SyncError::Manifest { path: self.path.clone(), source }),
		};

		let manifest: Manifest =
			contents.lines().map(str::trim).filter(|l| !l.is_empty()).map(PathBuf::from).collect();
		info!("Loaded manifest {} ({} entries)", self.path.display(), manifest.len());
		Ok(manifest)
	}

	/// Drop entries whose source is gone and delete their destination files.
	///
	/// Both the raw and the compressed destination are removed because the
	/// sync mode may have changed since the entry was written. Failed
	/// deletions are reported as [`SyncEvent::Error`] and do not stop the pass.
	pub fn reconcile(
		manifest: Manifest,
		mapper: &PathMapper,
		events: &dyn SyncEventHandler,
	) -> ReconcileResult {
		let mut result = ReconcileResult::default();

		for source in manifest.entries {
			if source.is_file() {
				result.kept.insert(source);
				continue;
			}

			let variants = match mapper.variants(&source) {
				Ok(v) => v,
				Err(e) => {
					warn!("Dropping manifest entry {}: {}", source.display(), e);
					result.dropped.push(source);
					continue;
				}
			};

			info!("Source removed, deleting from FastDL: {}", source.display());
			for dest in variants {
				if !dest.is_file() {
					continue;
				}
				match fs::remove_file(&dest) {
					Ok(()) => {
						events.on_event(SyncEvent::OrphanRemoved { path: dest.clone() });
						result.removed_dest_paths.push(dest);
					}
					Err(e) if e.kind() == io::ErrorKind::NotFound => {
						debug!("Orphan already gone: {}", dest.display());
					}
					Err(e) => {
						warn!("Failed to delete orphan {}: {}", dest.display(), e);
						events.on_event(SyncEvent::Error {
							message: format!("Failed to delete {}: {}", dest.display(), e),
						});
					}
				}
			}
			result.dropped.push(source);
		}

		result
	}

	/// Overwrite the manifest file, one path per line.
	///
	/// Written to a temporary sibling first and renamed into place.
	pub fn persist(&self, manifest: &Manifest) -> Result<(), SyncError> {
		let wrap = |source: io::Error| SyncError::ManifestWrite { path: self.path.clone(), source };

		let mut tmp = self.path.clone().into_os_string();
		tmp.push(TEMP_SUFFIX);
		let tmp = PathBuf::from(tmp);

		let write = || -> io::Result<()> {
			let mut out = BufWriter::new(fs::File::create(&tmp)?);
			for entry in manifest.iter() {
				writeln!(out, "{}", entry.to_string_lossy())?;
			}
			out.into_inner().map_err(|e| e.into_error())?.sync_all()
		};

		if let Err(e) = write() {
			let _ = fs::remove_file(&tmp);
			return Err(wrap(e));
		}
		fs::rename(&tmp, &self.path).map_err(wrap)?;

		info!("Wrote manifest {} ({} entries)", self.path.display(), manifest.len());
		Ok(())
	}
}
