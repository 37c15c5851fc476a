//! Per-file work: bzip2-compress or copy a source file into the FastDL tree
//!
//! Output is written to a temporary sibling (`*.fastdl-tmp`) and renamed over
//! the destination once complete, so a crashed or failed job never leaves a
//! truncated file under the real name.

use bzip2::write::BzEncoder;
use bzip2::Compression;
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::callbacks::{SyncEvent, SyncEventHandler};
use crate::error::{TransformError, TransformOp};
use crate::types::{SyncJob, SyncMode, TEMP_SUFFIX};

/// Compression level used when none is configured (1 = fastest, 9 = best)
pub const DEFAULT_COMPRESS_LEVEL: u32 = 5;

const BUFFER_SIZE: usize = 64 * 1024;

/// A strategy for turning one source file into its destination file
pub trait FileTransformer: Send + Sync {
	/// Human readable description of the job ("Compressing: de_dust.bsp")
	fn label(&self, job: &SyncJob) -> String;

	/// Do the work; no events
	fn transform(&self, job: &SyncJob) -> Result<(), TransformError>;

	/// Run a job with lifecycle events.
	///
	/// `JobStarted` is emitted before the work and `JobFinished` after it,
	/// whatever the outcome; failures additionally emit `JobFailed`.
	fn run(&self, job: &SyncJob, events: &dyn SyncEventHandler) -> Result<(), TransformError> {
		events.on_event(SyncEvent::JobStarted {
			label: self.label(job),
			path: job.source_path.clone(),
		});

		let result = self.transform(job);
		if let Err(ref e) = result {
			warn!("Failed to sync {}: {}", job.source_path.display(), e);
			events.on_event(SyncEvent::JobFailed {
				path: job.source_path.clone(),
				message: e.to_string(),
			});
		}

		events.on_event(SyncEvent::JobFinished { path: job.source_path.clone() });
		result
	}
}

/// Pick the transformer for a sync mode
pub fn for_mode(mode: SyncMode, compress_level: u32) -> Arc<dyn FileTransformer> {
	if mode.compressed {
		Arc::new(CompressTransformer::new(compress_level))
	} else {
		Arc::new(CopyTransformer)
	}
}

/// Streams the source through a bzip2 encoder
#[derive(Debug, Clone)]
pub struct CompressTransformer {
	level: u32,
}

impl CompressTransformer {
	pub fn new(level: u32) -> Self {
		CompressTransformer { level: level.clamp(1, 9) }
	}

	pub fn level(&self) -> u32 {
		self.level
	}

	fn compress_into(&self, source: &Path, tmp: &Path) -> Result<(), TransformError> {
		let input = File::open(source).map_err(|e| TransformError::new(source, TransformOp::Read, e))?;
		let output = File::create(tmp).map_err(|e| TransformError::new(tmp, TransformOp::Write, e))?;

		let mut reader = BufReader::new(input);
		let mut encoder = BzEncoder::new(BufWriter::new(output), Compression::new(self.level));
		let mut buf = vec![0u8; BUFFER_SIZE];

		loop {
			let n = reader.read(&mut buf).map_err(|e| TransformError::new(source, TransformOp::Read, e))?;
			if n == 0 {
				break;
			}
			encoder
				.write_all(&buf[..n])
				.map_err(|e| TransformError::new(tmp, TransformOp::Write, e))?;
		}

		let writer = encoder.finish().map_err(|e| TransformError::new(tmp, TransformOp::Write, e))?;
		writer
			.into_inner()
			.map_err(|e| TransformError::new(tmp, TransformOp::Write, e.into_error()))?;
		Ok(())
	}
}

impl Default for CompressTransformer {
	fn default() -> Self {
		Self::new(DEFAULT_COMPRESS_LEVEL)
	}
}

impl FileTransformer for CompressTransformer {
	fn label(&self, job: &SyncJob) -> String {
		format!("Compressing: {}", file_name(&job.source_path))
	}

	fn transform(&self, job: &SyncJob) -> Result<(), TransformError> {
		ensure_dir(&job.dest_dir)?;
		let tmp = temp_path(&job.dest_path);
		let result = self.compress_into(&job.source_path, &tmp).and_then(|()| commit(&tmp, &job.dest_path));
		if result.is_err() {
			discard(&tmp);
		}
		result
	}
}

/// Plain copy preserving permissions and timestamps
#[derive(Debug, Clone, Default)]
pub struct CopyTransformer;

impl CopyTransformer {
	fn copy_into(source: &Path, tmp: &Path) -> Result<(), TransformError> {
		let meta =
			fs::metadata(source).map_err(|e| TransformError::new(source, TransformOp::Read, e))?;

		// fs::copy carries the permission bits over
		fs::copy(source, tmp).map_err(|e| TransformError::new(tmp, TransformOp::Write, e))?;

		filetime::set_file_times(
			tmp,
			FileTime::from_last_access_time(&meta),
			FileTime::from_last_modification_time(&meta),
		)
		.map_err(|e| TransformError::new(tmp, TransformOp::Metadata, e))
	}
}

impl FileTransformer for CopyTransformer {
	fn label(&self, job: &SyncJob) -> String {
		format!("Copying: {}", file_name(&job.source_path))
	}

	fn transform(&self, job: &SyncJob) -> Result<(), TransformError> {
		ensure_dir(&job.dest_dir)?;
		let tmp = temp_path(&job.dest_path);
		let result = Self::copy_into(&job.source_path, &tmp).and_then(|()| commit(&tmp, &job.dest_path));
		if result.is_err() {
			discard(&tmp);
		}
		result
	}
}

/// Temporary sibling used while a destination file is being written
pub fn temp_path(dest: &Path) -> PathBuf {
	let mut s = dest.as_os_str().to_os_string();
	s.push(TEMP_SUFFIX);
	PathBuf::from(s)
}

fn ensure_dir(dir: &Path) -> Result<(), TransformError> {
	if dir.is_dir() {
		return Ok(());
	}
	fs::create_dir_all(dir).map_err(|e| TransformError::new(dir, TransformOp::CreateDir, e))
}

fn commit(tmp: &Path, dest: &Path) -> Result<(), TransformError> {
	fs::rename(tmp, dest).map_err(|e| TransformError::new(dest, TransformOp::Rename, e))?;
	debug!("Wrote {}", dest.display());
	Ok(())
}

fn discard(tmp: &Path) {
	if let Err(e) = fs::remove_file(tmp) {
		if e.kind() != std::io::ErrorKind::NotFound {
			debug!("Could not remove temp file {}: {}", tmp.display(), e);
		}
	}
}

fn file_name(path: &Path) -> String {
	path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use bzip2::read::BzDecoder;
	use std::sync::Mutex;
	use tempfile::TempDir;

	fn job_in(src: &TempDir, dst: &TempDir, rel: &str, suffix: &str) -> SyncJob {
		let dest_path = dst.path().join(format!("{}{}", rel, suffix));
		SyncJob {
			source_path: src.path().join(rel),
			dest_dir: dest_path.parent().unwrap().to_path_buf(),
			dest_path,
		}
	}

	#[test]
	fn test_compress_creates_dir_and_decodes() {
		let src = TempDir::new().unwrap();
		let dst = TempDir::new().unwrap();
		fs::create_dir_all(src.path().join("maps")).unwrap();
		let content = b"VBSP map data ".repeat(1000);
		fs::write(src.path().join("maps/de_dust.bsp"), &content).unwrap();

		let job = job_in(&src, &dst, "maps/de_dust.bsp", ".bz2");
		CompressTransformer::default().transform(&job).unwrap();

		let mut decoded = Vec::new();
		BzDecoder::new(File::open(&job.dest_path).unwrap()).read_to_end(&mut decoded).unwrap();
		assert_eq!(decoded, content);
		assert!(!temp_path(&job.dest_path).exists());
	}

	#[test]
	fn test_copy_preserves_mtime() {
		let src = TempDir::new().unwrap();
		let dst = TempDir::new().unwrap();
		fs::write(src.path().join("logo.vtf"), b"texture").unwrap();
		let mtime = FileTime::from_unix_time(1_500_000_000, 0);
		filetime::set_file_mtime(src.path().join("logo.vtf"), mtime).unwrap();

		let job = job_in(&src, &dst, "logo.vtf", "");
		CopyTransformer.transform(&job).unwrap();

		assert_eq!(fs::read(&job.dest_path).unwrap(), b"texture");
		let meta = fs::metadata(&job.dest_path).unwrap();
		assert_eq!(FileTime::from_last_modification_time(&meta), mtime);
	}

	#[test]
	fn test_missing_source_reports_read_error() {
		let src = TempDir::new().unwrap();
		let dst = TempDir::new().unwrap();
		let job = job_in(&src, &dst, "gone.bsp", ".bz2");

		let err = CompressTransformer::default().transform(&job).unwrap_err();
		assert_eq!(err.op, TransformOp::Read);
		assert!(!job.dest_path.exists());
		assert!(!temp_path(&job.dest_path).exists());

		let err = CopyTransformer.transform(&job_in(&src, &dst, "gone.bsp", "")).unwrap_err();
		assert_eq!(err.op, TransformOp::Read);
	}

	#[test]
	fn test_run_emits_started_failed_finished() {
		let src = TempDir::new().unwrap();
		let dst = TempDir::new().unwrap();
		let job = job_in(&src, &dst, "gone.bsp", "");

		let seen = Arc::new(Mutex::new(Vec::new()));
		let s = seen.clone();
		let handler = move |e: SyncEvent| {
			let tag = match e {
				SyncEvent::JobStarted { .. } => "started",
				SyncEvent::JobFailed { .. } => "failed",
				SyncEvent::JobFinished { .. } => "finished",
				_ => "other",
			};
			s.lock().unwrap().push(tag);
		};

		assert!(CopyTransformer.run(&job, &handler).is_err());
		assert_eq!(*seen.lock().unwrap(), vec!["started", "failed", "finished"]);
	}

	#[test]
	fn test_labels_and_level() {
		let job = SyncJob {
			source_path: PathBuf::from("/srv/maps/de_dust.bsp"),
			dest_path: PathBuf::from("/fastdl/maps/de_dust.bsp.bz2"),
			dest_dir: PathBuf::from("/fastdl/maps"),
		};
		assert_eq!(CompressTransformer::default().label(&job), "Compressing: de_dust.bsp");
		assert_eq!(CopyTransformer.label(&job), "Copying: de_dust.bsp");
		assert_eq!(CompressTransformer::new(42).level(), 9);
		assert_eq!(CompressTransformer::new(0).level(), 1);
	}
}
