//! Library API tests: SyncBuilder, event delivery and runtime control
//!
//! This test suite covers:
//! - Hook-style callbacks and the broadcast event channel
//! - Phase ordering as seen by a listener
//! - Cancellation and changing the worker limit while a session runs
//! - Per-file failures that do not stop the session

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use fastdl::error::{TransformError, TransformOp};
use fastdl::{
	CallbackBuilder, ChannelEvents, FileTransformer, SyncBuilder, SyncEvent, SyncJob, SyncPhase,
};

// ============================================================================
// Helper Functions for Test Setup
// ============================================================================

fn create_test_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
	let file_path = dir.join(name);
	fs::create_dir_all(file_path.parent().unwrap()).unwrap();
	fs::write(&file_path, content).unwrap();
	file_path
}

fn create_maps(dir: &Path, count: usize) {
	for i in 0..count {
		create_test_file(dir, &format!("maps/map{:02}.bsp", i), b"map");
	}
}

/// Writes a marker file slowly and tracks how many run at once
struct SlowWriter {
	delay: Duration,
	active: AtomicUsize,
	peak: AtomicUsize,
	fail_on: Option<&'static str>,
}

impl SlowWriter {
	fn new(delay: Duration) -> Self {
		SlowWriter { delay, active: AtomicUsize::new(0), peak: AtomicUsize::new(0), fail_on: None }
	}
}

impl FileTransformer for SlowWriter {
	fn label(&self, job: &SyncJob) -> String {
		format!("Writing: {}", job.source_path.display())
	}

	fn transform(&self, job: &SyncJob) -> Result<(), TransformError> {
		let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
		self.peak.fetch_max(now, Ordering::SeqCst);
		std::thread::sleep(self.delay);
		self.active.fetch_sub(1, Ordering::SeqCst);

		if let Some(name) = self.fail_on {
			if job.source_path.ends_with(name) {
				return Err(TransformError::new(
					&job.dest_path,
					TransformOp::Write,
					std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
				));
			}
		}
		fs::write(&job.dest_path, b"out").map_err(|e| TransformError::new(&job.dest_path, TransformOp::Write, e))
	}
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_callback_builder_hooks() {
	let src = TempDir::new().unwrap();
	let dst = TempDir::new().unwrap();
	create_maps(src.path(), 3);

	let started = Arc::new(Mutex::new(Vec::new()));
	let queued = Arc::new(AtomicUsize::new(0));
	let max = Arc::new(AtomicUsize::new(0));
	let completed = Arc::new(AtomicUsize::new(0));

	let (s, q, m, c) = (started.clone(), queued.clone(), max.clone(), completed.clone());
	let events = CallbackBuilder::new()
		.on_job_started(move |label| s.lock().unwrap().push(label.to_string()))
		.on_file_queued(move |_| {
			q.fetch_add(1, Ordering::SeqCst);
		})
		.on_progress_max(move |n| m.store(n, Ordering::SeqCst))
		.on_session_completed(move |summary| c.store(summary.files_synced, Ordering::SeqCst))
		.build();

	SyncBuilder::new()
		.source(src.path())
		.destination(dst.path())
		.events(events)
		.sync()
		.await
		.expect("Sync should succeed");

	let mut labels = started.lock().unwrap().clone();
	labels.sort();
	assert_eq!(labels, vec!["Compressing: map00.bsp", "Compressing: map01.bsp", "Compressing: map02.bsp"]);
	assert_eq!(queued.load(Ordering::SeqCst), 3);
	assert_eq!(max.load(Ordering::SeqCst), 3);
	assert_eq!(completed.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_channel_sees_phases_in_order() {
	let src = TempDir::new().unwrap();
	let dst = TempDir::new().unwrap();
	create_maps(src.path(), 2);

	let (channel, mut rx) = ChannelEvents::new(1024);
	let summary = SyncBuilder::new()
		.source(src.path())
		.destination(dst.path())
		.compress(false)
		.events(Arc::new(channel))
		.sync()
		.await
		.unwrap();

	let mut events = Vec::new();
	while let Ok(event) = rx.try_recv() {
		events.push(event);
	}

	let phases: Vec<SyncPhase> = events
		.iter()
		.filter_map(|e| match e {
			SyncEvent::PhaseChanged { phase } => Some(*phase),
			_ => None,
		})
		.collect();
	assert_eq!(
		phases,
		vec![
			SyncPhase::CleaningUp,
			SyncPhase::Scanning,
			SyncPhase::Dispatching,
			SyncPhase::Draining,
			SyncPhase::Completed
		]
	);

	match events.last() {
		Some(SyncEvent::SessionCompleted { summary: s }) => assert_eq!(s, &summary),
		other => panic!("expected SessionCompleted last, got {:?}", other),
	}
	assert!(events.iter().any(|e| matches!(e, SyncEvent::ActiveCountChanged { active: 0 })));
}

// ============================================================================
// Runtime control
// ============================================================================

#[tokio::test]
async fn test_session_cancelled_before_start_touches_nothing() {
	let src = TempDir::new().unwrap();
	let dst = TempDir::new().unwrap();
	create_maps(src.path(), 5);
	// a raw file is foreign in compressed mode and would be cleaned up
	create_test_file(dst.path(), "maps/raw.bsp", b"raw");
	create_test_file(dst.path(), "maps/gone.bsp.bz2", b"orphan");
	fs::write(src.path().join("fastdownload.txt"), format!("{}\n", src.path().join("maps/gone.bsp").display()))
		.unwrap();

	let token = CancellationToken::new();
	token.cancel();

	let summary = SyncBuilder::new()
		.source(src.path())
		.destination(dst.path())
		.cancel_token(token)
		.sync()
		.await
		.unwrap();

	assert!(summary.cancelled);
	assert_eq!(summary.files_queued, 0);
	assert_eq!(summary.artifacts_removed, 0);
	assert_eq!(summary.orphans_removed, 0);
	assert!(dst.path().join("maps/raw.bsp").exists());
	assert!(dst.path().join("maps/gone.bsp.bz2").exists());
	assert!(!dst.path().join("maps/map00.bsp.bz2").exists());

	// the manifest is left exactly as it was
	let manifest = fs::read_to_string(src.path().join("fastdownload.txt")).unwrap();
	assert!(manifest.contains("gone.bsp"));
	assert_eq!(manifest.lines().count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_worker_limit_respected() {
	let src = TempDir::new().unwrap();
	let dst = TempDir::new().unwrap();
	create_maps(src.path(), 6);

	let writer = Arc::new(SlowWriter::new(Duration::from_millis(30)));
	SyncBuilder::new()
		.source(src.path())
		.destination(dst.path())
		.max_workers(2)
		.transformer(writer.clone())
		.sync()
		.await
		.unwrap();

	assert!(writer.peak.load(Ordering::SeqCst) <= 2);
	assert_eq!(fs::read_dir(dst.path().join("maps")).unwrap().count(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_raise_worker_limit_while_running() {
	let src = TempDir::new().unwrap();
	let dst = TempDir::new().unwrap();
	create_maps(src.path(), 8);

	let writer = Arc::new(SlowWriter::new(Duration::from_millis(60)));
	let orchestrator = Arc::new(
		SyncBuilder::new()
			.source(src.path())
			.destination(dst.path())
			.max_workers(1)
			.transformer(writer.clone())
			.build(),
	);

	let running = orchestrator.clone();
	let handle = tokio::spawn(async move { running.run().await });

	tokio::time::sleep(Duration::from_millis(80)).await;
	orchestrator.set_max_workers(4);
	assert_eq!(orchestrator.max_workers(), 4);

	let summary = handle.await.unwrap().unwrap();
	assert_eq!(summary.files_synced, 8);
	assert!(writer.peak.load(Ordering::SeqCst) >= 2);
	assert!(writer.peak.load(Ordering::SeqCst) <= 4);
}

#[tokio::test]
async fn test_failed_job_does_not_stop_session() {
	let src = TempDir::new().unwrap();
	let dst = TempDir::new().unwrap();
	create_maps(src.path(), 3);

	let writer = Arc::new(SlowWriter {
		fail_on: Some("map01.bsp"),
		..SlowWriter::new(Duration::from_millis(1))
	});
	let failures = Arc::new(Mutex::new(Vec::new()));
	let f = failures.clone();
	let events = CallbackBuilder::new()
		.on_job_failed(move |path, message| f.lock().unwrap().push((path.to_path_buf(), message.to_string())))
		.build();

	let summary = SyncBuilder::new()
		.source(src.path())
		.destination(dst.path())
		.transformer(writer)
		.events(events)
		.sync()
		.await
		.unwrap();

	assert_eq!(summary.files_queued, 3);
	assert_eq!(summary.files_failed, 1);
	assert_eq!(summary.files_synced, 2);

	let failures = failures.lock().unwrap();
	assert_eq!(failures.len(), 1);
	assert!(failures[0].0.ends_with("map01.bsp"));
	assert!(failures[0].1.contains("disk full"));

	// the failed file has no destination, so the next run picks it up again
	assert!(!dst.path().join("maps/map01.bsp.bz2").exists());
}
