//! Event surface between the sync engine and whatever presents it
//!
//! The engine never knows who is listening. It emits [`SyncEvent`]s into a
//! [`SyncEventHandler`]; shells subscribe either with a closure, with the
//! hook-style [`CallbackBuilder`], or through a broadcast channel
//! ([`ChannelEvents`]).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::types::{SyncPhase, SyncSummary};

// Type aliases to reduce complexity
type LabelFn = dyn Fn(&str) + Send + Sync;
type PathFn = dyn Fn(&Path) + Send + Sync;
type CountFn = dyn Fn(usize) + Send + Sync;
type FailFn = dyn Fn(&Path, &str) + Send + Sync;
type MessageFn = dyn Fn(&str) + Send + Sync;
type CompletedFn = dyn Fn(&SyncSummary) + Send + Sync;

/// Everything the engine reports while a session runs
#[derive(Debug, Clone)]
pub enum SyncEvent {
	/// Session moved into a new phase
	PhaseChanged { phase: SyncPhase },

	/// A worker picked up a job ("Compressing: de_dust.bsp")
	JobStarted { label: String, path: PathBuf },

	/// A job ended, successfully or not
	JobFinished { path: PathBuf },

	/// A job ended with an error; always followed by `JobFinished`
	JobFailed { path: PathBuf, message: String },

	/// Completed job counter after each job
	JobProgress { completed: usize, total: usize },

	/// A source file was selected for syncing
	FileQueued { path: PathBuf },

	/// An older destination file was deleted because its source changed
	StaleFileRemoved { path: PathBuf },

	/// A destination file was deleted because its source disappeared
	OrphanRemoved { path: PathBuf },

	/// A destination file of the opposite sync mode was deleted
	ArtifactRemoved { path: PathBuf },

	/// Number of jobs currently executing
	ActiveCountChanged { active: usize },

	/// Number of jobs queued for this session (never less than 1)
	ProgressMax { max: usize },

	/// Non-fatal problem outside of a job (e.g. a failed deletion)
	Error { message: String },

	/// The session finished and the manifest was written
	SessionCompleted { summary: SyncSummary },
}

/// Receiver of sync events
pub trait SyncEventHandler: Send + Sync {
	/// Called for every event; must not block for long, workers call it too
	fn on_event(&self, _event: SyncEvent) {}
}

impl<T: Fn(SyncEvent) + Send + Sync> SyncEventHandler for T {
	fn on_event(&self, event: SyncEvent) {
		self(event);
	}
}

/// Handler that drops every event
pub struct NoEvents;

impl SyncEventHandler for NoEvents {}

/// Forwards every event to several handlers in order
pub struct FanOut {
	handlers: Vec<Arc<dyn SyncEventHandler>>,
}

impl FanOut {
	pub fn new(handlers: Vec<Arc<dyn SyncEventHandler>>) -> Self {
		FanOut { handlers }
	}
}

impl SyncEventHandler for FanOut {
	fn on_event(&self, event: SyncEvent) {
		for handler in &self.handlers {
			handler.on_event(event.clone());
		}
	}
}

/// Publishes events on a tokio broadcast channel
pub struct ChannelEvents {
	event_tx: broadcast::Sender<SyncEvent>,
}

impl ChannelEvents {
	/// Create a bridge and a first receiver
	pub fn new(capacity: usize) -> (Self, broadcast::Receiver<SyncEvent>) {
		let (event_tx, event_rx) = broadcast::channel(capacity.max(1));
		(ChannelEvents { event_tx }, event_rx)
	}

	/// Attach another receiver
	pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
		self.event_tx.subscribe()
	}
}

impl SyncEventHandler for ChannelEvents {
	fn on_event(&self, event: SyncEvent) {
		// No receivers is fine
		let _ = self.event_tx.send(event);
	}
}

/// Builder for hook-style callbacks using closures
pub struct CallbackBuilder {
	job_started: Option<Box<LabelFn>>,
	job_finished: Option<Box<PathFn>>,
	job_failed: Option<Box<FailFn>>,
	file_queued: Option<Box<PathFn>>,
	stale_file_removed: Option<Box<PathFn>>,
	file_removed: Option<Box<PathFn>>,
	active_count_changed: Option<Box<CountFn>>,
	progress_max: Option<Box<CountFn>>,
	error: Option<Box<MessageFn>>,
	session_completed: Option<Box<CompletedFn>>,
}

impl CallbackBuilder {
	/// Create a new callback builder
	pub fn new() -> Self {
		CallbackBuilder {
			job_started: None,
			job_finished: None,
			job_failed: None,
			file_queued: None,
			stale_file_removed: None,
			file_removed: None,
			active_count_changed: None,
			progress_max: None,
			error: None,
			session_completed: None,
		}
	}

	/// Set job started callback (receives the job label)
	pub fn on_job_started<F>(mut self, callback: F) -> Self
	where
		F: Fn(&str) + Send + Sync + 'static,
	{
		self.job_started = Some(Box::new(callback));
		self
	}

	/// Set job finished callback
	pub fn on_job_finished<F>(mut self, callback: F) -> Self
	where
		F: Fn(&Path) + Send + Sync + 'static,
	{
		self.job_finished = Some(Box::new(callback));
		self
	}

	/// Set job failed callback
	pub fn on_job_failed<F>(mut self, callback: F) -> Self
	where
		F: Fn(&Path, &str) + Send + Sync + 'static,
	{
		self.job_failed = Some(Box::new(callback));
		self
	}

	/// Set file queued callback
	pub fn on_file_queued<F>(mut self, callback: F) -> Self
	where
		F: Fn(&Path) + Send + Sync + 'static,
	{
		self.file_queued = Some(Box::new(callback));
		self
	}

	/// Set callback for destination files replaced because the source is newer
	pub fn on_stale_file_removed<F>(mut self, callback: F) -> Self
	where
		F: Fn(&Path) + Send + Sync + 'static,
	{
		self.stale_file_removed = Some(Box::new(callback));
		self
	}

	/// Set callback for orphans and opposite-mode artifacts deleted from the destination
	pub fn on_file_removed<F>(mut self, callback: F) -> Self
	where
		F: Fn(&Path) + Send + Sync + 'static,
	{
		self.file_removed = Some(Box::new(callback));
		self
	}

	/// Set active worker count callback
	pub fn on_active_count_changed<F>(mut self, callback: F) -> Self
	where
		F: Fn(usize) + Send + Sync + 'static,
	{
		self.active_count_changed = Some(Box::new(callback));
		self
	}

	/// Set progress ceiling callback
	pub fn on_progress_max<F>(mut self, callback: F) -> Self
	where
		F: Fn(usize) + Send + Sync + 'static,
	{
		self.progress_max = Some(Box::new(callback));
		self
	}

	/// Set error callback
	pub fn on_error<F>(mut self, callback: F) -> Self
	where
		F: Fn(&str) + Send + Sync + 'static,
	{
		self.error = Some(Box::new(callback));
		self
	}

	/// Set session completed callback
	pub fn on_session_completed<F>(mut self, callback: F) -> Self
	where
		F: Fn(&SyncSummary) + Send + Sync + 'static,
	{
		self.session_completed = Some(Box::new(callback));
		self
	}

	/// Build the callbacks handler
	pub fn build(self) -> Arc<dyn SyncEventHandler> {
		Arc::new(CompositeCallbacks {
			job_started: self.job_started,
			job_finished: self.job_finished,
			job_failed: self.job_failed,
			file_queued: self.file_queued,
			stale_file_removed: self.stale_file_removed,
			file_removed: self.file_removed,
			active_count_changed: self.active_count_changed,
			progress_max: self.progress_max,
			error: self.error,
			session_completed: self.session_completed,
		})
	}
}

impl Default for CallbackBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Internal composite callbacks implementation
struct CompositeCallbacks {
	job_started: Option<Box<LabelFn>>,
	job_finished: Option<Box<PathFn>>,
	job_failed: Option<Box<FailFn>>,
	file_queued: Option<Box<PathFn>>,
	stale_file_removed: Option<Box<PathFn>>,
	file_removed: Option<Box<PathFn>>,
	active_count_changed: Option<Box<CountFn>>,
	progress_max: Option<Box<CountFn>>,
	error: Option<Box<MessageFn>>,
	session_completed: Option<Box<CompletedFn>>,
}

impl SyncEventHandler for CompositeCallbacks {
	fn on_event(&self, event: SyncEvent) {
		match event {
			SyncEvent::JobStarted { label, .. } => {
				if let Some(ref callback) = self.job_started {
					callback(&label);
				}
			}
			SyncEvent::JobFinished { path } => {
				if let Some(ref callback) = self.job_finished {
					callback(&path);
				}
			}
			SyncEvent::JobFailed { path, message } => {
				if let Some(ref callback) = self.job_failed {
					callback(&path, &message);
				} else if let Some(ref callback) = self.error {
					callback(&message);
				}
			}
			SyncEvent::FileQueued { path } => {
				if let Some(ref callback) = self.file_queued {
					callback(&path);
				}
			}
			SyncEvent::StaleFileRemoved { path } => {
				if let Some(ref callback) = self.stale_file_removed {
					callback(&path);
				}
			}
			SyncEvent::OrphanRemoved { path } | SyncEvent::ArtifactRemoved { path } => {
				if let Some(ref callback) = self.file_removed {
					callback(&path);
				}
			}
			SyncEvent::ActiveCountChanged { active } => {
				if let Some(ref callback) = self.active_count_changed {
					callback(active);
				}
			}
			SyncEvent::ProgressMax { max } => {
				if let Some(ref callback) = self.progress_max {
					callback(max);
				}
			}
			SyncEvent::Error { message } => {
				if let Some(ref callback) = self.error {
					callback(&message);
				}
			}
			SyncEvent::SessionCompleted { summary } => {
				if let Some(ref callback) = self.session_completed {
					callback(&summary);
				}
			}
			SyncEvent::PhaseChanged { .. } | SyncEvent::JobProgress { .. } => {}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex;

	#[test]
	fn test_builder_routes_events() {
		let queued = Arc::new(Mutex::new(Vec::new()));
		let max = Arc::new(AtomicUsize::new(0));

		let q = queued.clone();
		let m = max.clone();
		let handler = CallbackBuilder::new()
			.on_file_queued(move |p| q.lock().unwrap().push(p.to_path_buf()))
			.on_progress_max(move |n| m.store(n, Ordering::SeqCst))
			.build();

		handler.on_event(SyncEvent::FileQueued { path: PathBuf::from("maps/de_dust.bsp") });
		handler.on_event(SyncEvent::ProgressMax { max: 7 });
		handler.on_event(SyncEvent::ActiveCountChanged { active: 3 });

		assert_eq!(queued.lock().unwrap().as_slice(), &[PathBuf::from("maps/de_dust.bsp")]);
		assert_eq!(max.load(Ordering::SeqCst), 7);
	}

	#[test]
	fn test_job_failure_falls_back_to_error_hook() {
		let errors = Arc::new(Mutex::new(Vec::new()));
		let e = errors.clone();
		let handler =
			CallbackBuilder::new().on_error(move |msg| e.lock().unwrap().push(msg.to_string())).build();

		handler.on_event(SyncEvent::JobFailed {
			path: PathBuf::from("a.bsp"),
			message: "disk full".to_string(),
		});
		assert_eq!(errors.lock().unwrap().as_slice(), &["disk full".to_string()]);
	}

	#[tokio::test]
	async fn test_channel_events() {
		let (bridge, mut rx) = ChannelEvents::new(16);
		bridge.on_event(SyncEvent::ProgressMax { max: 1 });
		match rx.recv().await.unwrap() {
			SyncEvent::ProgressMax { max } => assert_eq!(max, 1),
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[test]
	fn test_fan_out() {
		let count = Arc::new(AtomicUsize::new(0));
		let c1 = count.clone();
		let c2 = count.clone();
		let a: Arc<dyn SyncEventHandler> = Arc::new(move |_e: SyncEvent| {
			c1.fetch_add(1, Ordering::SeqCst);
		});
		let b: Arc<dyn SyncEventHandler> = Arc::new(move |_e: SyncEvent| {
			c2.fetch_add(1, Ordering::SeqCst);
		});
		FanOut::new(vec![a, b]).on_event(SyncEvent::JobFinished { path: PathBuf::new() });
		assert_eq!(count.load(Ordering::SeqCst), 2);
	}
}
