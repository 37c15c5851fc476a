//! Bounded-concurrency worker pool for transform jobs
//!
//! Jobs are queued FIFO and handed to tokio's blocking thread pool, never more
//! than `max_workers` at a time. The limit can be changed while the pool is
//! busy; it applies to jobs dispatched afterwards, running jobs are left alone.
//! Nothing is retried: a job that fails is counted as completed (and failed).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::callbacks::{SyncEvent, SyncEventHandler};
use crate::transform::FileTransformer;
use crate::types::SyncJob;

/// Default cadence of `ActiveCountChanged` events while draining
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Snapshot of pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
	pub max_workers: usize,
	pub active: usize,
	pub pending: usize,
	pub submitted: usize,
	pub completed: usize,
	pub failed: usize,
	/// Highest number of jobs that ever ran at the same time
	pub peak_active: usize,
}

#[derive(Debug, Default)]
struct PoolState {
	pending: VecDeque<SyncJob>,
	active: usize,
	submitted: usize,
	completed: usize,
	failed: usize,
	peak_active: usize,
}

struct Shared {
	state: Mutex<PoolState>,
	max_workers: AtomicUsize,
	changed: Notify,
	transformer: Arc<dyn FileTransformer>,
	events: Arc<dyn SyncEventHandler>,
	runtime: Handle,
}

impl Shared {
	fn lock(&self) -> MutexGuard<'_, PoolState> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}
}

/// Executes [`SyncJob`]s with a [`FileTransformer`], bounded by `max_workers`
///
/// Clones share the same queue and limit.
#[derive(Clone)]
pub struct WorkerPool {
	shared: Arc<Shared>,
	progress_interval: Duration,
}

impl WorkerPool {
	/// Create a pool bound to the current tokio runtime.
	///
	/// # Panics
	///
	/// Panics when called outside of a tokio runtime.
	pub fn new(
		max_workers: usize,
		transformer: Arc<dyn FileTransformer>,
		events: Arc<dyn SyncEventHandler>,
	) -> Self {
		WorkerPool {
			shared: Arc::new(Shared {
				state: Mutex::new(PoolState::default()),
				max_workers: AtomicUsize::new(max_workers.max(1)),
				changed: Notify::new(),
				transformer,
				events,
				runtime: Handle::current(),
			}),
			progress_interval: DEFAULT_PROGRESS_INTERVAL,
		}
	}

	/// Change how often `ActiveCountChanged` is emitted by [`wait`](Self::wait)
	pub fn with_progress_interval(mut self, interval: Duration) -> Self {
		self.progress_interval = interval.max(Duration::from_millis(1));
		self
	}

	/// Change the concurrency limit; 0 is treated as 1
	pub fn set_max_workers(&self, max_workers: usize) {
		let max_workers = max_workers.max(1);
		let old = self.shared.max_workers.swap(max_workers, Ordering::SeqCst);
		debug!("Worker limit changed {} -> {}", old, max_workers);
		dispatch(&self.shared);
	}

	pub fn max_workers(&self) -> usize {
		self.shared.max_workers.load(Ordering::SeqCst)
	}

	/// Queue a job; it starts as soon as a worker slot is free
	pub fn submit(&self, job: SyncJob) {
		{
			let mut state = self.shared.lock();
			state.pending.push_back(job);
			state.submitted += 1;
		}
		dispatch(&self.shared);
	}

	pub fn active_count(&self) -> usize {
		self.shared.lock().active
	}

	pub fn pending_count(&self) -> usize {
		self.shared.lock().pending.len()
	}

	pub fn stats(&self) -> PoolStats {
		let state = self.shared.lock();
		PoolStats {
			max_workers: self.max_workers(),
			active: state.active,
			pending: state.pending.len(),
			submitted: state.submitted,
			completed: state.completed,
			failed: state.failed,
			peak_active: state.peak_active,
		}
	}

	/// Wait until no job is running or queued.
	///
	/// Completion is signalled by the workers; while waiting, the active
	/// worker count is reported every `progress_interval`. A final
	/// `ActiveCountChanged { active: 0 }` is emitted on return.
	pub async fn wait(&self) {
		let mut ticker = tokio::time::interval(self.progress_interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			let notified = self.shared.changed.notified();
			tokio::pin!(notified);
			notified.as_mut().enable();

			{
				let state = self.shared.lock();
				if state.active == 0 && state.pending.is_empty() {
					break;
				}
			}

			tokio::select! {
				_ = ticker.tick() => {
					let active = self.active_count();
					self.shared.events.on_event(SyncEvent::ActiveCountChanged { active });
				}
				_ = &mut notified => {}
			}
		}

		self.shared.events.on_event(SyncEvent::ActiveCountChanged { active: 0 });
	}
}

/// Start as many queued jobs as the current limit allows
fn dispatch(shared: &Arc<Shared>) {
	let mut ready = Vec::new();
	{
		let mut state = shared.lock();
		let max = shared.max_workers.load(Ordering::SeqCst).max(1);
		while state.active < max {
			match state.pending.pop_front() {
				Some(job) => {
					state.active += 1;
					state.peak_active = state.peak_active.max(state.active);
					ready.push(job);
				}
				None => break,
			}
		}
	}

	for job in ready {
		let guard = JobGuard { shared: shared.clone(), failed: true };
		shared.runtime.spawn_blocking(move || run_job(guard, job));
	}
}

fn run_job(mut guard: JobGuard, job: SyncJob) {
	trace!("Worker picked up {}", job.source_path.display());
	let shared = guard.shared.clone();
	guard.failed = shared.transformer.run(&job, shared.events.as_ref()).is_err();
	// guard drops here and books the completion
}

/// Books a job's completion exactly once, even if the transformer panics
struct JobGuard {
	shared: Arc<Shared>,
	failed: bool,
}

impl Drop for JobGuard {
	fn drop(&mut self) {
		let (completed, total) = {
			let mut state = self.shared.lock();
			state.active -= 1;
			state.completed += 1;
			if self.failed {
				state.failed += 1;
			}
			(state.completed, state.submitted)
		};

		self.shared.events.on_event(SyncEvent::JobProgress { completed, total });
		dispatch(&self.shared);
		self.shared.changed.notify_waiters();
	}
}
