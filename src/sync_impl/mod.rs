//! The sync orchestrator: one session from validation to the final manifest
//!
//! A session walks a fixed sequence of phases:
//!
//! ```text
//! Idle -> CleaningUp -> Scanning -> Dispatching -> Draining -> Completed
//! ```
//!
//! - **CleaningUp** deletes destination files of the other sync mode, then
//!   reconciles the manifest (orphaned destinations are deleted).
//! - **Scanning** walks the source tree, applies the exclude list, deletes
//!   stale destinations and collects jobs.
//! - **Dispatching** records the jobs in the manifest and submits them.
//! - **Draining** waits for the worker pool to run dry, then writes the
//!   manifest.
//!
//! Configuration problems abort the session before anything is deleted.
//! Everything after that is per-file: failures are reported as events and
//! the session carries on.

pub mod phases;
pub mod state;

pub use self::state::SyncSession;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::callbacks::{NoEvents, SyncEvent, SyncEventHandler};
use crate::config::Config;
use crate::error::SyncError;
use crate::exclusion::ExcludeList;
use crate::games;
use crate::logging::*;
use crate::manifest::ManifestStore;
use crate::mapping::PathMapper;
use crate::pool::WorkerPool;
use crate::transform::{self, FileTransformer};
use crate::types::SyncSummary;
use crate::validation::{
	validate_destination_root, validate_disjoint_roots, validate_source_root, Validator,
};

/// Fluent construction of a [`SyncOrchestrator`]
///
/// ```rust,ignore
/// let summary = SyncBuilder::new()
///     .source("/srv/csgo/csgo")
///     .destination("/var/www/fastdl")
///     .compress(true)
///     .max_workers(8)
///     .exclude_file("excludes/csgo.txt")
///     .sync()
///     .await?;
/// ```
pub struct SyncBuilder {
	config: Config,
	exclude: Option<ExcludeList>,
	events: Option<Arc<dyn SyncEventHandler>>,
	transformer: Option<Arc<dyn FileTransformer>>,
	cancel: Option<CancellationToken>,
}

impl SyncBuilder {
	pub fn new() -> Self {
		Self::from_config(Config::default())
	}

	/// Start from a loaded configuration
	pub fn from_config(config: Config) -> Self {
		SyncBuilder { config, exclude: None, events: None, transformer: None, cancel: None }
	}

	pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
		self.config.source = path.into();
		self
	}

	pub fn destination(mut self, path: impl Into<PathBuf>) -> Self {
		self.config.destination = path.into();
		self
	}

	/// bzip2-compress (true) or copy (false)
	pub fn compress(mut self, compress: bool) -> Self {
		self.config.compress = compress;
		self
	}

	pub fn compress_level(mut self, level: u32) -> Self {
		self.config.compress_level = level;
		self
	}

	pub fn max_workers(mut self, max_workers: usize) -> Self {
		self.config.max_workers = max_workers;
		self
	}

	pub fn manifest_name(mut self, name: impl Into<String>) -> Self {
		self.config.manifest_name = name.into();
		self
	}

	pub fn exclude_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.config.exclude_file = Some(path.into());
		self
	}

	/// Extra exclude tokens, merged with whatever list is loaded
	pub fn exclude_tokens<I, S>(mut self, tokens: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.config.exclude_tokens.extend(tokens.into_iter().map(Into::into));
		self
	}

	/// Use an already built exclude list instead of loading one
	pub fn exclude_list(mut self, list: ExcludeList) -> Self {
		self.exclude = Some(list);
		self
	}

	/// Game whose default exclude file should be used when none is given
	pub fn game(mut self, game: impl Into<String>) -> Self {
		self.config.game = Some(game.into());
		self
	}

	pub fn progress_interval(mut self, interval: Duration) -> Self {
		self.config.progress_interval_ms = interval.as_millis().max(1) as u64;
		self
	}

	pub fn events(mut self, events: Arc<dyn SyncEventHandler>) -> Self {
		self.events = Some(events);
		self
	}

	/// Replace the transformer picked from the sync mode
	pub fn transformer(mut self, transformer: Arc<dyn FileTransformer>) -> Self {
		self.transformer = Some(transformer);
		self
	}

	pub fn cancel_token(mut self, token: CancellationToken) -> Self {
		self.cancel = Some(token);
		self
	}

	pub fn build(self) -> SyncOrchestrator {
		let max_workers = self.config.max_workers;
		SyncOrchestrator {
			config: self.config,
			exclude: self.exclude,
			events: self.events.unwrap_or_else(|| Arc::new(NoEvents)),
			transformer: self.transformer,
			cancel: self.cancel.unwrap_or_default(),
			max_workers: AtomicUsize::new(max_workers),
			active_pool: Mutex::new(None),
		}
	}

	/// Build and run a single session
	pub async fn sync(self) -> Result<SyncSummary, SyncError> {
		self.build().run().await
	}
}

impl Default for SyncBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Runs sync sessions for one source/destination pair
///
/// The orchestrator can be shared (`Arc`) with a shell that changes the
/// worker limit or cancels while [`run`](Self::run) is in progress.
pub struct SyncOrchestrator {
	config: Config,
	exclude: Option<ExcludeList>,
	events: Arc<dyn SyncEventHandler>,
	transformer: Option<Arc<dyn FileTransformer>>,
	cancel: CancellationToken,
	max_workers: AtomicUsize,
	active_pool: Mutex<Option<WorkerPool>>,
}

impl SyncOrchestrator {
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Token that stops the running session; clone it into signal handlers
	pub fn cancel_token(&self) -> CancellationToken {
		self.cancel.clone()
	}

	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	pub fn max_workers(&self) -> usize {
		self.max_workers.load(Ordering::SeqCst)
	}

	/// Change the worker limit, also for a session that is already draining.
	///
	/// Running jobs are not interrupted; 0 is treated as 1.
	pub fn set_max_workers(&self, max_workers: usize) {
		let max_workers = max_workers.max(1);
		self.max_workers.store(max_workers, Ordering::SeqCst);
		if let Some(pool) = self.active_pool.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
			pool.set_max_workers(max_workers);
		}
	}

	/// Run one full session.
	///
	/// Returns an error only for problems found before the first deletion
	/// (bad configuration, missing source, unreadable exclude list or
	/// manifest) or when the final manifest cannot be written.
	pub async fn run(&self) -> Result<SyncSummary, SyncError> {
		let session = self.open_session()?;
		let span = tracing::info_span!("sync", session = %session.id);
		self.run_session(session).instrument(span).await
	}

	/// Validate everything and prepare a session; touches nothing on disk
	/// except creating a missing destination root
	fn open_session(&self) -> Result<SyncSession, SyncError> {
		self.config.validate()?;

		let source_root = validate_source_root(&self.config.source)?;
		let dest_root = validate_destination_root(&self.config.destination)?;
		validate_disjoint_roots(&source_root, &dest_root)?;

		let exclude = self.load_exclude_list()?;
		let store = ManifestStore::in_source_root(&source_root, &self.config.manifest_name);
		let manifest = store.load()?;

		if !dest_root.exists() {
			info!("Creating destination {}", dest_root.display());
			fs::create_dir_all(&dest_root)?;
		}
		let dest_root = dest_root.canonicalize()?;

		let mapper = PathMapper::new(source_root, dest_root, self.config.mode());
		Ok(SyncSession::new(mapper, exclude, store, manifest, self.events.clone(), self.cancel.clone()))
	}

	fn load_exclude_list(&self) -> Result<ExcludeList, SyncError> {
		let mut list = if let Some(list) = &self.exclude {
			list.clone()
		} else if let Some(path) = &self.config.exclude_file {
			ExcludeList::load(path)?
		} else if let Some(game) = &self.config.game {
			let path = games::default_exclude_file(Path::new("."), game);
			if path.is_file() {
				ExcludeList::load(&path)?
			} else {
				debug!("No default exclude list for {} at {}", game, path.display());
				ExcludeList::new()
			}
		} else {
			ExcludeList::new()
		};
		list.extend(&self.config.exclude_tokens);
		debug!("Exclude list has {} tokens", list.len());
		Ok(list)
	}

	async fn run_session(&self, mut session: SyncSession) -> Result<SyncSummary, SyncError> {
		info!(
			"Syncing {} -> {} ({})",
			session.mapper().source_root().display(),
			session.mapper().dest_root().display(),
			session.mapper().mode()
		);

		// cancelled before the first phase: no deletions, no manifest rewrite
		if session.is_cancelled() {
			let summary = session.finish_summary();
			info!("Sync cancelled before start, destination left untouched");
			session.emit(SyncEvent::SessionCompleted { summary: summary.clone() });
			return Ok(summary);
		}

		// CleaningUp and Scanning walk whole trees, keep them off the runtime
		let (mut session, jobs) = tokio::task::spawn_blocking(move || {
			session.advance();
			session.remove_foreign_artifacts();
			session.reconcile_manifest();
			session.advance();
			let jobs = session.scan_source();
			(session, jobs)
		})
		.await?;

		session.advance();
		session.emit(SyncEvent::ProgressMax { max: jobs.len().max(1) });

		let transformer = self
			.transformer
			.clone()
			.unwrap_or_else(|| transform::for_mode(session.mapper().mode(), self.config.compress_level));
		let pool = WorkerPool::new(self.max_workers(), transformer, self.events.clone())
			.with_progress_interval(Duration::from_millis(self.config.progress_interval_ms));
		*self.active_pool.lock().unwrap_or_else(|e| e.into_inner()) = Some(pool.clone());
		// a limit changed between build() and now must not be lost
		pool.set_max_workers(self.max_workers());

		for job in jobs {
			if session.is_cancelled() {
				break;
			}
			session.manifest.insert(job.source_path.clone());
			pool.submit(job);
		}

		session.advance();
		pool.wait().await;
		*self.active_pool.lock().unwrap_or_else(|e| e.into_inner()) = None;

		let stats = pool.stats();
		session.summary.files_queued = stats.submitted;
		session.summary.files_failed = stats.failed;
		session.summary.files_synced = stats.completed - stats.failed;

		let store = session.store.clone();
		let manifest = session.manifest.clone();
		if let Err(e) = tokio::task::spawn_blocking(move || store.persist(&manifest)).await? {
			error!("{}", e);
			session.emit(SyncEvent::Error { message: e.to_string() });
			return Err(e);
		}

		session.advance();
		let summary = session.finish_summary();
		info!(
			"Sync finished in {:.1}s: {} synced, {} failed, {} up to date, {} removed",
			summary.elapsed.as_secs_f64(),
			summary.files_synced,
			summary.files_failed,
			summary.files_up_to_date,
			summary.orphans_removed + summary.stale_replaced + summary.artifacts_removed
		);
		session.emit(SyncEvent::SessionCompleted { summary: summary.clone() });
		Ok(summary)
	}
}

// vim: ts=4
