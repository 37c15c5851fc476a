//! Per-run session state

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::callbacks::{SyncEvent, SyncEventHandler};
use crate::exclusion::ExcludeList;
use crate::manifest::{Manifest, ManifestStore};
use crate::mapping::PathMapper;
use crate::types::{SyncPhase, SyncSummary};

/// Everything one run of the orchestrator works on.
///
/// A session is created after validation succeeded and is consumed by the
/// run; nothing in it survives to the next session except the manifest file.
pub struct SyncSession {
	pub id: Uuid,
	pub(super) phase: SyncPhase,
	pub(super) mapper: PathMapper,
	pub(super) exclude: ExcludeList,
	pub(super) store: ManifestStore,
	pub(super) manifest: Manifest,
	/// Normalized relative path -> source that claimed its destination
	pub(super) claimed: HashMap<String, PathBuf>,
	pub(super) events: Arc<dyn SyncEventHandler>,
	pub(super) cancel: CancellationToken,
	pub(super) summary: SyncSummary,
	pub(super) started: Instant,
}

impl SyncSession {
	pub(super) fn new(
		mapper: PathMapper,
		exclude: ExcludeList,
		store: ManifestStore,
		manifest: Manifest,
		events: Arc<dyn SyncEventHandler>,
		cancel: CancellationToken,
	) -> Self {
		let id = Uuid::new_v4();
		SyncSession {
			id,
			phase: SyncPhase::Idle,
			mapper,
			exclude,
			store,
			manifest,
			claimed: HashMap::new(),
			events,
			cancel,
			summary: SyncSummary { session_id: id, ..Default::default() },
			started: Instant::now(),
		}
	}

	pub fn phase(&self) -> SyncPhase {
		self.phase
	}

	pub fn mapper(&self) -> &PathMapper {
		&self.mapper
	}

	/// Move to the next phase and announce it
	pub(super) fn advance(&mut self) {
		let next = self.phase.next();
		debug!("Phase {:?} -> {:?}", self.phase, next);
		self.phase = next;
		self.emit(SyncEvent::PhaseChanged { phase: next });
	}

	pub(super) fn emit(&self, event: SyncEvent) {
		self.events.on_event(event);
	}

	/// Report a problem that does not stop the session
	pub(super) fn report(&self, message: String) {
		warn!("{}", message);
		self.emit(SyncEvent::Error { message });
	}

	/// Check the cancellation token, recording it in the summary
	pub(super) fn is_cancelled(&mut self) -> bool {
		if self.cancel.is_cancelled() {
			if !self.summary.cancelled {
				info!("Sync cancelled, no further files will be queued");
			}
			self.summary.cancelled = true;
		}
		self.summary.cancelled
	}

	/// Final summary with elapsed time and manifest size filled in
	pub(super) fn finish_summary(&mut self) -> SyncSummary {
		self.summary.elapsed = self.started.elapsed();
		self.summary.manifest_entries = self.manifest.len();
		self.summary.clone()
	}
}

// vim: ts=4
