//! Console progress display for CLI sync
//!
//! Renders the event stream as a single, redrawn progress line on stderr and
//! sends everything worth keeping (removed files, failures, phase changes) to
//! the log.

pub mod constants;

use std::io::Write;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::callbacks::{SyncEvent, SyncEventHandler};
use crate::types::SyncPhase;

/// Progress display constants
pub use constants::*;

/// Counters behind the progress line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressCounters {
	pub max: usize,
	pub completed: usize,
	pub active: usize,
	pub failed: usize,
}

/// Shared state for progress tracking
#[derive(Debug)]
pub struct ProgressState {
	pub counters: Mutex<ProgressCounters>,
	pub current_phase: Mutex<Option<SyncPhase>>,
	pub last_update: Mutex<Instant>,
}

impl ProgressState {
	pub fn new() -> Self {
		Self {
			counters: Mutex::new(ProgressCounters::default()),
			current_phase: Mutex::new(None),
			last_update: Mutex::new(Instant::now()),
		}
	}
}

impl Default for ProgressState {
	fn default() -> Self {
		Self::new()
	}
}

/// CLI progress callback
pub struct CliProgressCallback {
	state: ProgressState,
	draw: bool,
}

impl CliProgressCallback {
	pub fn new() -> Self {
		Self { state: ProgressState::new(), draw: true }
	}

	/// Log events but never draw the progress line (for non-tty or JSON output)
	pub fn quiet() -> Self {
		Self { state: ProgressState::new(), draw: false }
	}

	pub fn counters(&self) -> ProgressCounters {
		self.state.counters.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}

	fn redraw(&self, force: bool) {
		if !self.draw {
			return;
		}
		{
			let mut last = self.state.last_update.lock().unwrap_or_else(|e| e.into_inner());
			if !force && last.elapsed().as_millis() < UPDATE_THROTTLE_MS {
				return;
			}
			*last = Instant::now();
		}
		let line = render_line(&self.counters());
		let mut err = std::io::stderr();
		let _ = write!(err, "\r{}", line);
		let _ = err.flush();
	}

	fn end_line(&self) {
		if self.draw {
			let _ = writeln!(std::io::stderr());
		}
	}
}

impl Default for CliProgressCallback {
	fn default() -> Self {
		Self::new()
	}
}

/// `[=====     ] 12/40 files | 4 active`
pub fn render_line(c: &ProgressCounters) -> String {
	let max = c.max.max(1);
	let ratio = (c.completed as f64 / max as f64).clamp(0.0, 1.0);
	let filled = (ratio * PROGRESS_BAR_WIDTH as f64) as usize;
	let mut line = format!(
		"  Syncing: [{}{}] {}/{} files | {} active",
		"=".repeat(filled),
		" ".repeat(PROGRESS_BAR_WIDTH - filled),
		c.completed,
		c.max,
		c.active
	);
	if c.failed > 0 {
		line.push_str(&format!(" | {} failed", c.failed));
	}
	line
}

impl SyncEventHandler for CliProgressCallback {
	fn on_event(&self, event: SyncEvent) {
		match event {
			SyncEvent::PhaseChanged { phase } => {
				*self.state.current_phase.lock().unwrap_or_else(|e| e.into_inner()) = Some(phase);
				if phase == SyncPhase::Completed {
					self.end_line();
				}
				debug!("-> {:?}", phase);
			}
			SyncEvent::JobStarted { label, .. } => debug!("{}", label),
			SyncEvent::JobFailed { path, message } => {
				self.state.counters.lock().unwrap_or_else(|e| e.into_inner()).failed += 1;
				warn!("Failed: {}: {}", path.display(), message);
			}
			SyncEvent::JobProgress { completed, .. } => {
				self.state.counters.lock().unwrap_or_else(|e| e.into_inner()).completed = completed;
				self.redraw(false);
			}
			SyncEvent::ActiveCountChanged { active } => {
				self.state.counters.lock().unwrap_or_else(|e| e.into_inner()).active = active;
				self.redraw(active == 0);
			}
			SyncEvent::ProgressMax { max } => {
				*self.state.counters.lock().unwrap_or_else(|e| e.into_inner()) =
					ProgressCounters { max, ..Default::default() };
				self.redraw(true);
			}
			SyncEvent::StaleFileRemoved { path } => info!("Newer source, replacing {}", path.display()),
			SyncEvent::OrphanRemoved { path } => info!("Source gone, deleted {}", path.display()),
			SyncEvent::ArtifactRemoved { path } => debug!("Deleted {}", path.display()),
			SyncEvent::Error { message } => warn!("{}", message),
			_ => {}
		}
	}
}


// vim: ts=4
