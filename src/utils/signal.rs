use tokio_util::sync::CancellationToken;

use crate::logging::*;

/// Cancel `token` on SIGINT or SIGTERM.
///
/// The first signal lets the session wind down: no new jobs are queued,
/// running jobs finish and the manifest is still written. A second signal
/// exits immediately.
#[cfg(unix)]
pub fn setup_signal_handlers(token: CancellationToken) {
	tokio::spawn(async move {
		use tokio::signal;

		let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(stream) => stream,
			Err(e) => {
				warn!("Failed to setup SIGTERM handler: {}. Process will not handle SIGTERM gracefully.", e);
				return;
			}
		};

		let mut sigint = match signal::unix::signal(signal::unix::SignalKind::interrupt()) {
			Ok(stream) => stream,
			Err(e) => {
				warn!("Failed to setup SIGINT handler: {}. Process will not handle SIGINT gracefully.", e);
				return;
			}
		};

		let code = tokio::select! {
			_ = sigterm.recv() => 143, // 128 + SIGTERM(15)
			_ = sigint.recv() => 130,  // 128 + SIGINT(2)
		};
		warn!("Interrupted, waiting for running jobs (press again to abort)");
		token.cancel();

		tokio::select! {
			_ = sigterm.recv() => {}
			_ = sigint.recv() => {}
		}
		debug!("Second signal, exiting");
		std::process::exit(code);
	});
}

#[cfg(not(unix))]
pub fn setup_signal_handlers(token: CancellationToken) {
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_err() {
			warn!("Failed to setup Ctrl-C handler");
			return;
		}
		warn!("Interrupted, waiting for running jobs (press again to abort)");
		token.cancel();

		if tokio::signal::ctrl_c().await.is_ok() {
			std::process::exit(130);
		}
	});
}

// vim: ts=4
