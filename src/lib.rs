//! # FastDL - incremental mirror of game server content for Fast Download
//!
//! Mirrors a game server's content directory into a FastDL tree served over
//! HTTP, either bzip2-compressed (`.bz2`) or as plain copies. Only new and
//! changed files are processed; files removed from the server are removed
//! from the mirror through a manifest kept in the source directory.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fastdl::SyncBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let summary = SyncBuilder::new()
//!         .source("/srv/csgo/csgo")
//!         .destination("/var/www/fastdl")
//!         .sync()
//!         .await?;
//!     println!("Synced {} files", summary.files_synced);
//!     Ok(())
//! }
//! ```
//!
//! ## Listening to events
//!
//! ```rust,ignore
//! use fastdl::{CallbackBuilder, SyncBuilder};
//!
//! let events = CallbackBuilder::new()
//!     .on_job_started(|label| println!("{}", label))
//!     .on_progress_max(|max| println!("{} files to sync", max))
//!     .build();
//!
//! let summary = SyncBuilder::new()
//!     .source("/srv/tf/tf")
//!     .destination("/var/www/fastdl")
//!     .compress(false)
//!     .events(events)
//!     .sync()
//!     .await?;
//! ```

pub mod callbacks;
pub mod config;
pub mod error;
pub mod exclusion;
pub mod games;
pub mod logging;
pub mod manifest;
pub mod mapping;
pub mod pool;
pub mod progress;
pub mod sync_impl;
pub mod transform;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export commonly used types and functions
pub use callbacks::{CallbackBuilder, ChannelEvents, SyncEvent, SyncEventHandler};
pub use config::Config;
pub use error::{ConfigError, SyncError, TransformError};
pub use exclusion::ExcludeList;
pub use manifest::{Manifest, ManifestStore};
pub use mapping::PathMapper;
pub use pool::WorkerPool;
pub use sync_impl::{SyncBuilder, SyncOrchestrator};
pub use transform::FileTransformer;
pub use types::{SyncJob, SyncMode, SyncPhase, SyncSummary};

// vim: ts=4
