//! Exclude file loading

use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::ExcludeList;
use crate::error::SyncError;

/// Read an exclude file: one literal token per line, blank lines ignored
pub(super) fn load_exclude_file(path: &Path) -> Result<ExcludeList, SyncError> {
	let contents = fs::read_to_string(path)
		.map_err(|source| SyncError::ExcludeList { path: path.to_path_buf(), source })?;

	let list = ExcludeList::from_tokens(contents.lines().map(str::trim));
	info!("{} entries added to exclude list from {}", list.len(), path.display());
	debug!("Exclude tokens: {:?}", list.tokens);
	Ok(list)
}
