//! Supported game servers and their default exclude lists
//!
//! A game server install contains a content directory named after the game
//! (`csgo/`, `garrysmod/`, `tf/`); that directory is what gets mirrored.

use std::path::{Path, PathBuf};

/// Games whose server layout is recognised
pub const SUPPORTED_GAMES: &[&str] = &["garrysmod", "csgo", "tf"];

/// A game found in a server directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedGame {
	pub name: &'static str,
	/// The game's content directory, to be used as sync source
	pub content_root: PathBuf,
}

/// Look for a supported game's content directory directly inside `dir`.
///
/// Names must match exactly; the first supported game found wins.
pub fn detect_game(dir: &Path) -> Option<DetectedGame> {
	SUPPORTED_GAMES.iter().find_map(|name| {
		let content_root = dir.join(name);
		content_root.is_dir().then(|| DetectedGame { name, content_root })
	})
}

pub fn is_supported(game: &str) -> bool {
	SUPPORTED_GAMES.contains(&game)
}

/// Default exclude file for `game`: `<base>/excludes/<game>.txt`
pub fn default_exclude_file(base: &Path, game: &str) -> PathBuf {
	base.join("excludes").join(format!("{}.txt", game))
}
