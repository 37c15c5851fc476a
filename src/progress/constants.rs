//! Progress display constants

/// Width of the progress bar display
pub const PROGRESS_BAR_WIDTH: usize = 30;

/// Throttle redraws to this many milliseconds
pub const UPDATE_THROTTLE_MS: u128 = 100;
