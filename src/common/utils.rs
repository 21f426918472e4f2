//! Small shared helpers.

use std::path::Path;

/// Render a path for logs with the home directory collapsed to `~`.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        return format!("~/{}", stripped.display());
    }
    path.display().to_string()
}

/// Linear interpolation between two `u8` channel values, rounded to nearest.
pub fn interpolate_u8(start: u8, end: u8, progress: f64) -> u8 {
    let progress = progress.clamp(0.0, 1.0);
    let value = start as f64 + (end as f64 - start as f64) * progress;
    value.round().clamp(0.0, 255.0) as u8
}
