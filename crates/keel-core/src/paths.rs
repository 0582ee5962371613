//! # Repository Paths
//!
//! Repository paths are always `/`-separated and rooted at `/`, independent of
//! the host platform. The watcher reports the repository path of the changed
//! file; uploads are addressed by the directory that contains it.
//!
//! ```text
//!   /docs/reports/q3.xlsx   ──parent_path──►   /docs/reports
//!   /a.txt                  ──parent_path──►   /
//! ```

/// Separator used inside repositories.
pub const REPO_SEPARATOR: char = '/';

/// Returns the repository directory that contains `path`.
///
/// Trailing separators are ignored, and anything without a parent resolves to
/// the repository root.
///
/// ## Example
/// ```rust
/// use keel_core::parent_path;
///
/// assert_eq!(parent_path("/docs/a.txt"), "/docs");
/// assert_eq!(parent_path("/a.txt"), "/");
/// assert_eq!(parent_path("/docs/sub/"), "/docs");
/// ```
pub fn parent_path(path: &str) -> String {
    let trimmed = path.trim_end_matches(REPO_SEPARATOR);

    match trimmed.rfind(REPO_SEPARATOR) {
        Some(0) | None => REPO_SEPARATOR.to_string(),
        Some(idx) => trimmed[..idx].to_string(),
    }
}
