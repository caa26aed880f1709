//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Thumbnail
//!
//! One header line per job, then indented context lines:
//!
//! ```text
//! ready  file:///srv/models/bracket.FCStd
//!     Size: 128x96 (normal)
//!     Saved: /home/me/.cache/thumbs/normal/3f2a…e1.png
//! failed file:///srv/models/plain
//!     Error: no-content (2): Directory does not have .thumbnails subdirectory: /srv/models/plain
//!
//! 1 ready, 1 failed
//! ```
//!
//! ## Select
//!
//! ```text
//! /srv/models/project (requested 200)
//!     64  .thumbnails/64.png
//!   * 128 .thumbnails/128.png
//!     256 .thumbnails/256.png
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::config::FlavorConfig;
use crate::directory::Candidate;
use crate::job::JobOutcome;
use crate::request::Flavor;
use std::path::Path;

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Lines describing one finished job.
///
/// `saved_to` is where the cache writer stored the thumbnail, when known.
pub fn format_outcome(outcome: &JobOutcome, flavor: &Flavor, saved_to: Option<&Path>) -> Vec<String> {
    let mut lines = Vec::new();
    match outcome {
        JobOutcome::Ready { uri, image, .. } => {
            lines.push(format!("ready  {uri}"));
            lines.push(format!(
                "{}Size: {}x{} ({})",
                indent(1),
                image.width,
                image.height,
                flavor.name
            ));
            if let Some(path) = saved_to {
                lines.push(format!("{}Saved: {}", indent(1), path.display()));
            }
        }
        JobOutcome::Failed { uri, kind, message } => {
            lines.push(format!("failed {uri}"));
            lines.push(format!(
                "{}Error: {} ({}): {}",
                indent(1),
                kind,
                kind.code(),
                message
            ));
        }
    }
    lines
}

pub fn format_summary(ready: usize, failed: usize) -> String {
    format!("{ready} ready, {failed} failed")
}

/// Lines describing a best-fit selection. The chosen candidate is starred.
pub fn format_selection(
    dir: &Path,
    requested: u32,
    candidates: &[Candidate],
    chosen: Option<&Path>,
) -> Vec<String> {
    let mut lines = vec![format!("{} (requested {requested})", dir.display())];
    if candidates.is_empty() {
        lines.push(format!("{}no candidates", indent(1)));
        return lines;
    }

    let mut sorted: Vec<&Candidate> = candidates.iter().collect();
    sorted.sort_by_key(|c| c.size);
    let width = sorted
        .iter()
        .map(|c| c.size.to_string().len())
        .max()
        .unwrap_or(1);

    for candidate in sorted {
        let marker = if chosen == Some(candidate.path.as_path()) {
            "  * "
        } else {
            "    "
        };
        let shown = candidate
            .path
            .strip_prefix(dir)
            .unwrap_or(&candidate.path)
            .display();
        lines.push(format!("{marker}{:<width$} {shown}", candidate.size));
    }
    lines
}

pub fn format_flavors(flavors: &[FlavorConfig]) -> Vec<String> {
    let width = flavors.iter().map(|f| f.name.len()).max().unwrap_or(0);
    flavors
        .iter()
        .map(|f| format!("{:<width$}  {}x{}", f.name, f.size, f.size))
        .collect()
}

pub fn print_outcome(outcome: &JobOutcome, flavor: &Flavor, saved_to: Option<&Path>) {
    for line in format_outcome(outcome, flavor, saved_to) {
        println!("{}", line);
    }
}

pub fn print_selection(dir: &Path, requested: u32, candidates: &[Candidate], chosen: Option<&Path>) {
    for line in format_selection(dir, requested, candidates, chosen) {
        println!("{}", line);
    }
}

pub fn print_flavors(flavors: &[FlavorConfig]) {
    for line in format_flavors(flavors) {
        println!("{}", line);
    }
}
