//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Resize
//!
//! ```text
//! photo.jpg → thumbs/photo.jpg
//!     Source: 800x600
//!     Canvas: 400x400
//!     Content: 400x300 at (0, 50)
//!     Rotation: none
//!     Format: jpg
//!     Written: 18234 bytes
//! ```
//!
//! ## Plan
//!
//! ```text
//! photo.jpg
//!     Decoded: 600x800
//!     Oriented: 800x600 (rotate -90°)
//!     Canvas: 400x400
//!     Content: 400x300 at (0, 50)
//!     Format: jpg (white background)
//!     Memory: 2709261 bytes (within limit)
//! ```
//!
//! ## Validate / Sniff
//!
//! ```text
//! upload.png: ok
//! upload.png: rejected: Image format not recognized, ...
//! upload.png: image/png
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure, with no I/O.

use crate::imaging::{Dimensions, FitPlan, ResizeOutcome, ResizePreview, Rotation};
use crate::upload::UploadError;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn rotation_label(rotation: Rotation) -> String {
    match rotation {
        Rotation::None => "none".to_string(),
        other => format!("{}°", other.degrees()),
    }
}

fn plan_lines(plan: &FitPlan) -> [String; 2] {
    [
        format!("{}Canvas: {}", indent(1), plan.canvas()),
        format!(
            "{}Content: {} at ({}, {})",
            indent(1),
            plan.content(),
            plan.offset_x,
            plan.offset_y
        ),
    ]
}

// ============================================================================
// Resize
// ============================================================================

pub fn format_resize_output(source: &Path, destination: &Path, outcome: &ResizeOutcome) -> Vec<String> {
    let mut lines = vec![
        format!("{} → {}", source.display(), destination.display()),
        format!("{}Source: {}", indent(1), outcome.source),
    ];
    lines.extend(plan_lines(&outcome.plan));
    lines.push(format!("{}Rotation: {}", indent(1), rotation_label(outcome.rotation)));
    lines.push(format!("{}Format: {}", indent(1), outcome.format));
    lines.push(format!("{}Written: {} bytes", indent(1), outcome.bytes_written));
    lines
}

pub fn print_resize_output(source: &Path, destination: &Path, outcome: &ResizeOutcome) {
    for line in format_resize_output(source, destination, outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Plan
// ============================================================================

pub fn format_plan_output(source: &Path, preview: &ResizePreview) -> Vec<String> {
    let orientation = &preview.orientation;
    let mut lines = vec![
        source.display().to_string(),
        format!("{}Decoded: {}", indent(1), preview.decoded),
    ];
    if orientation.rotation != Rotation::None {
        lines.push(format!(
            "{}Oriented: {} (rotate {})",
            indent(1),
            orientation.effective,
            rotation_label(orientation.rotation)
        ));
    }
    lines.extend(plan_lines(&preview.plan));
    let background = if preview.transparent {
        "transparent"
    } else {
        "white"
    };
    lines.push(format!(
        "{}Format: {} ({} background)",
        indent(1),
        preview.format,
        background
    ));
    let verdict = if preview.within_memory_limit {
        "within limit"
    } else {
        "over limit"
    };
    lines.push(format!(
        "{}Memory: {} bytes ({})",
        indent(1),
        preview.estimated_memory_bytes,
        verdict
    ));
    lines
}

pub fn print_plan_output(source: &Path, preview: &ResizePreview) {
    for line in format_plan_output(source, preview) {
        println!("{}", line);
    }
}

// ============================================================================
// Cut, validate, sniff
// ============================================================================

pub fn format_cut_output(source: &Path, destination: &Path, size: Dimensions) -> Vec<String> {
    vec![
        format!("{} → {}", source.display(), destination.display()),
        format!("{}Region: {}", indent(1), size),
    ]
}

pub fn format_validate_output(filename: &str, result: &Result<(), UploadError>) -> String {
    match result {
        Ok(()) => format!("{filename}: ok"),
        Err(e) => format!("{filename}: rejected: {e}"),
    }
}

pub fn format_sniff_output(path: &Path, mime: Option<&str>) -> String {
    format!("{}: {}", path.display(), mime.unwrap_or("unknown"))
}
