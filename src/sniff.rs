//! Content-based media type detection.
//!
//! [`MimeSniffer`] asks an ordered list of [`MimeProbe`]s for the media type
//! of a file and returns the first non-empty answer. The built-in probes
//! never leave the process:
//!
//! | Probe | Source of truth |
//! |---|---|
//! | [`DecoderProbe`] | `image` crate format guess + header parse |
//! | [`MagicBytesProbe`] | `infer` signatures over the leading bytes, then text markers |
//! | [`XdgMimeProbe`] | `xdg-mime query filetype <path>` |
//! | [`FileCommandProbe`] | `file -b --mime-type`, `file --mime`, `file -bi` |
//!
//! The two external probes are only added when enabled and when their binary
//! is found on `PATH`. Probes never fail: a missing or unreadable file is
//! simply "unknown".

use image::ImageReader;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

/// One way of asking "what is this file?".
pub trait MimeProbe {
    fn name(&self) -> &'static str;

    /// The media type string, or `None` when this probe has no answer.
    fn probe(&self, path: &Path) -> Option<String>;
}

// =========================================================================
// Built-in probes
// =========================================================================

/// Format guess from content plus a successful header parse.
pub struct DecoderProbe;

impl MimeProbe for DecoderProbe {
    fn name(&self) -> &'static str {
        "decoder"
    }

    fn probe(&self, path: &Path) -> Option<String> {
        let reader = ImageReader::open(path).ok()?.with_guessed_format().ok()?;
        let format = reader.format()?;
        reader.into_dimensions().ok()?;
        Some(format.to_mime_type().to_string())
    }
}

/// Bytes read from the head of a file for signature matching.
const SNIFF_LEN: usize = 8192;

/// Type reported for binary content no signature recognises.
const UNKNOWN_BINARY: &str = "application/octet-stream";

/// Case-insensitive openers of executable text, matched after leading
/// whitespace. `infer` only covers binary containers and a few markups.
const TEXT_MARKERS: &[(&str, &str)] = &[
    ("<?php", "text/x-php"),
    ("<?=", "text/x-php"),
    ("<!doctype html", "text/html"),
    ("<html", "text/html"),
    ("<head", "text/html"),
    ("<body", "text/html"),
    ("<script", "text/html"),
    ("<svg", "image/svg+xml"),
    ("<?xml", "text/xml"),
    ("#!", "text/x-shellscript"),
];

/// Signature matching over the leading bytes, with text fallbacks.
///
/// Every readable file gets an answer: a known signature, a text type, or
/// `application/octet-stream`. Only plain text is left open to
/// interpretation.
pub struct MagicBytesProbe;

impl MagicBytesProbe {
    /// Classify a byte prefix. Exposed for callers that already hold bytes.
    pub fn detect(head: &[u8]) -> &'static str {
        if head.is_empty() {
            return "application/x-empty";
        }
        if let Some(kind) = infer::get(head) {
            return kind.mime_type();
        }

        let text = match std::str::from_utf8(head) {
            Ok(text) => text,
            // the read may have split a multi-byte sequence at the end
            Err(e) if e.error_len().is_none() => {
                std::str::from_utf8(&head[..e.valid_up_to()]).unwrap_or_default()
            }
            Err(_) => return UNKNOWN_BINARY,
        };
        if head.contains(&0) {
            return UNKNOWN_BINARY;
        }
        let lead = text.trim_start().to_ascii_lowercase();
        TEXT_MARKERS
            .iter()
            .find(|(marker, _)| lead.starts_with(marker))
            .map_or("text/plain", |&(_, mime)| mime)
    }
}

impl MimeProbe for MagicBytesProbe {
    fn name(&self) -> &'static str {
        "magic"
    }

    fn probe(&self, path: &Path) -> Option<String> {
        let file = std::fs::File::open(path).ok()?;
        let mut head = Vec::with_capacity(SNIFF_LEN);
        file.take(SNIFF_LEN as u64).read_to_end(&mut head).ok()?;
        Some(Self::detect(&head).to_string())
    }
}

// =========================================================================
// External probes
// =========================================================================

fn run_trimmed(binary: &Path, args: &[&str], path: &Path) -> Option<String> {
    let output = Command::new(binary).args(args).arg(path).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    // keep only the last line, as a shell `exec` would
    let line = text.lines().last().unwrap_or_default().trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// The desktop content-type database, via `xdg-mime`.
pub struct XdgMimeProbe {
    binary: PathBuf,
}

impl XdgMimeProbe {
    pub fn locate() -> Option<Self> {
        which::which("xdg-mime").ok().map(|binary| Self { binary })
    }
}

impl MimeProbe for XdgMimeProbe {
    fn name(&self) -> &'static str {
        "xdg-mime"
    }

    fn probe(&self, path: &Path) -> Option<String> {
        run_trimmed(&self.binary, &["query", "filetype"], path)
    }
}

/// libmagic through the `file` utility, trying three invocations.
pub struct FileCommandProbe {
    binary: PathBuf,
}

impl FileCommandProbe {
    const INVOCATIONS: [&'static [&'static str]; 3] = [&["-b", "--mime-type"], &["--mime"], &["-bi"]];

    pub fn locate() -> Option<Self> {
        which::which("file").ok().map(|binary| Self { binary })
    }
}

impl MimeProbe for FileCommandProbe {
    fn name(&self) -> &'static str {
        "file"
    }

    fn probe(&self, path: &Path) -> Option<String> {
        Self::INVOCATIONS
            .iter()
            .find_map(|args| run_trimmed(&self.binary, args, path))
    }
}

// =========================================================================
// Sniffer
// =========================================================================

/// Ordered fallback over a set of probes.
pub struct MimeSniffer {
    probes: Vec<Box<dyn MimeProbe>>,
}

impl MimeSniffer {
    /// Built-in probes, plus the external ones when `external_probes` is set
    /// and their binaries are installed.
    pub fn new(external_probes: bool) -> Self {
        let mut probes: Vec<Box<dyn MimeProbe>> =
            vec![Box::new(DecoderProbe), Box::new(MagicBytesProbe)];
        if external_probes {
            match XdgMimeProbe::locate() {
                Some(probe) => probes.push(Box::new(probe)),
                None => tracing::debug!("xdg-mime not found on PATH, probe skipped"),
            }
            match FileCommandProbe::locate() {
                Some(probe) => probes.push(Box::new(probe)),
                None => tracing::debug!("file not found on PATH, probe skipped"),
            }
        }
        Self { probes }
    }

    pub fn with_probes(probes: Vec<Box<dyn MimeProbe>>) -> Self {
        Self { probes }
    }

    pub fn probe_names(&self) -> Vec<&'static str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    /// The first non-empty answer, or `None` when nothing recognised the file.
    pub fn sniff(&self, path: &Path) -> Option<String> {
        for probe in &self.probes {
            if let Some(mime) = probe.probe(path).filter(|m| !m.trim().is_empty()) {
                tracing::debug!(path = %path.display(), probe = probe.name(), %mime, "sniffed");
                return Some(mime);
            }
        }
        tracing::debug!(path = %path.display(), "no probe recognised the file");
        None
    }
}

impl Default for MimeSniffer {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Media type implied by a file name's extension.
///
/// Matching is case-sensitive; unknown or missing extensions map to
/// `image/jpeg`.
pub fn mime_type_by_extension(filename: &str) -> &'static str {
    let extension = filename.rsplit_once('.').map_or(filename, |(_, ext)| ext);
    match extension {
        "gif" => "image/gif",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}
