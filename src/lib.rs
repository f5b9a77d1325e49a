//! # Catalog Image
//!
//! Image preparation for an e-commerce catalog: letterboxed resizing with
//! orientation correction, region cropping, and an upload gate that decides
//! whether an untrusted file is really an image before anything decodes it.
//!
//! # Flow
//!
//! ```text
//! upload ──▶ UploadValidator ──▶ ImageProcessor::resize ──▶ dst file + fileType marker
//!              (size, sniffed       (identify, orient, plan,
//!               type, extension)     memory check, render)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`sniff`] | Media type detection by content: decoder, magic bytes, optional `xdg-mime` / `file` |
//! | [`upload`] | Upload gate: size limit, real-image check, extension whitelist, transport errors |
//! | [`imaging`] | Fit planning, orientation, rendering and encoding behind the [`imaging::ImageBackend`] trait |
//! | [`config`] | `config.toml` loading, validation, and stock defaults |
//! | [`logging`] | `tracing` subscriber setup for the CLI |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Letterbox, Never Upscale
//!
//! A resize always produces exactly the requested canvas (under the default
//! generation method) and never enlarges the source. A small product photo
//! sits centred on a white or transparent canvas instead of being blown up.
//!
//! ## Content Beats Claims
//!
//! The declared media type and the file name of an upload are client input.
//! The sniffed type always wins; the declared one is only a fallback when the
//! content reads as plain text. Unknown binaries are never images.
//!
//! ## Explicit Settings, No Globals
//!
//! Encoder quality, quality mode, generation method, and the memory budget
//! are read once from [`config::ImagingConfig`] and passed to
//! [`imaging::ImageProcessor`] at construction.

pub mod config;
pub mod imaging;
pub mod logging;
pub mod output;
pub mod sniff;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;
