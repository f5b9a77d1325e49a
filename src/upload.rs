//! Upload validation gate.
//!
//! An [`UploadDescriptor`] describes a file the client sent: the name and
//! media type it claims, its size, where the transport stored it, and the
//! transport's error code. [`UploadValidator::validate`] decides whether the
//! file may go on to the resize pipeline. Checks run in this order and the
//! first failure wins:
//!
//! 1. size limit
//! 2. content is a real image, extension is allowed, name carries no `%00`
//! 3. transport error code
//!
//! The sniffed content type always outranks the declared one; the declared
//! type is only consulted when the content sniffs as plain text.

use crate::sniff::MimeSniffer;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Media types accepted as images. Matched as substrings of the sniffed
/// type, so `image/png; charset=binary` passes.
pub const IMAGE_MIME_TYPES: &[&str] = &[
    "image/gif",
    "image/jpg",
    "image/jpeg",
    "image/pjpeg",
    "image/png",
    "image/x-png",
    "image/webp",
];

/// Extensions accepted when the caller does not supply a list.
pub const DEFAULT_EXTENSIONS: &[&str] = &["gif", "jpg", "jpeg", "jpe", "png", "webp"];

/// The one sniffer answer too vague to trust over the declared type.
const INCONCLUSIVE_TYPE: &str = "text/plain";

/// A client upload, as handed over by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    /// Media type claimed by the client. Untrusted.
    pub declared_mime_type: Option<String>,
    /// Original file name claimed by the client. Untrusted.
    pub filename: String,
    pub size_bytes: u64,
    /// Where the transport stored the received bytes.
    pub transient_path: PathBuf,
    /// Transport status; `0` means the transfer completed.
    pub error_code: i32,
}

impl UploadDescriptor {
    /// Describe a file already on disk, taking name and size from it.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let size_bytes = std::fs::metadata(path)?.len();
        Ok(Self {
            declared_mime_type: None,
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size_bytes,
            transient_path: path.to_path_buf(),
            error_code: 0,
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Image is too large ({size_kb} kB). Maximum allowed: {max_kb} kB")]
    TooLarge { size_kb: u64, max_kb: u64 },
    #[error("Image format not recognized, allowed formats are: {}", format_extensions(.allowed))]
    UnrecognizedFormat { allowed: Vec<String> },
    #[error("Error while uploading image; please change your server's settings. (Error code: {code})")]
    UploadTransport { code: i32 },
}

fn format_extensions(extensions: &[String]) -> String {
    extensions
        .iter()
        .map(|e| format!(".{e}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether the text after the last `.` of `filename`, lowercased, is in
/// `allowed` (or [`DEFAULT_EXTENSIONS`] when `None`). Names without a dot
/// are rejected.
pub fn is_correct_extension(filename: &str, allowed: Option<&[String]>) -> bool {
    let Some((_, extension)) = filename.rsplit_once('.') else {
        return false;
    };
    let extension = extension.to_lowercase();
    match allowed {
        Some(list) => list.iter().any(|e| *e == extension),
        None => DEFAULT_EXTENSIONS.contains(&extension.as_str()),
    }
}

/// Whether `mime` names one of the [`IMAGE_MIME_TYPES`].
pub fn is_image_mime(mime: &str) -> bool {
    IMAGE_MIME_TYPES.iter().any(|t| mime.contains(t))
}

/// Decides whether an upload may be processed.
#[derive(Default)]
pub struct UploadValidator {
    sniffer: MimeSniffer,
}

impl UploadValidator {
    pub fn new(sniffer: MimeSniffer) -> Self {
        Self { sniffer }
    }

    /// Whether the file at `path` is an image by content.
    ///
    /// `declared` is used only when the content sniffs as `text/plain`.
    /// An unreadable file is never an image.
    pub fn is_real_image(&self, path: &Path, declared: Option<&str>) -> bool {
        let sniffed = self.sniffer.sniff(path);
        let inconclusive = sniffed.as_deref() == Some(INCONCLUSIVE_TYPE);

        let effective = match (inconclusive, declared) {
            (true, Some(declared)) if !declared.is_empty() => {
                tracing::debug!(path = %path.display(), ?sniffed, declared, "sniffing inconclusive, using declared type");
                Some(declared.to_string())
            }
            _ => sniffed,
        };
        effective.as_deref().is_some_and(is_image_mime)
    }

    /// Run every check against `upload`.
    ///
    /// `max_size_bytes == 0` disables the size check. `allowed_extensions`
    /// replaces [`DEFAULT_EXTENSIONS`] when given.
    pub fn validate(
        &self,
        upload: &UploadDescriptor,
        max_size_bytes: u64,
        allowed_extensions: Option<&[String]>,
    ) -> Result<(), UploadError> {
        if max_size_bytes > 0 && upload.size_bytes > max_size_bytes {
            return Err(UploadError::TooLarge {
                size_kb: upload.size_bytes / 1024,
                max_kb: max_size_bytes / 1024,
            });
        }

        let real = self.is_real_image(
            &upload.transient_path,
            upload.declared_mime_type.as_deref(),
        );
        let extension_ok = is_correct_extension(&upload.filename, allowed_extensions);
        let null_byte = upload.filename.contains("%00");
        if !real || !extension_ok || null_byte {
            tracing::info!(
                filename = %upload.filename,
                real,
                extension_ok,
                null_byte,
                "upload rejected"
            );
            let allowed = match allowed_extensions {
                Some(list) => list.to_vec(),
                None => DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            };
            return Err(UploadError::UnrecognizedFormat { allowed });
        }

        if upload.error_code != 0 {
            return Err(UploadError::UploadTransport {
                code: upload.error_code,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{create_test_jpeg, create_test_png, write_bytes};
    use tempfile::TempDir;

    fn upload(path: &Path, filename: &str) -> UploadDescriptor {
        UploadDescriptor {
            declared_mime_type: None,
            filename: filename.to_string(),
            size_bytes: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            transient_path: path.to_path_buf(),
            error_code: 0,
        }
    }

    fn png_upload(tmp: &TempDir) -> PathBuf {
        let path = tmp.path().join("upload.tmp");
        create_test_png(&path, 12, 12);
        path
    }

    // =========================================================================
    // extension checks
    // =========================================================================

    #[test]
    fn extension_default_list_case_insensitive() {
        assert!(is_correct_extension("photo.JPG", None));
        assert!(is_correct_extension("archive.tar.webp", None));
        assert!(!is_correct_extension("photo.bmp", None));
        assert!(!is_correct_extension("photo", None));
        assert!(!is_correct_extension("photo.", None));
    }

    #[test]
    fn extension_custom_list_replaces_default() {
        let allowed = vec!["png".to_string()];
        assert!(is_correct_extension("a.PNG", Some(allowed.as_slice())));
        assert!(!is_correct_extension("a.jpg", Some(allowed.as_slice())));
    }

    #[test]
    fn mime_list_matches_substrings() {
        assert!(is_image_mime("image/png; charset=binary"));
        assert!(is_image_mime("image/x-png"));
        assert!(!is_image_mime("text/html"));
        assert!(!is_image_mime("image/bmp"));
    }

    // =========================================================================
    // real-image check
    // =========================================================================

    #[test]
    fn real_image_by_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("upload.tmp");
        create_test_jpeg(&path, 8, 8);
        assert!(UploadValidator::default().is_real_image(&path, Some("application/pdf")));
    }

    #[test]
    fn sniffed_type_outranks_declared() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("upload.tmp");
        write_bytes(&path, b"%PDF-1.4 not an image");
        assert!(!UploadValidator::default().is_real_image(&path, Some("image/png")));
    }

    #[test]
    fn declared_type_used_when_sniff_says_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("upload.tmp");
        write_bytes(&path, b"plain words");
        let validator = UploadValidator::default();
        assert!(validator.is_real_image(&path, Some("image/jpeg")));
        assert!(!validator.is_real_image(&path, None));
    }

    #[test]
    fn executable_declared_as_jpeg_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("upload.tmp");
        let mut elf = b"\x7fELF\x02\x01\x01\x00".to_vec();
        elf.extend_from_slice(&[0; 120]);
        write_bytes(&path, &elf);

        let validator = UploadValidator::default();
        assert!(!validator.is_real_image(&path, Some("image/jpeg")));
        let mut descriptor = upload(&path, "avatar.jpg");
        descriptor.declared_mime_type = Some("image/jpeg".to_string());
        assert!(matches!(
            validator.validate(&descriptor, 0, None),
            Err(UploadError::UnrecognizedFormat { .. })
        ));
    }

    #[test]
    fn unreadable_file_ignores_declared_type() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gone.tmp");
        assert!(!UploadValidator::default().is_real_image(&path, Some("image/png")));
    }

    #[test]
    fn html_disguised_as_image_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("upload.tmp");
        write_bytes(&path, b"<html><script>alert(1)</script></html>");
        assert!(!UploadValidator::default().is_real_image(&path, Some("image/png")));
    }

    // =========================================================================
    // validate
    // =========================================================================

    #[test]
    fn valid_png_upload_passes() {
        let tmp = TempDir::new().unwrap();
        let path = png_upload(&tmp);
        let result = UploadValidator::default().validate(&upload(&path, "logo.png"), 1_000_000, None);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn size_checked_before_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("upload.tmp");
        write_bytes(&path, b"garbage");
        let mut descriptor = upload(&path, "x.exe");
        descriptor.size_bytes = 2_000_000;

        let err = UploadValidator::default()
            .validate(&descriptor, 1_000_000, None)
            .unwrap_err();
        assert_eq!(err, UploadError::TooLarge { size_kb: 1953, max_kb: 976 });
        assert_eq!(
            err.to_string(),
            "Image is too large (1953 kB). Maximum allowed: 976 kB"
        );
    }

    #[test]
    fn zero_max_size_disables_limit() {
        let tmp = TempDir::new().unwrap();
        let path = png_upload(&tmp);
        let mut descriptor = upload(&path, "big.png");
        descriptor.size_bytes = u64::MAX;
        assert!(UploadValidator::default().validate(&descriptor, 0, None).is_ok());
    }

    #[test]
    fn null_byte_in_name_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = png_upload(&tmp);
        let err = UploadValidator::default()
            .validate(&upload(&path, "evil.php%00.png"), 1_000_000, None)
            .unwrap_err();
        assert!(matches!(err, UploadError::UnrecognizedFormat { .. }));
    }

    #[test]
    fn missing_extension_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = png_upload(&tmp);
        let err = UploadValidator::default()
            .validate(&upload(&path, "noextension"), 0, None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Image format not recognized, allowed formats are: .gif, .jpg, .jpeg, .jpe, .png, .webp"
        );
    }

    #[test]
    fn format_checked_before_transport_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("upload.tmp");
        write_bytes(&path, b"\x00\x01\x02 binary junk");
        let mut descriptor = upload(&path, "x.png");
        descriptor.error_code = 3;

        let err = UploadValidator::default()
            .validate(&descriptor, 0, None)
            .unwrap_err();
        assert!(matches!(err, UploadError::UnrecognizedFormat { .. }));
    }

    #[test]
    fn transport_error_reported_last() {
        let tmp = TempDir::new().unwrap();
        let path = png_upload(&tmp);
        let mut descriptor = upload(&path, "ok.png");
        descriptor.error_code = 3;

        let err = UploadValidator::default()
            .validate(&descriptor, 0, None)
            .unwrap_err();
        assert_eq!(err, UploadError::UploadTransport { code: 3 });
        assert!(err.to_string().contains("(Error code: 3)"));
    }

    #[test]
    fn descriptor_from_path_reads_name_and_size() {
        let tmp = TempDir::new().unwrap();
        let path = png_upload(&tmp);
        let descriptor = UploadDescriptor::from_path(&path).unwrap();
        assert_eq!(descriptor.filename, "upload.tmp");
        assert_eq!(descriptor.size_bytes, std::fs::metadata(&path).unwrap().len());
    }
}
