//! Input limits and output path validation.

use crate::{Attachment, Result, TicketingError};
use std::path::{Component, Path, PathBuf};

/// Maximum length accepted for a single free-text request.
pub const MAX_REQUEST_TEXT_LENGTH: usize = 10_000;

/// Reject request text too long to send anywhere.
pub fn validate_request_text(text: &str) -> Result<()> {
    if text.len() > MAX_REQUEST_TEXT_LENGTH {
        return Err(TicketingError::Validation(format!(
            "request text exceeds maximum length of {MAX_REQUEST_TEXT_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Resolve where a downloaded attachment may be written.
///
/// The result always lies inside `base_dir`: absolute paths and paths with
/// `..` components are rejected.
pub fn resolve_download_path(base_dir: &Path, requested: &str) -> Result<PathBuf> {
    let requested = requested.trim();
    if requested.is_empty() {
        return Err(TicketingError::Validation(
            "download path must not be empty".into(),
        ));
    }

    let path = Path::new(requested);
    if path.is_absolute() || path.has_root() {
        return Err(TicketingError::Validation(format!(
            "download path '{requested}' must be relative to the download directory"
        )));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(TicketingError::Validation(format!(
            "download path '{requested}' contains '..' components which are not allowed"
        )));
    }

    Ok(base_dir.join(path))
}

/// Reduce a filename reported by the backend to its last component.
///
/// Falls back to [`Attachment::default_name`] when nothing usable is left.
pub fn attachment_file_name(reported: &str, attachment_id: u64) -> String {
    Path::new(reported.trim())
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Attachment::default_name(attachment_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_text_is_rejected() {
        assert!(validate_request_text("open a ticket").is_ok());
        let long = "a".repeat(MAX_REQUEST_TEXT_LENGTH + 1);
        assert!(matches!(
            validate_request_text(&long),
            Err(TicketingError::Validation(_))
        ));
    }

    #[test]
    fn relative_download_path_joins_base() {
        let path = resolve_download_path(Path::new("/tmp/downloads"), "report.pdf").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/downloads/report.pdf"));
    }

    #[test]
    fn traversal_is_rejected() {
        assert!(resolve_download_path(Path::new("/tmp"), "../etc/passwd").is_err());
        assert!(resolve_download_path(Path::new("/tmp"), "a/../../b").is_err());
        assert!(resolve_download_path(Path::new("/tmp"), "   ").is_err());
    }

    #[test]
    fn absolute_path_is_rejected() {
        let err = resolve_download_path(Path::new("/tmp/downloads"), "/etc/cron.d/evil")
            .unwrap_err();
        assert!(matches!(err, TicketingError::Validation(ref m) if m.contains("relative")));
    }

    #[test]
    fn backend_filename_keeps_last_component() {
        assert_eq!(attachment_file_name("/etc/cron.d/evil", 9), "evil");
        assert_eq!(attachment_file_name("../../photo.jpg", 9), "photo.jpg");
        assert_eq!(attachment_file_name("log.txt", 9), "log.txt");
        assert_eq!(attachment_file_name("..", 9), "attachment-9");
        assert_eq!(attachment_file_name("/", 9), "attachment-9");
        assert_eq!(attachment_file_name("", 9), "attachment-9");

        let base = Path::new("/tmp/downloads");
        let path = resolve_download_path(base, &attachment_file_name("/etc/cron.d/evil", 9))
            .unwrap();
        assert!(path.starts_with(base));
    }
}
