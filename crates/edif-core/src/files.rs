//! # Upload Rules
//!
//! File validation, object naming and content-type guessing for the object
//! storage bucket. No I/O here; the app crate owns the filesystem.

use thiserror::Error;

/// Allowed MIME type groups for uploads.
pub mod file_types {
    pub const IMAGES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];
    pub const DOCUMENTS: &[&str] = &[
        "application/pdf",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ];
    pub const SPREADSHEETS: &[&str] = &[
        "application/vnd.ms-excel",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ];
    pub const ALL: &[&str] = &[
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "application/pdf",
    ];

    /// Group by name as used in query strings (`images`, `documents`, ...).
    pub fn group(name: &str) -> Option<&'static [&'static str]> {
        match name {
            "images" => Some(IMAGES),
            "documents" => Some(DOCUMENTS),
            "spreadsheets" => Some(SPREADSHEETS),
            "all" => Some(ALL),
            _ => None,
        }
    }
}

/// Default upload cap in megabytes.
pub const DEFAULT_MAX_MB: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileError {
    #[error("File size must be less than {max_mb}MB")]
    TooLarge { max_mb: u64 },

    #[error("File type not allowed. Allowed types: {allowed}")]
    TypeNotAllowed { allowed: String },

    #[error("invalid object path: {0}")]
    InvalidPath(String),
}

/// Check size and MIME type. An empty `allowed` list accepts any type.
pub fn validate_file(
    size: u64,
    content_type: &str,
    allowed: &[&str],
    max_mb: u64,
) -> Result<(), FileError> {
    let max_bytes = max_mb.saturating_mul(1024 * 1024);
    if size > max_bytes {
        return Err(FileError::TooLarge { max_mb });
    }
    if !allowed.is_empty() && !allowed.contains(&content_type) {
        return Err(FileError::TypeNotAllowed {
            allowed: allowed.join(", "),
        });
    }
    Ok(())
}

/// [`validate_file`] plus the type implied by the name's extension, which is
/// what the file is later served as. Both must be allowed.
pub fn validate_upload(
    size: u64,
    content_type: &str,
    name: &str,
    allowed: &[&str],
    max_mb: u64,
) -> Result<(), FileError> {
    validate_file(size, content_type, allowed, max_mb)?;
    validate_file(size, content_type_for(name), allowed, max_mb)
}

/// `{prefix}{millis}_{random}_{base}.{ext}`.
///
/// The extension is the part after the last dot; names without one keep no
/// extension.
pub fn unique_file_name(original: &str, prefix: &str, millis: i64, random: &str) -> String {
    match original.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() && !ext.is_empty() => {
            format!("{prefix}{millis}_{random}_{base}.{ext}")
        }
        _ => format!("{prefix}{millis}_{random}_{original}"),
    }
}

/// Full object path of an upload: `{prefix}{millis}_{name}`.
pub fn storage_object_name(prefix: &str, millis: i64, name: &str) -> String {
    format!("{prefix}{millis}_{name}")
}

/// Validate a bucket-relative path: non-empty, relative, no `..` or `.`
/// segments, no backslashes. Returns it without a trailing slash.
pub fn check_object_path(path: &str) -> Result<&str, FileError> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty()
        || trimmed.starts_with('/')
        || trimmed.contains('\\')
        || trimmed.contains('\0')
        || trimmed
            .split('/')
            .any(|seg| seg.is_empty() || seg == ".." || seg == ".")
    {
        return Err(FileError::InvalidPath(path.to_string()));
    }
    Ok(trimmed)
}

/// Validate an upload prefix: empty, or a valid path ending in `/`.
pub fn check_prefix(prefix: &str) -> Result<(), FileError> {
    if prefix.is_empty() {
        return Ok(());
    }
    if !prefix.ends_with('/') {
        return Err(FileError::InvalidPath(prefix.to_string()));
    }
    check_object_path(prefix).map(|_| ())
}

/// A plain file name: no separators, not `.`/`..`.
pub fn check_file_name(name: &str) -> Result<(), FileError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(FileError::InvalidPath(name.to_string()));
    }
    Ok(())
}

/// Guess a MIME type from the extension.
pub fn content_type_for(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain; charset=utf-8",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_limit_message() {
        let err = validate_file(11 * 1024 * 1024, "image/png", file_types::IMAGES, 10).unwrap_err();
        assert_eq!(err.to_string(), "File size must be less than 10MB");
        assert!(validate_file(10 * 1024 * 1024, "image/png", file_types::IMAGES, 10).is_ok());
    }

    #[test]
    fn type_allow_list_message() {
        let err = validate_file(10, "application/zip", file_types::SPREADSHEETS, 10).unwrap_err();
        assert_eq!(
            err.to_string(),
            "File type not allowed. Allowed types: application/vnd.ms-excel, \
             application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        assert!(validate_file(10, "application/zip", &[], 10).is_ok());
    }

    #[test]
    fn upload_extension_must_match_allowed_group() {
        assert!(validate_upload(10, "image/png", "pill.PNG", file_types::IMAGES, 10).is_ok());
        assert!(matches!(
            validate_upload(10, "image/png", "evil.svg", file_types::IMAGES, 10),
            Err(FileError::TypeNotAllowed { .. })
        ));
        assert!(matches!(
            validate_upload(10, "application/pdf", "leaflet.html", file_types::ALL, 10),
            Err(FileError::TypeNotAllowed { .. })
        ));
        assert!(validate_upload(10, "image/png", "any.bin", &[], 10).is_ok());
    }

    #[test]
    fn unique_names_keep_the_last_extension() {
        assert_eq!(
            unique_file_name("label.v2.pdf", "docs/", 1700, "k3x9"),
            "docs/1700_k3x9_label.v2.pdf"
        );
        assert_eq!(unique_file_name("README", "", 5, "r"), "5_r_README");
    }

    #[test]
    fn object_names() {
        assert_eq!(
            storage_object_name("images/products/", 42, "amox.png"),
            "images/products/42_amox.png"
        );
    }

    #[test]
    fn traversal_is_rejected() {
        assert!(check_object_path("images/../secret").is_err());
        assert!(check_object_path("/etc/passwd").is_err());
        assert!(check_object_path("a//b").is_err());
        assert!(check_object_path("").is_err());
        assert_eq!(check_object_path("images/a.png").unwrap(), "images/a.png");
        assert!(check_prefix("images/products/").is_ok());
        assert!(check_prefix("images").is_err());
        assert!(check_file_name("a/b.png").is_err());
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("x/Photo.JPG"), "image/jpeg");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
        assert_eq!(file_types::group("documents"), Some(file_types::DOCUMENTS));
    }
}
