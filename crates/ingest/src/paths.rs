//! Filename and path hardening for inscription-supplied names.
//!
//! Every write or read driven by an inscription-supplied path goes through
//! `sanitize_filename` and `safe_join`.  A name is reduced to its last path
//! segment, stripped of control bytes, bounded to 255 bytes, and joined
//! against a canonical base that the result must stay under.

use std::path::{Component, Path, PathBuf};

use crate::error::{IngestError, Result};

/// Maximum filename length in bytes after sanitization.
pub const MAX_FILENAME_BYTES: usize = 255;

/// Fallback name when sanitization leaves nothing usable.
pub const DEFAULT_FILENAME: &str = "file";

/// Reduce a user-influenced filename to a safe single path segment.
///
/// Takes the last `/`- or `\`-separated segment, drops control bytes and
/// nulls, collapses empty/`.`/`..` to [`DEFAULT_FILENAME`], and truncates to
/// [`MAX_FILENAME_BYTES`] on a char boundary.  Printable non-ASCII survives.
pub fn sanitize_filename(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return DEFAULT_FILENAME.to_string();
    }

    if cleaned.len() <= MAX_FILENAME_BYTES {
        return cleaned;
    }

    let mut end = MAX_FILENAME_BYTES;
    while !cleaned.is_char_boundary(end) {
        end -= 1;
    }
    cleaned[..end].to_string()
}

/// Join a sanitized name against a base directory, verifying containment.
///
/// The joined path is normalized component-by-component (no filesystem
/// access, so it works for paths that do not exist yet) and must stay under
/// the normalized base; otherwise `InvalidPath` is returned.
pub fn safe_join(base: &Path, name: &str) -> Result<PathBuf> {
    let file_name = sanitize_filename(name);
    let base_norm = normalize(base);
    let joined = normalize(&base_norm.join(&file_name));

    if !joined.starts_with(&base_norm) {
        return Err(IngestError::InvalidPath {
            name: name.to_string(),
            reason: "escapes base directory".to_string(),
        });
    }
    Ok(joined)
}

/// Lexically normalize a path: resolve `.` and `..` without touching the
/// filesystem.  `..` at the root is dropped rather than preserved so the
/// containment check above cannot be tricked by leading parent components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // sanitize_filename
    // -----------------------------------------------------------------------

    #[test]
    fn test_sanitize_plain_name_unchanged() {
        assert_eq!(sanitize_filename("cover.png"), "cover.png");
    }

    #[test]
    fn test_sanitize_strips_directory_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("/etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("a/b/c.png"), "c.png");
    }

    #[test]
    fn test_sanitize_strips_windows_separators() {
        assert_eq!(sanitize_filename("..\\..\\boot.ini"), "boot.ini");
    }

    #[test]
    fn test_sanitize_empty_and_dots_collapse_to_default() {
        assert_eq!(sanitize_filename(""), DEFAULT_FILENAME);
        assert_eq!(sanitize_filename("."), DEFAULT_FILENAME);
        assert_eq!(sanitize_filename(".."), DEFAULT_FILENAME);
        assert_eq!(sanitize_filename("dir/"), DEFAULT_FILENAME);
    }

    #[test]
    fn test_sanitize_removes_control_bytes() {
        assert_eq!(sanitize_filename("a\0b\nc.png"), "abc.png");
        // A name that is nothing but control bytes collapses to the default.
        assert_eq!(sanitize_filename("\0\n\t"), DEFAULT_FILENAME);
    }

    #[test]
    fn test_sanitize_truncates_at_255_bytes() {
        let long = "x".repeat(400);
        let out = sanitize_filename(&long);
        assert_eq!(out.len(), MAX_FILENAME_BYTES);
    }

    #[test]
    fn test_sanitize_truncation_respects_char_boundary() {
        // 'é' is two bytes in UTF-8; 200 of them is 400 bytes.
        let long = "é".repeat(200);
        let out = sanitize_filename(&long);
        assert!(out.len() <= MAX_FILENAME_BYTES);
        assert!(out.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_sanitize_preserves_printable_non_ascii() {
        assert_eq!(sanitize_filename("日本語.png"), "日本語.png");
    }

    // -----------------------------------------------------------------------
    // safe_join
    // -----------------------------------------------------------------------

    #[test]
    fn test_safe_join_stays_under_base() {
        let base = Path::new("/data/blocks/840000_abc/images");
        let joined = safe_join(base, "cover.png").unwrap();
        assert!(joined.starts_with(base));
        assert_eq!(joined.file_name().unwrap(), "cover.png");
    }

    #[test]
    fn test_safe_join_traversal_resolves_inside_base() {
        let base = Path::new("/data/blocks/840000_abc/images");
        let joined = safe_join(base, "../../../etc/passwd").unwrap();
        assert!(joined.starts_with(base));
        assert_eq!(joined.file_name().unwrap(), "passwd");
    }

    #[test]
    fn test_safe_join_empty_name_uses_default() {
        let base = Path::new("/data/uploads");
        let joined = safe_join(base, "").unwrap();
        assert_eq!(joined.file_name().unwrap(), DEFAULT_FILENAME);
    }

    #[test]
    fn test_safe_join_null_byte_name() {
        let base = Path::new("/data/uploads");
        let joined = safe_join(base, "\0").unwrap();
        assert_eq!(joined.file_name().unwrap(), DEFAULT_FILENAME);
    }

    #[test]
    fn test_normalize_drops_leading_parent_dirs() {
        let p = normalize(Path::new("/a/../../b"));
        assert_eq!(p, PathBuf::from("/b"));
    }
}
