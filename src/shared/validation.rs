use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Characters that may not appear in a stored filename
    /// - Kept: ASCII letters, digits, `_`, `.`, `-`
    /// - Dropped: everything else (including non-ASCII and shell metacharacters)
    static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9_.\-]").unwrap();
}

/// Check a filename's extension against an allowed set.
///
/// Only the segment after the last `.` counts, compared case-insensitively.
/// A filename without a `.` is never allowed.
pub fn is_allowed(filename: &str, allowed_extensions: &[&str]) -> bool {
    match filename.rsplit_once('.') {
        Some((_, extension)) => allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension)),
        None => false,
    }
}

/// Reduce a client-supplied filename to something safe to place in a store directory.
///
/// Path separators become word breaks, whitespace runs collapse to `_`, unsafe
/// characters are removed and leading dots/underscores are stripped so the result
/// can never be `..` or a hidden file. May return an empty string.
pub fn sanitize_filename(original: &str) -> String {
    let joined = original
        .replace(['/', '\\'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");

    UNSAFE_FILENAME_CHARS
        .replace_all(&joined, "")
        .trim_start_matches(['.', '_'])
        .to_string()
}

/// Trim a text field, mapping blank input to `None`
pub fn trimmed_or_none(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_allowed_is_case_insensitive() {
        assert!(is_allowed("a.PNG", &["png"]));
        assert!(is_allowed("scan.Jpeg", &["jpg", "jpeg", "png"]));
        assert!(is_allowed("a.png", &["PNG"]));
    }

    #[test]
    fn test_is_allowed_requires_extension() {
        assert!(!is_allowed("a", &["png"]));
        assert!(!is_allowed("", &["png"]));
        assert!(!is_allowed("trailing.", &["png"]));
    }

    #[test]
    fn test_is_allowed_uses_last_segment_only() {
        assert!(is_allowed("a.tar.gz", &["gz"]));
        assert!(!is_allowed("a.tar.gz", &["tar"]));
        assert!(!is_allowed("report.pdf.exe", &["pdf"]));
    }

    #[test]
    fn test_sanitize_strips_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\scan.png"), "C_Users_me_scan.png");
        assert_eq!(sanitize_filename("/abs/path.pdf"), "abs_path.pdf");
    }

    #[test]
    fn test_sanitize_removes_unsafe_characters() {
        assert_eq!(sanitize_filename("my scratch  map.png"), "my_scratch_map.png");
        assert_eq!(sanitize_filename("wafer<01>|;.jpg"), "wafer01.jpg");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename("ünïcode.pdf"), "ncode.pdf");
    }

    #[test]
    fn test_sanitize_may_be_empty() {
        assert_eq!(sanitize_filename("..."), "");
        assert_eq!(sanitize_filename("   "), "");
    }

    #[test]
    fn test_trimmed_or_none() {
        assert_eq!(trimmed_or_none(Some("  Scratch ")), Some("Scratch".to_string()));
        assert_eq!(trimmed_or_none(Some("   ")), None);
        assert_eq!(trimmed_or_none(None), None);
    }
}
