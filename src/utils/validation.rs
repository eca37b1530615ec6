use crate::api::error::AppError;
use std::path::{Component, Path, PathBuf};

/// Longest stored file name, in bytes
pub const MAX_NAME_LEN: usize = 255;

/// Validates the running total of an upload against the configured ceiling
pub fn validate_upload_size(size: u64, max_size: u64) -> Result<(), AppError> {
    if size > max_size {
        return Err(AppError::BadRequest(format!(
            "request body exceeds the maximum allowed size of {} bytes ({} MB)",
            max_size,
            max_size / 1024 / 1024
        )));
    }
    Ok(())
}

/// Turns an untrusted client filename into a single file name for the flat upload root.
///
/// Both `/` and `\` separate segments. Empty and `.` segments are dropped and
/// `..` removes the previously kept segment, so traversal is clamped at the
/// root instead of escaping it. The surviving segments are joined with `_`,
/// so `reports/2024/q1.csv` is stored as `reports_2024_q1.csv`. Control
/// characters and `:` become `_`.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    let mut segments: Vec<&str> = Vec::new();

    for raw in filename.split(['/', '\\']) {
        match raw {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    if filename.contains("..") {
        tracing::warn!("Path traversal attempt detected: {:?}", filename);
    }

    if segments.is_empty() {
        return Err(AppError::InvalidFilename(format!(
            "filename {:?} does not name a file",
            filename
        )));
    }

    let name = clean_name(&segments.join("_"));

    // The name must be exactly one plain component once joined to the root
    let mut components = Path::new(&name).components();
    if !matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) {
        return Err(AppError::InvalidFilename(format!(
            "filename {:?} does not resolve to a plain file name",
            filename
        )));
    }

    Ok(name)
}

/// Resolves the destination of a client filename directly inside `root`.
/// Returns the stored file name alongside the joined path.
pub fn resolve_destination(root: &Path, filename: &str) -> Result<(String, PathBuf), AppError> {
    let name = sanitize_filename(filename)?;
    let destination = root.join(&name);
    Ok((name, destination))
}

fn clean_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_control() || c == ':' { '_' } else { c })
        .collect();

    // Limit length safely for UTF-8
    if cleaned.len() > MAX_NAME_LEN {
        let mut end = MAX_NAME_LEN;
        while !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned[..end].to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_directly_inside(root: &Path, path: &Path) {
        assert_eq!(path.parent(), Some(root), "{:?} is not directly inside {:?}", path, root);
        let relative = path.strip_prefix(root).unwrap();
        assert!(
            relative.components().count() == 1
                && matches!(relative.components().next(), Some(Component::Normal(_))),
            "{:?} is not a plain file name",
            relative
        );
    }

    #[test]
    fn test_validate_upload_size() {
        assert!(validate_upload_size(100, 1000).is_ok());
        assert!(validate_upload_size(1000, 1000).is_ok());
        assert!(matches!(
            validate_upload_size(1001, 1000),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_sanitize_plain_names() {
        assert_eq!(sanitize_filename("report.pdf").unwrap(), "report.pdf");
        assert_eq!(sanitize_filename("测试.txt").unwrap(), "测试.txt");
        assert_eq!(sanitize_filename("...hidden").unwrap(), "...hidden");
    }

    #[test]
    fn test_sanitize_flattens_nested_names() {
        assert_eq!(sanitize_filename("photos/2024/cat.png").unwrap(), "photos_2024_cat.png");
        assert_eq!(sanitize_filename("docs\\notes.md").unwrap(), "docs_notes.md");
        assert_eq!(sanitize_filename("a/./b/./c.txt").unwrap(), "a_b_c.txt");
    }

    #[test]
    fn test_sanitize_collapses_traversal() {
        assert_eq!(sanitize_filename("../../../etc/passwd").unwrap(), "etc_passwd");
        assert_eq!(sanitize_filename("a/b/../../c.txt").unwrap(), "c.txt");
        assert_eq!(
            sanitize_filename("..\\..\\windows\\system32").unwrap(),
            "windows_system32"
        );
    }

    #[test]
    fn test_sanitize_strips_absolute_prefix() {
        assert_eq!(sanitize_filename("/etc/shadow").unwrap(), "etc_shadow");
        assert_eq!(sanitize_filename("///tmp//x").unwrap(), "tmp_x");
        assert_eq!(sanitize_filename("C:\\boot.ini").unwrap(), "C__boot.ini");
    }

    #[test]
    fn test_sanitize_replaces_control_characters() {
        assert_eq!(sanitize_filename("bad\nname\0.txt").unwrap(), "bad_name_.txt");
    }

    #[test]
    fn test_sanitize_rejects_empty_names() {
        for name in ["", "/", "\\", "///", ".", "..", "./..", "a/..", "../../.."] {
            assert!(
                matches!(sanitize_filename(name), Err(AppError::InvalidFilename(_))),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_sanitize_truncates_long_names() {
        let long = format!("{}/{}", "é".repeat(100), "é".repeat(100));
        let sanitized = sanitize_filename(&long).unwrap();
        assert!(sanitized.len() <= MAX_NAME_LEN);
        assert!(sanitized.chars().all(|c| c == 'é' || c == '_'));
    }

    #[test]
    fn test_resolve_destination_stays_directly_inside_root() {
        let root = Path::new("/srv/uploads");
        let hostile = [
            "../secret",
            "../../../../../../etc/passwd",
            "a/../../b",
            "..\\..\\x",
            "/absolute/path",
            "....//....//x",
            "dir/../../../../../y",
            "./../z",
            "x/y/z/../../../../../../w",
            "nested/dir/file.txt",
        ];

        for name in hostile {
            let (_, path) = resolve_destination(root, name).unwrap();
            assert_directly_inside(root, &path);
        }
    }

    #[test]
    fn test_nested_name_and_prefix_do_not_share_a_path() {
        let root = Path::new("uploads");
        let (dir_name, dir_path) = resolve_destination(root, "a").unwrap();
        let (nested_name, nested_path) = resolve_destination(root, "a/b.txt").unwrap();
        assert_eq!(dir_name, "a");
        assert_eq!(nested_name, "a_b.txt");
        assert!(!nested_path.starts_with(&dir_path));
    }

    #[test]
    fn test_resolve_destination_name() {
        let root = Path::new("uploads");
        let (name, path) = resolve_destination(root, "../docs\\notes.md").unwrap();
        assert_eq!(name, "docs_notes.md");
        assert_eq!(path, Path::new("uploads").join("docs_notes.md"));
    }
}
