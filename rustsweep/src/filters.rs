use glob::Pattern;
use std::path::Path;

/// Checks whether a file's extension is in the allowed list.
/// `None` allows every file.
pub fn has_valid_extension(path: &Path, extensions: &Option<Vec<String>>) -> bool {
    let Some(allowed) = extensions else {
        return true;
    };
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

/// Checks a path against glob ignore patterns.
///
/// A pattern matches either the whole path (with `/` separators) or the
/// bare file name, so `*.bak` works without a `**/` prefix.
pub fn should_ignore(path: &Path, ignore_patterns: &[String]) -> bool {
    let normalized = path.to_string_lossy().replace('\\', "/");
    if normalized.contains("/.git/") {
        return true;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    ignore_patterns
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .any(|p| p.matches(&normalized) || p.matches(&file_name))
}
